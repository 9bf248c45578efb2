use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use scribe_core::{JobId, ServerStatus};
use scribe_logging::{scribe_debug, scribe_info};
use serde::de::DeserializeOwned;
use url::Url;

use crate::wire::{ErrorEnvelope, StatusResponse, SubmitResponse};
use crate::{ApiError, FailureKind, PollError, SubmitError, Upload, MAX_UPLOAD_BYTES};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_upload_bytes: u64,
    pub max_download_bytes: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

/// The two remote operations the job lifecycle depends on.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// Uploads the audio and returns the id the server assigned.
    async fn submit(&self, upload: &Upload) -> Result<JobId, SubmitError>;

    /// Fetches the current status of `job_id`.
    async fn poll(&self, job_id: &JobId) -> Result<ServerStatus, PollError>;
}

/// reqwest-backed client for every endpoint of the transcription server.
#[derive(Debug, Clone)]
pub struct HttpClient {
    settings: ApiSettings,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as a base url"),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base_url,
            client,
        })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let (status, body) = self.send(self.client.get(url)).await?;
        decode_json(status, &body)
    }

    pub(crate) async fn post_file<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        field: &'static str,
        upload: &Upload,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let form = Form::new().part(field, file_part(upload)?);
        let (status, body) = self.send(self.client.post(url).multipart(form)).await?;
        decode_json(status, &body)
    }

    /// Downloads a binary body, failing once it grows past the download limit.
    pub(crate) async fn get_bytes(&self, segments: &[&str]) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        let max_bytes = self.settings.max_download_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "download too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "download too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, bytes::Bytes), ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl JobApi for HttpClient {
    async fn submit(&self, upload: &Upload) -> Result<JobId, SubmitError> {
        upload.ensure_within(self.settings.max_upload_bytes)?;
        if !upload.has_audio_extension() {
            return Err(ApiError::new(
                FailureKind::UnsupportedFormat,
                format!("{} is not a supported audio format", upload.file_name()),
            ));
        }

        scribe_info!(
            "Submitting {} ({} bytes) for transcription",
            upload.file_name(),
            upload.len()
        );
        let url = self.endpoint(&["transcribir"])?;
        let form = Form::new().part("audio", file_part(upload)?);
        let (status, body) = self.send(self.client.post(url).multipart(form)).await?;

        // The server reports rejections in the body, usually with a 4xx/5xx.
        let response: SubmitResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(_) if !status.is_success() => return Err(error_from_body(status, &body)),
            Err(err) => return Err(ApiError::new(FailureKind::Decode, err.to_string())),
        };
        if response.error.is_none() && !status.is_success() {
            return Err(error_from_body(status, &body));
        }
        response.into_job_id()
    }

    async fn poll(&self, job_id: &JobId) -> Result<ServerStatus, PollError> {
        let url = self.endpoint(&["estado", job_id.as_str()])?;
        let (status, body) = self.send(self.client.get(url)).await?;
        let response: StatusResponse = serde_json::from_slice(&body).map_err(|err| {
            if status.is_success() {
                ApiError::new(FailureKind::Decode, err.to_string())
            } else {
                error_from_body(status, &body)
            }
        })?;
        let error = response.error.clone();
        response.into_status().ok_or_else(|| {
            scribe_debug!("Status for job {} had no usable status field", job_id);
            match error {
                Some(message) if !status.is_success() => {
                    ApiError::new(FailureKind::HttpStatus(status.as_u16()), message)
                }
                Some(message) => ApiError::rejected(message),
                None => ApiError::new(FailureKind::Decode, "missing or unknown status"),
            }
        })
    }
}

fn file_part(upload: &Upload) -> Result<Part, ApiError> {
    let part = Part::stream_with_length(upload.data().clone(), upload.len())
        .file_name(upload.file_name().to_string());
    match upload.mime() {
        Some(mime) => part
            .mime_str(mime)
            .map_err(|err| ApiError::new(FailureKind::UnsupportedFormat, err.to_string())),
        None => Ok(part),
    }
}

/// Decodes a JSON body, surfacing a server `error` field as `Rejected`.
pub(crate) fn decode_json<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    if let Ok(ErrorEnvelope { error: Some(message) }) = serde_json::from_slice(body) {
        return Err(ApiError::rejected(message));
    }
    if !status.is_success() {
        return Err(error_from_body(status, body));
    }
    serde_json::from_slice(body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let message = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error: Some(message) }) => message,
        _ => status.to_string(),
    };
    ApiError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
