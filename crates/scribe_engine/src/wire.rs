//! JSON shapes the server speaks. Field names follow the server, not us.
use serde::Deserialize;

use scribe_core::{JobId, ServerStatus, TranscriptResult};

use crate::{ApiError, FailureKind};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub(crate) fn into_job_id(self) -> Result<JobId, ApiError> {
        if let Some(error) = self.error {
            return Err(ApiError::rejected(error));
        }
        match self.job_id {
            Some(id) if !id.trim().is_empty() => Ok(JobId::new(id)),
            _ => Err(ApiError::new(
                FailureKind::MissingJobId,
                "response did not include a job_id",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub transcripcion: Option<String>,
    #[serde(default)]
    pub saved_as: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusResponse {
    /// `None` when the status is missing or not one of the three known values.
    pub(crate) fn into_status(self) -> Option<ServerStatus> {
        match self.status.as_deref()? {
            "processing" => Some(ServerStatus::Processing {
                progress: self.progress.map(clamp_progress),
                filename: self.filename,
            }),
            "completed" => Some(ServerStatus::Completed(TranscriptResult {
                text: self.transcripcion.unwrap_or_default(),
                saved_as: self.saved_as.filter(|s| !s.is_empty()),
                file_path: self.file_path.filter(|s| !s.is_empty()),
            })),
            "failed" => Some(ServerStatus::Failed { error: self.error }),
            _ => None,
        }
    }
}

pub(crate) fn clamp_progress(raw: f64) -> u8 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0).floor() as u8
    } else {
        0
    }
}
