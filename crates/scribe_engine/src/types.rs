use std::fmt;
use std::path::Path;

use bytes::Bytes;

/// Largest audio upload the server accepts.
pub const MAX_UPLOAD_BYTES: u64 = 45 * 1024 * 1024;

/// Audio formats the transcription endpoint accepts, lowercase, without dot.
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "wav", "m4a", "ogg", "flac", "aac", "opus"];

/// Error returned by every remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Server said no; `message` is its `error` field verbatim.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }
}

/// Failure at submit time. Never retried automatically.
pub type SubmitError = ApiError;

/// Failure of a single status request. Treated as transient by the poll loop.
pub type PollError = ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Network,
    Timeout,
    HttpStatus(u16),
    /// The server answered with an `error` field.
    Rejected,
    Decode,
    MissingJobId,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedFormat,
    /// The submission was cancelled or replaced before the server answered.
    Superseded,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Rejected => write!(f, "rejected by server"),
            FailureKind::Decode => write!(f, "unreadable response"),
            FailureKind::MissingJobId => write!(f, "missing job id"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedFormat => write!(f, "unsupported format"),
            FailureKind::Superseded => write!(f, "superseded"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

/// A file to send as one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: String,
    data: Bytes,
    mime: Option<String>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, data))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    pub fn has_audio_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Checks the size limit without touching the network.
    pub fn ensure_within(&self, max_bytes: u64) -> Result<(), ApiError> {
        if self.len() > max_bytes {
            return Err(ApiError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(self.len()),
                },
                format!("{} exceeds the upload limit", self.file_name),
            ));
        }
        Ok(())
    }
}
