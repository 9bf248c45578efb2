use serde::Deserialize;

use crate::{ApiError, HttpClient};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct HealthReport {
    pub status: String,
    pub spacy_loaded: bool,
    pub whisper_binary: bool,
    pub whisper_model: bool,
    pub active_jobs: u64,
    pub timestamp: Option<String>,
}

impl HealthReport {
    pub fn is_operational(&self) -> bool {
        self.status == "ok"
    }

    /// Transcription needs both the binary and the model on the server.
    pub fn whisper_ready(&self) -> bool {
        self.whisper_binary && self.whisper_model
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Transcript,
    Sentiment,
}

impl ArtifactKind {
    fn list_path(self) -> &'static str {
        match self {
            ArtifactKind::Transcript => "listar_archivos",
            ArtifactKind::Sentiment => "listar_sentimientos",
        }
    }

    fn download_path(self) -> &'static str {
        match self {
            ArtifactKind::Transcript => "descargar",
            ArtifactKind::Sentiment => "descargar_sentimiento",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactEntry {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "tamaño")]
    pub size_bytes: u64,
    /// ISO-8601 local time as reported by the server.
    #[serde(rename = "modificado")]
    pub modified: String,
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(rename = "archivos", default)]
    entries: Vec<ArtifactEntry>,
}

impl HttpClient {
    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        self.get_json(&["health"]).await
    }

    pub async fn list_artifacts(&self, kind: ArtifactKind) -> Result<Vec<ArtifactEntry>, ApiError> {
        let listing: ArtifactListing = self.get_json(&[kind.list_path()]).await?;
        Ok(listing.entries)
    }

    pub async fn download_artifact(
        &self,
        kind: ArtifactKind,
        name: &str,
    ) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(&[kind.download_path(), name]).await
    }
}
