use std::fs;
use std::path::{Path, PathBuf};

use scribe_core::{JobId, TranscriptResult};
use scribe_engine::{ensure_output_dir, transcript_filename, AtomicFileWriter, PersistError};
use scribe_logging::{scribe_error, scribe_info, scribe_warn};
use serde::{Deserialize, Serialize};

const HISTORY_FILENAME: &str = ".scribe_history.ron";

/// One transcript saved locally by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: String,
    pub source: String,
    pub saved_as: Option<String>,
    pub local_file: String,
    pub completed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHistory {
    transcripts: Vec<HistoryEntry>,
}

/// Writes the transcript text under a name derived from the server's name
/// and the job id. Returns the written path.
pub(crate) fn save_transcript(
    output_dir: &Path,
    job_id: &JobId,
    result: &TranscriptResult,
) -> Result<PathBuf, PersistError> {
    let filename = transcript_filename(result.saved_as.as_deref(), job_id);
    AtomicFileWriter::new(output_dir.to_path_buf()).write(&filename, &result.text)
}

pub(crate) fn load_history(output_dir: &Path) -> Vec<HistoryEntry> {
    let path = output_dir.join(HISTORY_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            scribe_warn!("Failed to read history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    match ron::from_str::<PersistedHistory>(&content) {
        Ok(history) => history.transcripts,
        Err(err) => {
            scribe_warn!("Failed to parse history from {:?}: {}", path, err);
            Vec::new()
        }
    }
}

pub(crate) fn append_history(output_dir: &Path, entry: HistoryEntry) {
    if let Err(err) = ensure_output_dir(output_dir) {
        scribe_error!("Failed to ensure output dir {:?}: {}", output_dir, err);
        return;
    }

    let mut transcripts = load_history(output_dir);
    transcripts.retain(|existing| existing.job_id != entry.job_id);
    transcripts.push(entry);
    let history = PersistedHistory { transcripts };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&history, pretty) {
        Ok(text) => text,
        Err(err) => {
            scribe_error!("Failed to serialize history: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    match writer.write(HISTORY_FILENAME, &content) {
        Ok(path) => scribe_info!("History updated at {:?}", path),
        Err(err) => scribe_error!("Failed to write history to {:?}: {}", output_dir, err),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entry(job_id: &str, source: &str) -> HistoryEntry {
        HistoryEntry {
            job_id: job_id.to_string(),
            source: source.to_string(),
            saved_as: Some("opinion_1.txt".to_string()),
            local_file: format!("opinion_1--{job_id}.txt"),
            completed_at: "2026-10-19T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_history_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_history(temp.path()).is_empty());
    }

    #[test]
    fn history_round_trips_and_replaces_same_job() {
        let temp = TempDir::new().unwrap();
        append_history(temp.path(), entry("abc", "talk.mp3"));
        append_history(temp.path(), entry("def", "other.wav"));
        append_history(temp.path(), entry("abc", "talk-again.mp3"));

        let history = load_history(temp.path());
        let sources: Vec<&str> = history.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["other.wav", "talk-again.mp3"]);
    }

    #[test]
    fn corrupt_history_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(HISTORY_FILENAME), "not ron at all (").unwrap();
        assert!(load_history(temp.path()).is_empty());
    }

    #[test]
    fn transcript_is_written_with_its_text() {
        let temp = TempDir::new().unwrap();
        let result = TranscriptResult {
            text: "hello".to_string(),
            saved_as: Some("opinion_7.txt".to_string()),
            file_path: None,
        };
        let path = save_transcript(temp.path(), &JobId::from("abc"), &result).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("opinion_7--"));
    }
}
