use crate::{Job, JobId, Phase, TranscriptResult};

/// Everything the presentation layer needs to draw one transcription panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobView {
    pub phase: Phase,
    pub job_id: Option<JobId>,
    pub progress_percent: u8,
    pub show_progress: bool,
    /// Submit affordance is disabled while busy.
    pub busy: bool,
    pub status_line: String,
    pub elapsed_secs: u64,
    pub result: Option<TranscriptResult>,
    pub error: Option<String>,
    pub dirty: bool,
}

impl JobView {
    pub(crate) fn from_job(job: &Job, dirty: bool) -> Self {
        Self {
            phase: job.phase,
            job_id: job.id.clone(),
            progress_percent: job.progress_percent,
            show_progress: matches!(
                job.phase,
                Phase::Submitting | Phase::Processing | Phase::Completed
            ),
            busy: job.phase.is_busy(),
            status_line: status_line(job),
            elapsed_secs: job.elapsed.as_secs(),
            result: job.result.clone(),
            error: job.error.clone(),
            dirty,
        }
    }
}

fn status_line(job: &Job) -> String {
    let label = job.label.as_deref().unwrap_or("file");
    match job.phase {
        Phase::Idle => String::new(),
        Phase::Submitting => "Uploading file...".to_string(),
        Phase::Processing => format!("Processing {label}..."),
        Phase::Completed => match job.result.as_ref().and_then(|r| r.saved_as.as_deref()) {
            Some(saved_as) => format!("Completed: {saved_as}"),
            None => "Completed".to_string(),
        },
        Phase::Failed => "Transcription failed".to_string(),
        Phase::TimedOut => "Timed out waiting for the server".to_string(),
        Phase::Cancelled => "Cancelled".to_string(),
    }
}
