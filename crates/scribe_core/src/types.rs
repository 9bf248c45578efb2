use std::fmt;
use std::time::Duration;

/// Opaque job identifier issued by the transcription server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for JobId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Client-observed lifecycle stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl Phase {
    /// Terminal phases never transition again for the same job.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::Failed | Phase::TimedOut | Phase::Cancelled
        )
    }

    /// The submit affordance is disabled while busy.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Submitting | Phase::Processing)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting => "submitting",
            Phase::Processing => "processing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::TimedOut => "timed out",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payload of a completed transcription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranscriptResult {
    pub text: String,
    pub saved_as: Option<String>,
    pub file_path: Option<String>,
}

/// One of the three statuses the server reports for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Processing {
        /// Already clamped to 0..=100 by the wire layer.
        progress: Option<u8>,
        filename: Option<String>,
    },
    Completed(TranscriptResult),
    Failed {
        error: Option<String>,
    },
}

impl ServerStatus {
    /// Raw status text as the server spells it.
    pub fn raw_label(&self) -> &'static str {
        match self {
            ServerStatus::Processing { .. } => "processing",
            ServerStatus::Completed(_) => "completed",
            ServerStatus::Failed { .. } => "failed",
        }
    }
}

/// What a single poll round-trip produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollObservation {
    Status(ServerStatus),
    /// Network blip or unusable response; retried at the next tick.
    Transient { reason: String },
}

/// Identifies one scheduled poll. A ticket whose epoch or attempt is no longer
/// current is stale and its result must be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub epoch: u64,
    pub job_id: JobId,
    pub attempt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub percent: u8,
    pub raw_status: String,
    /// Human-readable line, e.g. `Processing talk.mp3...`.
    pub status_text: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed(TranscriptResult),
    Failed(String),
    TimedOut(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEvent {
    /// `None` when the job was cancelled before the server issued an id.
    pub job_id: Option<JobId>,
    pub phase: Phase,
    pub outcome: TerminalOutcome,
}
