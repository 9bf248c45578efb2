use std::time::Duration;

use crate::view_model::JobView;
use crate::{
    JobId, Phase, PollPolicy, PollTicket, ProgressEvent, TerminalEvent, TerminalOutcome,
    TranscriptResult,
};

/// Snapshot of the one job a client owns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Job {
    pub id: Option<JobId>,
    pub phase: Phase,
    /// Non-decreasing while processing; 100 only once completed.
    pub progress_percent: u8,
    /// Name of the submitted file, shown while processing.
    pub label: Option<String>,
    pub raw_status: Option<String>,
    /// Text of the last progress event.
    pub status_text: Option<String>,
    pub result: Option<TranscriptResult>,
    pub error: Option<String>,
    /// Clock reading when the server accepted the job.
    pub started_at: Option<Duration>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    policy: PollPolicy,
    epoch: u64,
    attempt: u64,
    in_flight: bool,
    started_at: Option<Duration>,
    job: Job,
    dirty: bool,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new(PollPolicy::default())
    }
}

impl JobState {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            epoch: 0,
            attempt: 0,
            in_flight: false,
            started_at: None,
            job: Job::default(),
            dirty: false,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn phase(&self) -> Phase {
        self.job.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn view(&self) -> JobView {
        JobView::from_job(&self.job, self.dirty)
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// A ticket is current only for the live attempt of a processing job.
    pub fn is_current(&self, ticket: &PollTicket) -> bool {
        self.job.phase == Phase::Processing
            && ticket.epoch == self.epoch
            && ticket.attempt == self.attempt
            && self.job.id.as_ref() == Some(&ticket.job_id)
    }

    pub(crate) fn awaits_submission(&self, epoch: u64) -> bool {
        self.job.phase == Phase::Submitting && epoch == self.epoch
    }

    pub(crate) fn has_request_in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    /// Starts a new submission. Invalidates every ticket of the previous job.
    pub(crate) fn begin_submission(&mut self, label: String) -> u64 {
        self.invalidate();
        self.job = Job {
            phase: Phase::Submitting,
            label: Some(label),
            ..Job::default()
        };
        self.dirty = true;
        self.epoch
    }

    pub(crate) fn start_processing(&mut self, job_id: JobId, now: Duration) -> PollTicket {
        self.job.id = Some(job_id.clone());
        self.job.phase = Phase::Processing;
        self.job.raw_status = Some("processing".to_string());
        self.job.started_at = Some(now);
        self.started_at = Some(now);
        self.dirty = true;
        self.next_ticket(job_id)
    }

    pub(crate) fn reset_to_idle(&mut self) {
        self.invalidate();
        self.job = Job::default();
        self.dirty = true;
    }

    pub(crate) fn record_elapsed(&mut self, now: Duration) -> Duration {
        let elapsed = self
            .started_at
            .map(|start| now.saturating_sub(start))
            .unwrap_or_default();
        self.job.elapsed = elapsed;
        elapsed
    }

    pub(crate) fn next_ticket(&mut self, job_id: JobId) -> PollTicket {
        self.attempt += 1;
        PollTicket {
            epoch: self.epoch,
            job_id,
            attempt: self.attempt,
        }
    }

    pub(crate) fn apply_progress(&mut self, percent: u8, raw_status: &str) -> Option<ProgressEvent> {
        let job_id = self.job.id.clone()?;
        // Never move backwards, even if a caller hands in a lower value.
        self.job.progress_percent = self.job.progress_percent.max(percent);
        self.job.raw_status = Some(raw_status.to_string());
        self.dirty = true;
        let status_text = match raw_status {
            "completed" => "Completed".to_string(),
            _ => format!("Processing {}...", self.job.label.as_deref().unwrap_or("file")),
        };
        self.job.status_text = Some(status_text.clone());
        Some(ProgressEvent {
            job_id,
            percent: self.job.progress_percent,
            raw_status: raw_status.to_string(),
            status_text,
            elapsed: self.job.elapsed,
        })
    }

    pub(crate) fn finish(&mut self, outcome: TerminalOutcome) -> TerminalEvent {
        let phase = match &outcome {
            TerminalOutcome::Completed(_) => Phase::Completed,
            TerminalOutcome::Failed(_) => Phase::Failed,
            TerminalOutcome::TimedOut(_) => Phase::TimedOut,
            TerminalOutcome::Cancelled => Phase::Cancelled,
        };
        match &outcome {
            TerminalOutcome::Completed(result) => {
                self.job.progress_percent = 100;
                self.job.result = Some(result.clone());
            }
            TerminalOutcome::Failed(message) | TerminalOutcome::TimedOut(message) => {
                self.job.error = Some(message.clone());
            }
            TerminalOutcome::Cancelled => {}
        }
        self.job.phase = phase;
        self.job.raw_status = Some(phase.label().to_string());
        self.in_flight = false;
        self.dirty = true;
        TerminalEvent {
            job_id: self.job.id.clone(),
            phase,
            outcome,
        }
    }

    /// Cancellation also bumps the epoch so anything still in flight is stale.
    pub(crate) fn cancel(&mut self) -> TerminalEvent {
        self.invalidate();
        self.finish(TerminalOutcome::Cancelled)
    }

    fn invalidate(&mut self) {
        self.epoch += 1;
        self.attempt = 0;
        self.in_flight = false;
        self.started_at = None;
    }
}
