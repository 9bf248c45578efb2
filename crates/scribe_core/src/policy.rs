use std::time::Duration;

use crate::{PollObservation, ServerStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_millis(900_000);
/// Highest percent shown while the server still reports `processing`.
/// The remainder is reserved for the jump to 100 on completion.
pub const PROCESSING_CEILING: u8 = 95;

/// Timing and progress rules for one kind of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    max_duration: Duration,
    processing_ceiling: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDecision {
    /// `None` once the loop should stop.
    pub next_delay: Option<Duration>,
    pub clamped_percent: u8,
    pub should_stop: bool,
    pub verdict: Verdict,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::transcription()
    }
}

impl PollPolicy {
    /// Audio transcription: poll every 2 s, give up after 15 minutes.
    pub fn transcription() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_DURATION,
            processing_ceiling: PROCESSING_CEILING,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_processing_ceiling(mut self, ceiling: u8) -> Self {
        self.processing_ceiling = ceiling.min(100);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn processing_ceiling(&self) -> u8 {
        self.processing_ceiling
    }

    pub fn is_expired(&self, elapsed: Duration) -> bool {
        elapsed > self.max_duration
    }

    /// Decides what a poll result means for the loop.
    ///
    /// A terminal status reported by the server wins over the local deadline
    /// when both are observed at once; `processing` and transient failures past
    /// the deadline time out.
    pub fn decide(
        &self,
        elapsed: Duration,
        last_percent: u8,
        observation: &PollObservation,
    ) -> PollDecision {
        match observation {
            PollObservation::Status(ServerStatus::Completed(_)) => {
                self.stop(100, Verdict::Completed)
            }
            PollObservation::Status(ServerStatus::Failed { .. }) => {
                self.stop(last_percent, Verdict::Failed)
            }
            _ if self.is_expired(elapsed) => self.stop(last_percent, Verdict::TimedOut),
            PollObservation::Status(ServerStatus::Processing { progress, .. }) => {
                let reported = progress.unwrap_or(0).min(self.processing_ceiling);
                self.proceed(last_percent.max(reported))
            }
            PollObservation::Transient { .. } => self.proceed(last_percent),
        }
    }

    fn proceed(&self, percent: u8) -> PollDecision {
        PollDecision {
            next_delay: Some(self.interval),
            clamped_percent: percent,
            should_stop: false,
            verdict: Verdict::Continue,
        }
    }

    fn stop(&self, percent: u8, verdict: Verdict) -> PollDecision {
        PollDecision {
            next_delay: None,
            clamped_percent: percent,
            should_stop: true,
            verdict,
        }
    }
}
