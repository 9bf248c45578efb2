use std::time::Duration;

use crate::{JobId, PollObservation, PollTicket};

/// Inputs to the job state machine. Times are readings of the client's
/// monotonic clock, not wall-clock timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to submit a new job; `label` is the uploaded file name.
    SubmitRequested { label: String },
    /// Server accepted the upload of submission `epoch`.
    SubmitAccepted {
        epoch: u64,
        job_id: JobId,
        now: Duration,
    },
    /// Upload of submission `epoch` failed or was rejected by the server.
    SubmitRejected { epoch: u64, reason: String },
    /// A scheduled poll fired.
    PollDue { ticket: PollTicket, now: Duration },
    /// The status request for `ticket` came back.
    PollResolved {
        ticket: PollTicket,
        observation: PollObservation,
        now: Duration,
    },
    /// User clicked Cancel.
    CancelRequested,
    /// User cleared the panel.
    Cleared,
}
