use std::time::Duration;

use crate::{PollTicket, ProgressEvent, TerminalEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the pending upload; the answer comes back tagged with `epoch`.
    SendSubmission { epoch: u64 },
    /// Fire `Msg::PollDue` for `ticket` after `delay`.
    SchedulePoll { ticket: PollTicket, delay: Duration },
    /// Issue exactly one status request for `ticket`.
    FetchStatus { ticket: PollTicket },
    /// Notify the presentation layer.
    Progress(ProgressEvent),
    /// Notify the presentation layer; the job will emit nothing after this.
    Terminal(TerminalEvent),
}
