//! Scribe core: pure job lifecycle state machine, poll policy and view-model helpers.
mod effect;
mod msg;
mod policy;
mod state;
mod types;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use policy::{
    PollDecision, PollPolicy, Verdict, DEFAULT_MAX_DURATION, DEFAULT_POLL_INTERVAL,
    PROCESSING_CEILING,
};
pub use state::{Job, JobState};
pub use types::{
    JobId, Phase, PollObservation, PollTicket, ProgressEvent, ServerStatus, TerminalEvent,
    TerminalOutcome, TranscriptResult,
};
pub use update::update;
pub use view_model::JobView;
