use crate::{
    Effect, JobState, Msg, Phase, PollObservation, ServerStatus, TerminalOutcome, Verdict,
};

const UNKNOWN_FAILURE: &str = "Unknown error";

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that refer to a superseded submission or a stale poll ticket are
/// dropped without touching state.
pub fn update(mut state: JobState, msg: Msg) -> (JobState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitRequested { label } => {
            let epoch = state.begin_submission(label);
            vec![Effect::SendSubmission { epoch }]
        }
        Msg::SubmitAccepted { epoch, job_id, now } => {
            if !state.awaits_submission(epoch) {
                return (state, Vec::new());
            }
            let ticket = state.start_processing(job_id, now);
            let delay = state.policy().interval();
            vec![Effect::SchedulePoll { ticket, delay }]
        }
        Msg::SubmitRejected { epoch, reason: _ } => {
            // The reason goes back to the caller of submit; the job itself
            // never started, so nothing terminal is reported.
            if state.awaits_submission(epoch) {
                state.reset_to_idle();
            }
            Vec::new()
        }
        Msg::PollDue { ticket, now } => {
            if !state.is_current(&ticket) || state.has_request_in_flight() {
                return (state, Vec::new());
            }
            let elapsed = state.record_elapsed(now);
            if state.policy().is_expired(elapsed) {
                vec![Effect::Terminal(state.finish(timed_out(&state)))]
            } else {
                state.set_in_flight(true);
                vec![Effect::FetchStatus { ticket }]
            }
        }
        Msg::PollResolved {
            ticket,
            observation,
            now,
        } => {
            if !state.is_current(&ticket) || !state.has_request_in_flight() {
                return (state, Vec::new());
            }
            state.set_in_flight(false);
            let elapsed = state.record_elapsed(now);
            let decision =
                state
                    .policy()
                    .decide(elapsed, state.job().progress_percent, &observation);

            match (decision.verdict, observation) {
                (
                    Verdict::Completed,
                    PollObservation::Status(ServerStatus::Completed(result)),
                ) => {
                    let mut effects = Vec::with_capacity(2);
                    if let Some(event) = state.apply_progress(100, "completed") {
                        effects.push(Effect::Progress(event));
                    }
                    effects.push(Effect::Terminal(
                        state.finish(TerminalOutcome::Completed(result)),
                    ));
                    effects
                }
                (Verdict::Failed, PollObservation::Status(ServerStatus::Failed { error })) => {
                    let message = error
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
                    vec![Effect::Terminal(
                        state.finish(TerminalOutcome::Failed(message)),
                    )]
                }
                (Verdict::TimedOut, _) => {
                    vec![Effect::Terminal(state.finish(timed_out(&state)))]
                }
                (_, observation) => {
                    let mut effects = Vec::with_capacity(2);
                    // Transient failures keep the last percent and stay silent.
                    if let PollObservation::Status(status) = &observation {
                        if let Some(event) =
                            state.apply_progress(decision.clamped_percent, status.raw_label())
                        {
                            effects.push(Effect::Progress(event));
                        }
                    }
                    let delay = decision
                        .next_delay
                        .unwrap_or_else(|| state.policy().interval());
                    effects.push(Effect::SchedulePoll {
                        ticket: state.next_ticket(ticket.job_id),
                        delay,
                    });
                    effects
                }
            }
        }
        Msg::CancelRequested => {
            if matches!(state.phase(), Phase::Submitting | Phase::Processing) {
                vec![Effect::Terminal(state.cancel())]
            } else {
                Vec::new()
            }
        }
        Msg::Cleared => {
            state.reset_to_idle();
            Vec::new()
        }
    };

    (state, effects)
}

fn timed_out(state: &JobState) -> TerminalOutcome {
    TerminalOutcome::TimedOut(format!(
        "Timed out after {}s waiting for the transcription",
        state.policy().max_duration().as_secs()
    ))
}
