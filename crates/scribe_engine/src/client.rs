use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scribe_core::{
    update, Effect, Job, JobId, JobState, JobView, Msg, PollObservation, PollPolicy, PollTicket,
    ProgressEvent, TerminalEvent,
};
use scribe_logging::{scribe_debug, scribe_info, scribe_trace, scribe_warn};
use tokio::task::JoinHandle;

use crate::{ApiError, Clock, FailureKind, JobApi, JobObserver, SubmitError, TokioClock, Upload};

/// Returned by a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    job_id: JobId,
    epoch: u64,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Owns one transcription job at a time and drives its poll loop.
///
/// Submitting again supersedes the previous job: its loop stops and anything
/// it still receives is discarded. Dropping the client stops the loop too.
/// Must be used from within a tokio runtime.
pub struct JobClient {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn JobApi>,
    observer: Arc<dyn JobObserver>,
    clock: Arc<dyn Clock>,
    state: Mutex<JobState>,
    outbox: Mutex<Outbox>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

enum Notification {
    Progress(ProgressEvent),
    Terminal(TerminalEvent),
}

/// Notifications wait here in update order. Whoever finds `delivering`
/// unset drains the queue with no lock held; everyone else only enqueues,
/// so an observer may call back into the client.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notification>,
    delivering: bool,
}

impl JobClient {
    pub fn new(api: Arc<dyn JobApi>, observer: Arc<dyn JobObserver>, policy: PollPolicy) -> Self {
        Self::with_clock(api, observer, policy, Arc::new(TokioClock::new()))
    }

    pub fn with_clock(
        api: Arc<dyn JobApi>,
        observer: Arc<dyn JobObserver>,
        policy: PollPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                observer,
                clock,
                state: Mutex::new(JobState::new(policy)),
                outbox: Mutex::new(Outbox::default()),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Uploads `upload` and starts polling for it.
    ///
    /// On failure the client is back to idle and no loop runs.
    pub async fn submit(&self, upload: Upload) -> Result<JobHandle, SubmitError> {
        self.inner.stop_poll_task();
        let effects = self.inner.dispatch(Msg::SubmitRequested {
            label: upload.file_name().to_string(),
        });
        let Some(epoch) = effects.iter().find_map(|effect| match effect {
            Effect::SendSubmission { epoch } => Some(*epoch),
            _ => None,
        }) else {
            return Err(superseded());
        };

        match self.inner.api.submit(&upload).await {
            Ok(job_id) => {
                let effects = self.inner.dispatch(Msg::SubmitAccepted {
                    epoch,
                    job_id: job_id.clone(),
                    now: self.inner.clock.now(),
                });
                let started = first_scheduled_poll(effects)
                    .is_some_and(|(ticket, delay)| self.spawn_poll_loop(ticket, delay));
                if started {
                    scribe_info!("Job {} accepted for {}", job_id, upload.file_name());
                    Ok(JobHandle { job_id, epoch })
                } else {
                    scribe_info!(
                        "Job {} accepted after its submission was superseded; ignoring",
                        job_id
                    );
                    Err(superseded())
                }
            }
            Err(err) => {
                scribe_warn!("Submitting {} failed: {}", upload.file_name(), err);
                self.inner.dispatch(Msg::SubmitRejected {
                    epoch,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Stops polling and marks the job cancelled. The server is not told.
    pub fn cancel(&self) {
        self.inner.dispatch(Msg::CancelRequested);
        self.inner.stop_poll_task();
    }

    /// Stops polling and returns to idle without a terminal event.
    pub fn clear(&self) {
        self.inner.stop_poll_task();
        self.inner.dispatch(Msg::Cleared);
    }

    /// Ends the client's lifecycle.
    pub fn dispose(self) {
        self.clear();
    }

    pub fn current_state(&self) -> Job {
        self.inner.lock_state().job().clone()
    }

    pub fn view(&self) -> JobView {
        self.inner.lock_state().view()
    }

    /// Returns the view only if something changed since the last call.
    pub fn take_view_if_dirty(&self) -> Option<JobView> {
        let mut state = self.inner.lock_state();
        let view = state.view();
        state.consume_dirty().then_some(view)
    }

    pub fn policy(&self) -> PollPolicy {
        *self.inner.lock_state().policy()
    }

    /// Starts the loop for `ticket` unless a cancel or a newer submit got in
    /// first. The slot lock is held across the check so a concurrent cancel
    /// either wins the check or finds the new task to abort.
    fn spawn_poll_loop(&self, ticket: PollTicket, delay: Duration) -> bool {
        let mut slot = self
            .inner
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.inner.lock_state().is_current(&ticket) {
            return false;
        }
        let handle = tokio::spawn(run_poll_loop(self.inner.clone(), ticket, delay));
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        true
    }
}

impl Drop for JobClient {
    fn drop(&mut self) {
        self.inner.stop_poll_task();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `msg`, delivers notifications, and returns the effects left for
    /// the caller to execute.
    fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let mut pending = Vec::new();
        {
            let mut guard = self.lock_state();
            let state = std::mem::take(&mut *guard);
            let (state, effects) = update(state, msg);
            *guard = state;

            // Enqueued before the state lock drops so the queue keeps update order.
            let mut outbox = self.lock_outbox();
            for effect in effects {
                match effect {
                    Effect::Progress(event) => outbox.queue.push_back(Notification::Progress(event)),
                    Effect::Terminal(event) => outbox.queue.push_back(Notification::Terminal(event)),
                    other => pending.push(other),
                }
            }
        }
        self.deliver();
        pending
    }

    fn deliver(&self) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }
        loop {
            let next = {
                let mut outbox = self.lock_outbox();
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            match next {
                Notification::Progress(event) => {
                    scribe_debug!("Job {} progress {}%", event.job_id, event.percent);
                    self.observer.on_progress(&event);
                }
                Notification::Terminal(event) => {
                    let job = event
                        .job_id
                        .as_ref()
                        .map(JobId::to_string)
                        .unwrap_or_else(|| "<pending>".to_string());
                    scribe_info!("Job {} finished: {}", job, event.phase);
                    self.observer.on_terminal(&event);
                }
            }
        }
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_poll_task(&self) {
        let previous = self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = previous {
            handle.abort();
        }
    }
}

/// One poll at a time: the next one is scheduled only after the previous
/// request resolved.
async fn run_poll_loop(inner: Arc<Inner>, mut ticket: PollTicket, mut delay: Duration) {
    loop {
        inner.clock.sleep(delay).await;

        let effects = inner.dispatch(Msg::PollDue {
            ticket: ticket.clone(),
            now: inner.clock.now(),
        });
        let Some(fetch) = effects.into_iter().find_map(|effect| match effect {
            Effect::FetchStatus { ticket } => Some(ticket),
            _ => None,
        }) else {
            scribe_trace!("Poll loop for job {} stopping at tick", ticket.job_id);
            return;
        };

        let observation = match inner.api.poll(&fetch.job_id).await {
            Ok(status) => {
                scribe_debug!("Job {} reported {}", fetch.job_id, status.raw_label());
                PollObservation::Status(status)
            }
            Err(err) => {
                scribe_debug!("Transient poll failure for job {}: {}", fetch.job_id, err);
                PollObservation::Transient {
                    reason: err.to_string(),
                }
            }
        };

        let effects = inner.dispatch(Msg::PollResolved {
            ticket: fetch,
            observation,
            now: inner.clock.now(),
        });
        match first_scheduled_poll(effects) {
            Some((next, next_delay)) => {
                ticket = next;
                delay = next_delay;
            }
            None => {
                scribe_trace!("Poll loop for job {} finished", ticket.job_id);
                return;
            }
        }
    }
}

fn first_scheduled_poll(effects: Vec<Effect>) -> Option<(PollTicket, Duration)> {
    effects.into_iter().find_map(|effect| match effect {
        Effect::SchedulePoll { ticket, delay } => Some((ticket, delay)),
        _ => None,
    })
}

fn superseded() -> ApiError {
    ApiError::new(
        FailureKind::Superseded,
        "the submission was cancelled or replaced before the server answered",
    )
}
