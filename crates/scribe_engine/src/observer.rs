use scribe_core::{ProgressEvent, TerminalEvent};
use tokio::sync::watch;

/// Receives job events from a `JobClient`.
///
/// Callbacks run on the poll loop's task and must return quickly. They may
/// read `JobClient::current_state` but must not call back into the client's
/// mutating methods.
pub trait JobObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
    fn on_terminal(&self, event: &TerminalEvent);
}

/// Observer that keeps only the latest event of each kind.
///
/// Each category is a `watch` channel, so at most one unconsumed event per
/// category is ever pending; a slow reader sees the newest one.
#[derive(Debug)]
pub struct WatchObserver {
    progress: watch::Sender<Option<ProgressEvent>>,
    terminal: watch::Sender<Option<TerminalEvent>>,
}

#[derive(Debug, Clone)]
pub struct EventReceivers {
    pub progress: watch::Receiver<Option<ProgressEvent>>,
    pub terminal: watch::Receiver<Option<TerminalEvent>>,
}

impl WatchObserver {
    pub fn new() -> (Self, EventReceivers) {
        let (progress, progress_rx) = watch::channel(None);
        let (terminal, terminal_rx) = watch::channel(None);
        (
            Self { progress, terminal },
            EventReceivers {
                progress: progress_rx,
                terminal: terminal_rx,
            },
        )
    }

    pub fn subscribe(&self) -> EventReceivers {
        EventReceivers {
            progress: self.progress.subscribe(),
            terminal: self.terminal.subscribe(),
        }
    }
}

impl JobObserver for WatchObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        self.progress.send_replace(Some(event.clone()));
    }

    fn on_terminal(&self, event: &TerminalEvent) {
        self.terminal.send_replace(Some(event.clone()));
    }
}
