use std::time::Duration;

/// Monotonic time source and timer for the poll loop.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since a fixed, clock-specific origin.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by tokio's timer, so paused test runtimes control it too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
