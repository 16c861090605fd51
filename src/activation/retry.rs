// Bounded retry policy and injectable delay for activation polling

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Default number of verification attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default spacing between verification attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How many times to poll and how long to wait between polls
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Waits between polls. Swapped out in tests to avoid wall-clock sleeps.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately, recording each requested wait
#[derive(Debug, Default)]
pub struct RecordingDelay {
    calls: AtomicU32,
    total: Mutex<Duration>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waits requested
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sum of all requested waits
    pub fn total(&self) -> Duration {
        *self.total.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.total.lock().unwrap_or_else(|p| p.into_inner()) += duration;
    }
}
