//! Bounded repeat-until-done loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::core::error::{CcError, ClientErrorCode};

/// What one polling tick decided.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    /// Stop polling and return the value.
    Done(T),
    /// Try again after the interval.
    Continue,
}

/// Configure polling behavior.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Overall deadline. `None` polls until done, cancelled or out of attempts.
    pub timeout: Option<Duration>,
    /// Maximum number of ticks.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }
}

/// Runs `tick` until it returns [`PollStep::Done`].
///
/// The first tick runs immediately. An error returned by `tick` stops the loop
/// and is returned as is. Ends with `TIMEOUT_EXCEEDED` when the deadline passes,
/// `POLLING_MAX_ATTEMPTS` when the attempts run out and `POLLING_CANCELLED` when
/// `cancel` fires. A tick in flight when the deadline or cancellation hits is dropped.
pub async fn poll<T, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut tick: F,
) -> Result<T, CcError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, CcError>>,
{
    // A timeout too large for `Instant` means no deadline.
    let deadline = config.timeout.and_then(|t| Instant::now().checked_add(t));
    let mut attempt = 0u32;

    loop {
        if let Some(max) = config.max_attempts
            && attempt >= max
        {
            return Err(CcError::client(
                ClientErrorCode::PollingMaxAttempts,
                format!("gave up after {attempt} attempts"),
            ));
        }
        attempt += 1;

        let step = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = until(deadline) => return Err(timed_out(config)),
            step = tick(attempt) => step?,
        };
        if let PollStep::Done(value) = step {
            return Ok(value);
        }
        tracing::trace!(attempt, "poll: not done yet");

        if config.max_attempts.is_some_and(|max| attempt >= max) {
            continue;
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = until(deadline) => return Err(timed_out(config)),
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn cancelled() -> CcError {
    CcError::client(ClientErrorCode::PollingCancelled, "polling cancelled")
}

fn timed_out(config: &PollConfig) -> CcError {
    let ms = config.timeout.map(|t| t.as_millis()).unwrap_or_default();
    CcError::client(
        ClientErrorCode::TimeoutExceeded,
        format!("polling did not finish within {ms}ms"),
    )
}
