use std::time::Duration;

use crate::core::error::{CcError, ClientErrorCode, TransportErrorCode};

/// Configuration for the automatic reconnection of a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// The maximum number of retries. The total number of attempts over one `start()` is
    /// `max_retry_count + 1`, successful connections in between included.
    pub max_retry_count: u32,
    /// The delay before the first retry.
    pub init_retry_timeout: Duration,
    /// The multiplicative factor applied for each subsequent retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            init_retry_timeout: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, init_retry_timeout: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retry_count,
            init_retry_timeout,
            backoff_factor,
        }
    }

    /// Delay before retry number `retry_index` (0-based): `init * factor^index`.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let exp = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.init_retry_timeout.as_secs_f64() * self.backoff_factor.powi(exp);
        if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }
}

/// Partial retry settings merged field by field over an inherited policy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryPolicyOverride {
    pub max_retry_count: Option<u32>,
    pub init_retry_timeout: Option<Duration>,
    pub backoff_factor: Option<f64>,
}

impl RetryPolicyOverride {
    /// Applies these fields over `base`, falling back to [`RetryPolicy::default`].
    pub fn apply(&self, base: Option<&RetryPolicy>) -> RetryPolicy {
        let base = base.cloned().unwrap_or_default();
        RetryPolicy {
            max_retry_count: self.max_retry_count.unwrap_or(base.max_retry_count),
            init_retry_timeout: self.init_retry_timeout.unwrap_or(base.init_retry_timeout),
            backoff_factor: self.backoff_factor.unwrap_or(base.backoff_factor),
        }
    }

    fn merge(&self, over: &Self) -> Self {
        Self {
            max_retry_count: over.max_retry_count.or(self.max_retry_count),
            init_retry_timeout: over.init_retry_timeout.or(self.init_retry_timeout),
            backoff_factor: over.backoff_factor.or(self.backoff_factor),
        }
    }
}

/// How an override layer touches the retry policy.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryOverride {
    /// Turn retries off.
    Disabled,
    /// Patch individual fields.
    Set(RetryPolicyOverride),
}

impl RetryOverride {
    pub(crate) fn apply(&self, base: Option<&RetryPolicy>) -> Option<RetryPolicy> {
        match self {
            Self::Disabled => None,
            Self::Set(patch) => Some(patch.apply(base)),
        }
    }

    pub(crate) fn merge(&self, over: &Self) -> Self {
        match (self, over) {
            (Self::Set(a), Self::Set(b)) => Self::Set(a.merge(b)),
            (_, over) => over.clone(),
        }
    }
}

/// 400, 401 and 403 mean the request itself is wrong; retrying would not help.
pub(crate) fn is_fatal(err: &CcError) -> bool {
    matches!(err.status(), Some(400 | 401 | 403))
}

/// Failures worth another attempt when a retry policy is configured.
pub(crate) fn is_retryable(err: &CcError) -> bool {
    match err {
        CcError::Http { status, .. } => matches!(status, 408 | 429) || *status >= 500,
        CcError::Client { code, .. } => matches!(
            code,
            ClientErrorCode::SseHealthError
                | ClientErrorCode::SseServerError
                | ClientErrorCode::TimeoutExceeded
        ),
        CcError::Transport { code, .. } => *code == TransportErrorCode::NetworkError,
    }
}
