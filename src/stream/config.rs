use std::time::Duration;

use super::retry::{RetryOverride, RetryPolicy, RetryPolicyOverride};

/// Default maximum silence before a stream is declared unhealthy.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);
/// Default cadence of the silence check.
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Fully resolved stream settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// `None` disables reconnection: the first failure is terminal.
    pub retry: Option<RetryPolicy>,
    /// Maximum silence (no event, no heartbeat) tolerated on an open connection.
    pub heartbeat_period: Duration,
    /// How often the silence is checked.
    pub healthcheck_interval: Duration,
    pub debug: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry: Some(RetryPolicy::default()),
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            healthcheck_interval: DEFAULT_HEALTHCHECK_INTERVAL,
            debug: false,
        }
    }
}

/// A layer of stream settings. Unset fields inherit from the layer below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamConfigOverride {
    pub retry: Option<RetryOverride>,
    pub heartbeat_period: Option<Duration>,
    pub healthcheck_interval: Option<Duration>,
    pub debug: Option<bool>,
}

impl StreamConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retry policy as a whole.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(RetryOverride::Set(RetryPolicyOverride {
            max_retry_count: Some(policy.max_retry_count),
            init_retry_timeout: Some(policy.init_retry_timeout),
            backoff_factor: Some(policy.backoff_factor),
        }));
        self
    }

    /// Patch individual retry fields, keeping the inherited ones.
    pub fn retry_fields(mut self, patch: RetryPolicyOverride) -> Self {
        self.retry = Some(RetryOverride::Set(patch));
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = Some(RetryOverride::Disabled);
        self
    }

    pub fn heartbeat_period(mut self, dur: Duration) -> Self {
        self.heartbeat_period = Some(dur);
        self
    }

    pub fn healthcheck_interval(mut self, dur: Duration) -> Self {
        self.healthcheck_interval = Some(dur);
        self
    }

    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = Some(yes);
        self
    }

    /// Stacks `over` on top of `self`; `over` wins field by field, `retry.*` included.
    pub fn merge(&self, over: &Self) -> Self {
        let retry = match (&self.retry, &over.retry) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => b.clone().or_else(|| a.clone()),
        };
        Self {
            retry,
            heartbeat_period: over.heartbeat_period.or(self.heartbeat_period),
            healthcheck_interval: over.healthcheck_interval.or(self.healthcheck_interval),
            debug: over.debug.or(self.debug),
        }
    }

    /// Applies this layer over `base`.
    pub fn apply(&self, base: &StreamConfig) -> StreamConfig {
        StreamConfig {
            retry: match &self.retry {
                Some(r) => r.apply(base.retry.as_ref()),
                None => base.retry.clone(),
            },
            heartbeat_period: self.heartbeat_period.unwrap_or(base.heartbeat_period),
            healthcheck_interval: self
                .healthcheck_interval
                .unwrap_or(base.healthcheck_interval),
            debug: self.debug.unwrap_or(base.debug),
        }
    }
}
