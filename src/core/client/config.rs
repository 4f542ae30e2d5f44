use std::time::Duration;

use crate::core::cache::{CacheConfig, CacheMode};
use crate::core::request::RequestDescriptor;

/// A layer of per-request settings. Unset fields inherit from the layer below
/// (call > composite parent > client > command defaults).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestConfigOverride {
    /// `Duration::ZERO` disables the timeout.
    pub timeout: Option<Duration>,
    /// Enables caching with this TTL.
    pub cache_ttl: Option<Duration>,
    pub cache_mode: Option<CacheMode>,
    pub cors: Option<bool>,
    pub debug: Option<bool>,
}

impl RequestConfigOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Enable in-memory caching with this TTL.
    pub fn cache_ttl(mut self, dur: Duration) -> Self {
        self.cache_ttl = Some(dur);
        self
    }

    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = Some(mode);
        self
    }

    pub fn cors(mut self, yes: bool) -> Self {
        self.cors = Some(yes);
        self
    }

    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = Some(yes);
        self
    }

    /// Stacks `over` on top of `self`; `over` wins field by field.
    pub fn merge(&self, over: &Self) -> Self {
        Self {
            timeout: over.timeout.or(self.timeout),
            cache_ttl: over.cache_ttl.or(self.cache_ttl),
            cache_mode: over.cache_mode.or(self.cache_mode),
            cors: over.cors.or(self.cors),
            debug: over.debug.or(self.debug),
        }
    }

    /// Writes the fields that are set into `request`.
    ///
    /// A cache mode without a TTL only changes the mode of a cache policy the
    /// request already carries.
    pub fn apply_to(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if let Some(t) = self.timeout {
            request.timeout = t;
        }
        request.cache = match (self.cache_ttl, request.cache) {
            (Some(ttl), current) => Some(CacheConfig {
                ttl,
                mode: self
                    .cache_mode
                    .or(current.map(|c| c.mode))
                    .unwrap_or_default(),
            }),
            (None, Some(current)) => Some(current.mode(self.cache_mode.unwrap_or(current.mode))),
            (None, None) => None,
        };
        if let Some(cors) = self.cors {
            request.cors = cors;
        }
        if let Some(debug) = self.debug {
            request.debug = debug;
        }
        request
    }
}
