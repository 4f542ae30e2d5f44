//! TTL cache in front of the request executor.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::error::CcError;
use crate::core::request::{RequestDescriptor, ResponseDescriptor};

/// Defines the behavior of the in-memory cache for an API call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present; otherwise, fetch from the network
    /// and write the response to the cache. (Default)
    #[default]
    Use,
    /// Always fetch from the network, bypassing any cached entry, and write the new response to the cache.
    Reload,
    /// Always fetch from the network and do not read from or write to the cache.
    Bypass,
}

/// Per-request cache policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub mode: CacheMode,
}

impl CacheConfig {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            mode: CacheMode::Use,
        }
    }

    pub fn mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug)]
struct CacheEntry {
    response: ResponseDescriptor,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now <= at)
    }
}

/// Shared response cache. Entries are replaced as a whole, never edited.
#[derive(Debug, Default)]
pub struct CacheStore {
    map: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: method, URL without its query, then the sorted query.
    /// Headers and body are not part of the key.
    pub fn key_for(request: &RequestDescriptor) -> Result<String, CcError> {
        let mut url = request.full_url()?;
        let query = crate::core::query::QueryParams::from_url(&url).canonical();
        url.set_query(None);
        url.set_fragment(None);
        Ok(format!("{} {}?{}", request.method, url, query))
    }

    async fn get(&self, key: &str) -> Option<ResponseDescriptor> {
        let guard = self.map.read().await;
        if let Some(entry) = guard.get(key)
            && entry.is_live(Instant::now())
        {
            let mut response = entry.response.clone();
            response.cache_hit = true;
            return Some(response);
        }
        None
    }

    async fn put(&self, key: String, response: &ResponseDescriptor, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            response: response.clone(),
            expires_at: now.checked_add(ttl),
        };
        let mut guard = self.map.write().await;
        guard.retain(|_, e| e.is_live(now));
        guard.insert(key, entry);
    }

    /// Runs `send` unless a live entry can answer for `request`.
    ///
    /// With `config == None` or [`CacheMode::Bypass`] the cache is neither read nor
    /// written. Failed requests are never stored. Concurrent misses on the same key
    /// are not coalesced: each one goes to the network and the last store wins.
    pub async fn request_with_cache<F, Fut>(
        &self,
        request: &RequestDescriptor,
        config: Option<&CacheConfig>,
        send: F,
    ) -> Result<ResponseDescriptor, CcError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResponseDescriptor, CcError>>,
    {
        let Some(config) = config.filter(|c| c.mode != CacheMode::Bypass) else {
            return send().await;
        };
        let key = Self::key_for(request)?;

        if config.mode == CacheMode::Use
            && let Some(hit) = self.get(&key).await
        {
            tracing::trace!(%key, "cache hit");
            return Ok(hit);
        }

        let response = send().await?;
        tracing::trace!(%key, ttl = ?config.ttl, mode = ?config.mode, "cache store");
        self.put(key, &response, config.ttl).await;
        Ok(response)
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.map.write().await.clear();
    }

    /// Number of stored entries, expired ones included until the next write.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
