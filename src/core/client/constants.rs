//! Centralized constants for client defaults.

/// Default User-Agent sent by clients built without an explicit one.
pub(crate) const USER_AGENT: &str = concat!("cc-client/", env!("CARGO_PKG_VERSION"));
