//! Core components of the client runtime.
//!
//! This module contains the foundational building blocks of the library, including:
//! - The main [`CcClient`] and its builder, plus the command abstractions it runs.
//! - The [`CcError`] taxonomy.
//! - Request/response descriptors, query and header helpers.
//! - Auth strategies, the response cache and polling.

/// Auth strategies applied to every outgoing request and signed URL.
pub mod auth;
/// In-memory response cache keyed by method, URL and canonical query.
pub mod cache;
/// The main client (`CcClient`), builder, commands and per-request config.
pub mod client;
/// The error taxonomy (`CcError`) for the crate.
pub mod error;
pub mod headers;
pub mod polling;
pub mod query;
/// Transport-agnostic request and response descriptors.
pub mod request;

pub(crate) mod net;

pub use auth::{AuthStrategy, BearerAuth, NoAuth, OAuth1Auth, OAuth1Credentials};
pub use cache::{CacheConfig, CacheMode, CacheStore};
pub use client::{
    CcClient, CcClientBuilder, Command, CommandParams, CompositeCommand, Composer,
    EmptyResponsePolicy, GetUrlCommand, Hooks, Outcome, ParamsTransformer, RequestCommand,
    RequestConfigOverride, SimpleCommand, StreamCommand, UrlParams,
};
pub use error::{CcError, ClientErrorCode, ErrorFamily, TransportErrorCode};
pub use headers::HeaderSet;
pub use polling::{PollConfig, PollStep, poll};
pub use query::QueryParams;
pub use request::{RequestBody, RequestDescriptor, ResponseBody, ResponseDescriptor};
