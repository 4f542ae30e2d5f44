//! cc-client: a resilient runtime for talking to a versioned HTTP API.
//!
//! The crate turns *commands* (small declarative descriptions of one API call)
//! into HTTP traffic, and Server-Sent-Events endpoints into long-lived streams
//! that survive network trouble.
//!
//! - [`CcClient`] runs commands: it resolves layered config, applies the
//!   configured [`AuthStrategy`], consults the response cache, and turns
//!   failures into a single [`CcError`] taxonomy.
//! - [`CcStream`] consumes an SSE endpoint with heartbeat health checks,
//!   exponential backoff, `Last-Event-Id` resumption and pause/resume.
//!
//! ```no_run
//! use cc_client::{CcClient, Command, RequestCommand, RequestDescriptor};
//!
//! # async fn demo() -> Result<(), cc_client::CcError> {
//! let client = CcClient::builder()
//!     .base_url("https://api.example.com/v2".parse().expect("valid url"))
//!     .build()?;
//!
//! let cmd: Command<_> = RequestCommand::new(RequestDescriptor::get("/self")).into();
//! let body = client.send(&cmd, None).await?;
//! println!("{:?}", body.as_json());
//! # Ok(()) }
//! ```
//!
//! Logging goes through `tracing`. Enable the `tracing-subscriber` feature to
//! pull in a ready-made subscriber for binaries and tests.

pub mod core;
pub mod stream;

pub use crate::core::{
    AuthStrategy, BearerAuth, CacheConfig, CacheMode, CacheStore, CcClient, CcClientBuilder,
    CcError, ClientErrorCode, Command, CommandParams, CompositeCommand, Composer,
    EmptyResponsePolicy, ErrorFamily, GetUrlCommand, HeaderSet, Hooks, NoAuth, OAuth1Auth,
    OAuth1Credentials, Outcome, ParamsTransformer, PollConfig, PollStep, QueryParams,
    RequestBody, RequestCommand, RequestConfigOverride, RequestDescriptor, ResponseBody,
    ResponseDescriptor, SimpleCommand, StreamCommand, TransportErrorCode, UrlParams, poll,
};
pub use stream::{
    CcStream, EndOfStream, RetryOverride, RetryPolicy, RetryPolicyOverride, StreamConfig,
    StreamConfigOverride, StreamEvent, StreamOutcome, StreamPhase, StreamSource,
};
