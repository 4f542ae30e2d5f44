//! The four kinds of command a [`CcClient`](super::CcClient) can run.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

use super::CcClient;
use super::config::RequestConfigOverride;
use crate::core::error::CcError;
use crate::core::query::QueryParams;
use crate::core::request::{RequestDescriptor, ResponseBody, ResponseDescriptor};
use crate::stream::{CcStream, StreamConfig, StreamSource};

/// Free-form command parameters, threaded through the client's params transformer.
pub type CommandParams = Value;

type EmptyPredicate = Box<dyn Fn(&ResponseDescriptor) -> bool + Send + Sync>;

/// Maps a successful but content-free response to a fallback value.
pub struct EmptyResponsePolicy<T> {
    predicate: EmptyPredicate,
    fallback: T,
}

impl<T> EmptyResponsePolicy<T> {
    pub fn new<P>(predicate: P, fallback: T) -> Self
    where
        P: Fn(&ResponseDescriptor) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            fallback,
        }
    }

    /// Matches `204 No Content` and any empty body.
    pub fn no_content(fallback: T) -> Self {
        Self::new(|r| r.status == 204 || r.body.is_empty(), fallback)
    }

    pub fn matches(&self, response: &ResponseDescriptor) -> bool {
        (self.predicate)(response)
    }

    pub fn into_fallback(self) -> T {
        self.fallback
    }
}

impl<T: fmt::Debug> fmt::Debug for EmptyResponsePolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmptyResponsePolicy")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// One request, one response.
pub trait SimpleCommand: Send + Sync {
    type Output;

    fn params(&self) -> CommandParams {
        Value::Null
    }

    /// Builds the request from the (transformed) params. The URL may be a path
    /// relative to the client's base URL.
    fn to_request_params(&self, params: &CommandParams) -> Result<RequestDescriptor, CcError>;

    fn empty_response_policy(&self) -> Option<EmptyResponsePolicy<Self::Output>> {
        None
    }

    /// Turns the decoded body into the command's output.
    fn transform_command_output(&self, body: ResponseBody) -> Result<Self::Output, CcError>;
}

/// Fans out to other commands through the [`Composer`] and combines their results.
pub trait CompositeCommand: Send + Sync {
    type Output;

    fn params(&self) -> CommandParams {
        Value::Null
    }

    fn compose<'a>(
        &'a self,
        params: CommandParams,
        composer: Composer<'a>,
    ) -> BoxFuture<'a, Result<Self::Output, CcError>>;
}

/// Path and query of a URL handed out without being fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    pub path: String,
    pub query: QueryParams,
}

impl UrlParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: QueryParams::new(),
        }
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(key, value);
        self
    }
}

/// Produces a signed absolute URL. No network call.
pub trait GetUrlCommand: Send + Sync {
    fn params(&self) -> CommandParams {
        Value::Null
    }

    fn to_url_params(&self, params: &CommandParams) -> Result<UrlParams, CcError>;
}

/// Produces an SSE stream. `to_request_params` runs again for every connection attempt.
pub trait StreamCommand: Send + Sync {
    fn params(&self) -> CommandParams {
        Value::Null
    }

    fn to_request_params(&self, params: &CommandParams) -> Result<RequestDescriptor, CcError>;

    /// Builds the (un-started) engine.
    fn create_stream(&self, source: StreamSource, config: StreamConfig) -> CcStream {
        CcStream::new(source, config)
    }
}

/// A command of any kind. `T` is the output of simple and composite commands.
pub enum Command<T> {
    Simple(Arc<dyn SimpleCommand<Output = T>>),
    Composite(Arc<dyn CompositeCommand<Output = T>>),
    GetUrl(Arc<dyn GetUrlCommand>),
    Stream(Arc<dyn StreamCommand>),
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Simple(c) => Self::Simple(Arc::clone(c)),
            Self::Composite(c) => Self::Composite(Arc::clone(c)),
            Self::GetUrl(c) => Self::GetUrl(Arc::clone(c)),
            Self::Stream(c) => Self::Stream(Arc::clone(c)),
        }
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command::{}", self.kind())
    }
}

impl<T> Command<T> {
    pub fn simple(command: impl SimpleCommand<Output = T> + 'static) -> Self {
        Self::Simple(Arc::new(command))
    }

    pub fn composite(command: impl CompositeCommand<Output = T> + 'static) -> Self {
        Self::Composite(Arc::new(command))
    }

    pub fn get_url(command: impl GetUrlCommand + 'static) -> Self {
        Self::GetUrl(Arc::new(command))
    }

    pub fn stream(command: impl StreamCommand + 'static) -> Self {
        Self::Stream(Arc::new(command))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple(_) => "Simple",
            Self::Composite(_) => "Composite",
            Self::GetUrl(_) => "GetUrl",
            Self::Stream(_) => "Stream",
        }
    }

    pub fn params(&self) -> CommandParams {
        match self {
            Self::Simple(c) => c.params(),
            Self::Composite(c) => c.params(),
            Self::GetUrl(c) => c.params(),
            Self::Stream(c) => c.params(),
        }
    }
}

/// What [`CcClient::execute`] produced, by command kind.
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    Url(Url),
    Stream(CcStream),
}

/// Handed to [`CompositeCommand::compose`]; dispatches sub-commands through the
/// same client with the composite's config inherited.
pub struct Composer<'a> {
    client: &'a CcClient,
    config: RequestConfigOverride,
}

impl<'a> Composer<'a> {
    pub(crate) fn new(client: &'a CcClient, config: RequestConfigOverride) -> Self {
        Self { client, config }
    }

    /// Config inherited from the composite call.
    pub fn config(&self) -> &RequestConfigOverride {
        &self.config
    }

    pub fn client(&self) -> &'a CcClient {
        self.client
    }

    /// Sends `command`, with `config` merged over the inherited config.
    pub async fn send<U: Send + 'static>(
        &self,
        command: &Command<U>,
        config: Option<RequestConfigOverride>,
    ) -> Result<U, CcError> {
        let merged = match config {
            Some(over) => self.config.merge(&over),
            None => self.config,
        };
        self.client.send_resolved(command, merged).await
    }
}

/// A [`SimpleCommand`] around a ready-made request, returning the raw body.
#[derive(Debug, Clone)]
pub struct RequestCommand {
    request: RequestDescriptor,
    empty_fallback: Option<ResponseBody>,
}

impl RequestCommand {
    pub fn new(request: RequestDescriptor) -> Self {
        Self {
            request,
            empty_fallback: None,
        }
    }

    /// Return `fallback` for 204/empty responses.
    pub fn on_empty(mut self, fallback: ResponseBody) -> Self {
        self.empty_fallback = Some(fallback);
        self
    }
}

impl SimpleCommand for RequestCommand {
    type Output = ResponseBody;

    fn to_request_params(&self, _params: &CommandParams) -> Result<RequestDescriptor, CcError> {
        Ok(self.request.clone())
    }

    fn empty_response_policy(&self) -> Option<EmptyResponsePolicy<ResponseBody>> {
        self.empty_fallback
            .clone()
            .map(EmptyResponsePolicy::no_content)
    }

    fn transform_command_output(&self, body: ResponseBody) -> Result<ResponseBody, CcError> {
        Ok(body)
    }
}

impl From<RequestCommand> for Command<ResponseBody> {
    fn from(c: RequestCommand) -> Self {
        Command::simple(c)
    }
}
