//! Public client surface + builder.
//! Internals are split into `command` (the four command kinds), `config`
//! (per-request override layers) and `constants` (UA + defaults).

mod command;
mod config;
mod constants;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use url::Url;

use crate::core::auth::{AuthStrategy, NoAuth};
use crate::core::cache::{CacheMode, CacheStore};
use crate::core::error::{CcError, ClientErrorCode, TransportErrorCode};
use crate::core::net;
use crate::core::request::{RequestDescriptor, ResponseDescriptor};
use crate::stream::{CcStream, StreamConfig, StreamConfigOverride, StreamSource};

pub use command::{
    Command, CommandParams, CompositeCommand, Composer, EmptyResponsePolicy, GetUrlCommand,
    Outcome, RequestCommand, SimpleCommand, StreamCommand, UrlParams,
};
pub use config::RequestConfigOverride;
use constants::USER_AGENT;

pub type RequestHook = Arc<dyn Fn(RequestDescriptor) -> RequestDescriptor + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(&ResponseDescriptor) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&CcError) + Send + Sync>;

/// Rewrites command params before a command turns them into a request.
///
/// Derived clients use it to fill in values the caller left out (an owner id,
/// a default region...). Both methods default to the identity.
pub trait ParamsTransformer: Send + Sync {
    fn transform_command_params(
        &self,
        params: CommandParams,
        _config: &RequestConfigOverride,
    ) -> Result<CommandParams, CcError> {
        Ok(params)
    }

    fn transform_stream_params(
        &self,
        params: CommandParams,
        _config: &StreamConfig,
    ) -> Result<CommandParams, CcError> {
        Ok(params)
    }
}

/// Observability and rewrite points around every request.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Last rewrite of the request before it is sent.
    pub on_request: Option<RequestHook>,
    pub on_response: Option<ResponseHook>,
    /// Sees every failure before it is returned unchanged.
    pub on_error: Option<ErrorHook>,
}

struct ClientConfig {
    base_url: Url,
    auth: Arc<dyn AuthStrategy>,
    request_config: RequestConfigOverride,
    stream_config: StreamConfigOverride,
    hooks: Hooks,
    params_transformer: Option<Arc<dyn ParamsTransformer>>,
}

/// Runs commands: resolves config, signs, caches, and hands back typed outputs or streams.
///
/// Cloning is cheap; clones share configuration and cache.
#[derive(Clone)]
pub struct CcClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    cache: Arc<CacheStore>,
}

impl fmt::Debug for CcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CcClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("auth", &self.config.auth)
            .field("request_config", &self.config.request_config)
            .field("stream_config", &self.config.stream_config)
            .finish_non_exhaustive()
    }
}

impl CcClient {
    /// Create a new builder.
    pub fn builder() -> CcClientBuilder {
        CcClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Runs a simple or composite command and returns its output.
    ///
    /// `config` is layered over the client-level request config.
    #[tracing::instrument(skip_all, err, fields(kind = command.kind()))]
    pub async fn send<T: Send + 'static>(
        &self,
        command: &Command<T>,
        config: Option<&RequestConfigOverride>,
    ) -> Result<T, CcError> {
        let merged = match config {
            Some(over) => self.config.request_config.merge(over),
            None => self.config.request_config,
        };
        self.send_resolved(command, merged).await
    }

    /// Runs any command kind, matching on the variant.
    pub async fn execute<T: Send + 'static>(
        &self,
        command: &Command<T>,
        config: Option<&RequestConfigOverride>,
    ) -> Result<Outcome<T>, CcError> {
        match command {
            Command::Simple(_) | Command::Composite(_) => {
                self.send(command, config).await.map(Outcome::Value)
            }
            Command::GetUrl(_) => self.get_url(command).map(Outcome::Url),
            Command::Stream(_) => self.stream(command, None).map(Outcome::Stream),
        }
    }

    pub(crate) fn send_resolved<'a, T: Send + 'static>(
        &'a self,
        command: &'a Command<T>,
        config: RequestConfigOverride,
    ) -> BoxFuture<'a, Result<T, CcError>> {
        Box::pin(async move {
            match command {
                Command::Simple(cmd) => self.send_simple(cmd.as_ref(), config).await,
                Command::Composite(cmd) => {
                    let params = self.transform_command_params(cmd.params(), &config)?;
                    cmd.compose(params, Composer::new(self, config)).await
                }
                other => Err(invalid_command(other.kind(), "send")),
            }
        })
    }

    async fn send_simple<T>(
        &self,
        command: &dyn SimpleCommand<Output = T>,
        config: RequestConfigOverride,
    ) -> Result<T, CcError> {
        let request = self
            .prepare_simple(command, &config)
            .map_err(|e| self.report(e))?;

        let http = &self.http;
        let response = self
            .cache
            .request_with_cache(&request, request.cache.as_ref(), || {
                net::send_request(http, &request)
            })
            .await
            .map_err(|e| self.report(e))?;

        if let Some(hook) = &self.config.hooks.on_response {
            hook(&response);
        }

        if let Some(policy) = command.empty_response_policy()
            && policy.matches(&response)
        {
            return Ok(policy.into_fallback());
        }
        command.transform_command_output(response.body)
    }

    /// Builds the absolute, signed URL of a get-url command. No network call.
    pub fn get_url<T>(&self, command: &Command<T>) -> Result<Url, CcError> {
        let Command::GetUrl(cmd) = command else {
            return Err(invalid_command(command.kind(), "get_url"));
        };
        let params = self.transform_command_params(cmd.params(), &self.config.request_config)?;
        let target = cmd.to_url_params(&params)?;
        let mut url = join_base(&self.config.base_url, &target.path)?;
        target.query.apply_to(&mut url);
        self.config.auth.apply_on_url(url)
    }

    /// Builds the engine of a stream command without starting it.
    ///
    /// Stream settings stack as library defaults < client-level override < `config`.
    pub fn stream<T>(
        &self,
        command: &Command<T>,
        config: Option<&StreamConfigOverride>,
    ) -> Result<CcStream, CcError> {
        let Command::Stream(cmd) = command else {
            return Err(invalid_command(command.kind(), "stream"));
        };
        let layered = match config {
            Some(over) => self.config.stream_config.merge(over),
            None => self.config.stream_config.clone(),
        };
        let stream_config = layered.apply(&StreamConfig::default());
        let params = self.transform_stream_params(cmd.params(), &stream_config)?;

        let client = self.clone();
        let factory_cmd = Arc::clone(cmd);
        let source = StreamSource::new(self.http.clone(), move || {
            let request = client.resolve(factory_cmd.to_request_params(&params)?)?;
            client.finish_request(request)
        });
        Ok(cmd.create_stream(source, stream_config))
    }

    /* -------- pipeline steps -------- */

    fn prepare_simple<T>(
        &self,
        command: &dyn SimpleCommand<Output = T>,
        config: &RequestConfigOverride,
    ) -> Result<RequestDescriptor, CcError> {
        let params = self.transform_command_params(command.params(), config)?;
        let request = self.resolve(command.to_request_params(&params)?)?;
        self.finish_request(config.apply_to(request))
    }

    fn transform_command_params(
        &self,
        params: CommandParams,
        config: &RequestConfigOverride,
    ) -> Result<CommandParams, CcError> {
        match &self.config.params_transformer {
            Some(t) => t.transform_command_params(params, config),
            None => Ok(params),
        }
    }

    fn transform_stream_params(
        &self,
        params: CommandParams,
        config: &StreamConfig,
    ) -> Result<CommandParams, CcError> {
        match &self.config.params_transformer {
            Some(t) => t.transform_stream_params(params, config),
            None => Ok(params),
        }
    }

    /// Prepends the base URL to relative targets.
    fn resolve(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor, CcError> {
        request.url = join_base(&self.config.base_url, &request.url)?.into();
        Ok(request)
    }

    /// Auth, then the `on_request` hook.
    fn finish_request(&self, request: RequestDescriptor) -> Result<RequestDescriptor, CcError> {
        let request = self.config.auth.apply_on_request_params(request)?;
        Ok(match &self.config.hooks.on_request {
            Some(hook) => hook(request),
            None => request,
        })
    }

    fn report(&self, err: CcError) -> CcError {
        if let Some(hook) = &self.config.hooks.on_error {
            hook(&err);
        }
        err
    }
}

fn join_base(base: &Url, target: &str) -> Result<Url, CcError> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                target.trim_start_matches('/')
            );
            Ok(Url::parse(&joined)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn invalid_command(kind: &str, entry: &str) -> CcError {
    CcError::client(
        ClientErrorCode::InvalidCommand,
        format!("{kind} command cannot be run by `{entry}`"),
    )
}

/* ----------------------- Builder ----------------------- */

#[derive(Default)]
pub struct CcClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    connect_timeout: Option<Duration>,
    http: Option<reqwest::Client>,
    auth: Option<Arc<dyn AuthStrategy>>,
    request_config: RequestConfigOverride,
    stream_config: StreamConfigOverride,
    hooks: Hooks,
    params_transformer: Option<Arc<dyn ParamsTransformer>>,
}

impl CcClientBuilder {
    /// Base URL prepended to every relative command path. Required.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Override the User-Agent. Ignored when a custom HTTP client is supplied.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set a connect timeout. Default: none. Ignored when a custom HTTP client is supplied.
    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = Some(dur);
        self
    }

    /// Use a preconfigured transport (proxies, TLS roots, ...).
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// How requests and URLs are signed. Default: [`NoAuth`].
    pub fn auth(mut self, auth: impl AuthStrategy + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Set the default per-request timeout. Default: none.
    pub fn timeout(mut self, dur: Duration) -> Self {
        self.request_config.timeout = Some(dur);
        self
    }

    /// Enable in-memory caching with a default TTL.
    /// If not set, caching is disabled unless a call enables it.
    pub fn cache_ttl(mut self, dur: Duration) -> Self {
        self.request_config.cache_ttl = Some(dur);
        self.request_config.cache_mode.get_or_insert(CacheMode::Use);
        self
    }

    /// Client-level request settings, layered under per-call overrides.
    pub fn request_config(mut self, config: RequestConfigOverride) -> Self {
        self.request_config = self.request_config.merge(&config);
        self
    }

    /// Client-level stream settings, layered under per-call overrides.
    pub fn stream_config(mut self, config: StreamConfigOverride) -> Self {
        self.stream_config = self.stream_config.merge(&config);
        self
    }

    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(RequestDescriptor) -> RequestDescriptor + Send + Sync + 'static,
    {
        self.hooks.on_request = Some(Arc::new(hook));
        self
    }

    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseDescriptor) + Send + Sync + 'static,
    {
        self.hooks.on_response = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CcError) + Send + Sync + 'static,
    {
        self.hooks.on_error = Some(Arc::new(hook));
        self
    }

    pub fn params_transformer(mut self, transformer: impl ParamsTransformer + 'static) -> Self {
        self.params_transformer = Some(Arc::new(transformer));
        self
    }

    pub fn build(self) -> Result<CcClient, CcError> {
        let base_url = self.base_url.ok_or_else(|| {
            CcError::transport(TransportErrorCode::InvalidUrl, "a base URL is required")
        })?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut httpb = reqwest::Client::builder()
                    .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT));
                if let Some(ct) = self.connect_timeout {
                    httpb = httpb.connect_timeout(ct);
                }
                httpb.build()?
            }
        };

        Ok(CcClient {
            http,
            config: Arc::new(ClientConfig {
                base_url,
                auth: self.auth.unwrap_or_else(|| Arc::new(NoAuth)),
                request_config: self.request_config,
                stream_config: self.stream_config,
                hooks: self.hooks,
                params_transformer: self.params_transformer,
            }),
            cache: Arc::new(CacheStore::new()),
        })
    }
}
