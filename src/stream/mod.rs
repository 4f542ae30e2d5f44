//! Server-Sent-Events engine with reconnection, heartbeat health checks,
//! retry/backoff and resumable cursors.
//!
//! A [`CcStream`] is a cheap handle: clone it, spawn `start()` on one clone and
//! drive `pause()`/`resume()`/`close()` from another.
//!
//! ```no_run
//! # async fn demo(stream: cc_client::CcStream) -> Result<(), cc_client::CcError> {
//! stream.on("EVENT", |ev| println!("{}", ev.data));
//! stream.on_error(|err| eprintln!("reconnecting after {err}"));
//! let outcome = stream.start().await?;
//! println!("stream finished: {outcome:?}");
//! # Ok(()) }
//! ```

mod config;
mod event;
mod retry;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::error::{CcError, ClientErrorCode};
use crate::core::headers::{ACCEPT, LAST_EVENT_ID, MIME_EVENT_STREAM};
use crate::core::net;
use crate::core::request::RequestDescriptor;

pub use config::{
    DEFAULT_HEALTHCHECK_INTERVAL, DEFAULT_HEARTBEAT_PERIOD, StreamConfig, StreamConfigOverride,
};
pub use event::{
    END_OF_STREAM_EVENT, EndOfStream, HEARTBEAT_EVENT, SERVER_CLOSE_EVENT, StreamEvent,
    StreamOutcome, StreamPhase,
};
pub use retry::{RetryOverride, RetryPolicy, RetryPolicyOverride};

type EventHandler = Arc<dyn Fn(&StreamEvent) + Send + Sync>;
type OpenHandler = Arc<dyn Fn() + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&CcError) + Send + Sync>;
type RequestFactory = Arc<dyn Fn() -> Result<RequestDescriptor, CcError> + Send + Sync>;

/// Produces the request of every connection attempt, plus the transport to send it on.
#[derive(Clone)]
pub struct StreamSource {
    http: reqwest::Client,
    factory: RequestFactory,
}

impl StreamSource {
    pub fn new<F>(http: reqwest::Client, factory: F) -> Self
    where
        F: Fn() -> Result<RequestDescriptor, CcError> + Send + Sync + 'static,
    {
        Self {
            http,
            factory: Arc::new(factory),
        }
    }

    /// Builds a fresh request (signatures are recomputed on each call).
    pub fn request(&self) -> Result<RequestDescriptor, CcError> {
        (self.factory)()
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Control {
    Running,
    Paused,
    Closed(Option<String>),
}

#[derive(Default)]
struct Handlers {
    by_name: HashMap<String, Vec<EventHandler>>,
    open: Vec<OpenHandler>,
    error: Vec<ErrorHandler>,
}

struct Inner {
    source: StreamSource,
    config: StreamConfig,
    control: watch::Sender<Control>,
    running: AtomicBool,
    opens: AtomicU32,
    phase: Mutex<StreamPhase>,
    cursor: Mutex<Option<String>>,
    handlers: Mutex<Handlers>,
}

/// Handle on one SSE stream.
#[derive(Clone)]
pub struct CcStream {
    inner: Arc<Inner>,
}

impl fmt::Debug for CcStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CcStream")
            .field("phase", &self.phase())
            .field("cursor", &self.cursor())
            .field("config", &self.inner.config)
            .finish()
    }
}

enum Attempt {
    Ended(EndOfStream),
    /// Pause or close requested while connecting or reading.
    Interrupted,
    Failed(CcError),
}

enum Dispatch {
    Continue,
    End(EndOfStream),
    Fail(CcError),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CcStream {
    /// Creates an idle stream. Nothing happens until [`CcStream::start`].
    pub fn new(source: StreamSource, config: StreamConfig) -> Self {
        let (control, _) = watch::channel(Control::Running);
        Self {
            inner: Arc::new(Inner {
                source,
                config,
                control,
                running: AtomicBool::new(false),
                opens: AtomicU32::new(0),
                phase: Mutex::new(StreamPhase::Idle),
                cursor: Mutex::new(None),
                handlers: Mutex::new(Handlers::default()),
            }),
        }
    }

    /// Seeds the cursor, so the first request already carries `Last-Event-Id`.
    pub fn with_cursor(self, cursor: impl Into<String>) -> Self {
        *lock(&self.inner.cursor) = Some(cursor.into());
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    pub fn phase(&self) -> StreamPhase {
        *lock(&self.inner.phase)
    }

    /// Connections confirmed so far (200 + event-stream content type).
    pub fn open_count(&self) -> u32 {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Id of the last event received, replayed as `Last-Event-Id` on reconnect.
    pub fn cursor(&self) -> Option<String> {
        lock(&self.inner.cursor).clone()
    }

    /* ---------------- subscriptions ---------------- */

    /// Calls `handler` for every event named `name`, in transport order.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers)
            .by_name
            .entry(name.into())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Calls `handler` each time a connection is confirmed (200 + event-stream).
    pub fn on_open<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).open.push(Arc::new(handler));
        self
    }

    /// Calls `handler` for each failed attempt that will be retried.
    /// The failure that ends the stream is returned by `start()` instead.
    pub fn on_error<F>(&self, handler: F) -> &Self
    where
        F: Fn(&CcError) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).error.push(Arc::new(handler));
        self
    }

    /* ---------------- control ---------------- */

    /// Drops the connection without reporting an error or using retry budget.
    /// No-op unless the stream is running and not already paused.
    pub fn pause(&self) {
        if !self.inner.running.load(Ordering::SeqCst) {
            return;
        }
        self.inner.control.send_if_modified(|c| {
            if *c == Control::Running {
                *c = Control::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Reconnects a paused stream, replaying the cursor. No-op unless paused.
    pub fn resume(&self) {
        self.inner.control.send_if_modified(|c| {
            if *c == Control::Paused {
                *c = Control::Running;
                true
            } else {
                false
            }
        });
    }

    /// Tears the stream down for good. Idempotent; `start()` then resolves with
    /// [`StreamOutcome::Closed`].
    pub fn close(&self, reason: Option<String>) {
        let changed = self.inner.control.send_if_modified(|c| {
            if matches!(c, Control::Closed(_)) {
                false
            } else {
                *c = Control::Closed(reason);
                true
            }
        });
        if changed && !self.inner.running.load(Ordering::SeqCst) {
            self.set_phase(StreamPhase::Closed);
        }
    }

    /* ---------------- engine ---------------- */

    /// Runs the stream until the server ends it, the caller closes it, or a
    /// failure is terminal.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn start(&self) -> Result<StreamOutcome, CcError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(CcError::client(
                ClientErrorCode::StreamAlreadyStarted,
                "stream is already running",
            ));
        }
        let _running = RunningGuard(&self.inner.running);
        self.run().await
    }

    async fn run(&self) -> Result<StreamOutcome, CcError> {
        let mut control = self.inner.control.subscribe();
        let mut failures: u32 = 0;

        loop {
            let current = control.borrow_and_update().clone();
            match current {
                Control::Closed(reason) => return Ok(self.finish_closed(reason)),
                Control::Paused => {
                    self.set_phase(StreamPhase::Paused);
                    wait_while_paused(&mut control).await;
                    continue;
                }
                Control::Running => {}
            }

            let err = match self.attempt(&mut control).await {
                Attempt::Ended(end) => {
                    self.set_phase(StreamPhase::Closed);
                    self.log(format_args!("ended by server: {}", end.ended_by));
                    return Ok(StreamOutcome::Ended(end));
                }
                Attempt::Interrupted => continue,
                Attempt::Failed(err) => err,
            };

            failures += 1;
            let policy = match &self.inner.config.retry {
                Some(p) if !retry::is_fatal(&err) && retry::is_retryable(&err) => p,
                _ => return Err(self.finish_failed(err)),
            };
            if failures > policy.max_retry_count {
                return Err(self.finish_failed(err));
            }

            let delay = policy.delay_for(failures - 1);
            tracing::warn!(
                code = err.code(),
                failures,
                ?delay,
                "stream attempt failed, retrying: {err}"
            );
            self.notify_error(&err);

            self.set_phase(StreamPhase::Backoff);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = control.changed() => {}
            }
        }
    }

    async fn attempt(&self, control: &mut watch::Receiver<Control>) -> Attempt {
        self.set_phase(StreamPhase::Connecting);
        let request = match self.prepare_request() {
            Ok(r) => r,
            Err(e) => return Attempt::Failed(e),
        };

        let response = tokio::select! {
            biased;
            _ = control.changed() => return Attempt::Interrupted,
            res = net::open_stream(&self.inner.source.http, &request) => match res {
                Ok(resp) => resp,
                Err(e) => return Attempt::Failed(e),
            },
        };

        if !net::is_event_stream(response.headers()) {
            let got = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string();
            return Attempt::Failed(CcError::client(
                ClientErrorCode::SseInvalidContentType,
                format!("expected {MIME_EVENT_STREAM}, got {got}"),
            ));
        }

        self.set_phase(StreamPhase::Open);
        self.notify_open();

        let period = self.inner.config.heartbeat_period;
        let every = self
            .inner
            .config
            .healthcheck_interval
            .max(Duration::from_millis(1));
        let mut health = tokio::time::interval_at(Instant::now() + every, every);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();
        let mut events = response.bytes_stream().eventsource();

        loop {
            tokio::select! {
                biased;
                _ = control.changed() => return Attempt::Interrupted,
                next = events.next() => match next {
                    Some(Ok(ev)) => {
                        last_seen = Instant::now();
                        match self.dispatch(StreamEvent::from(ev)) {
                            Dispatch::Continue => {}
                            Dispatch::End(end) => return Attempt::Ended(end),
                            Dispatch::Fail(e) => return Attempt::Failed(e),
                        }
                    }
                    Some(Err(EventStreamError::Transport(e))) => {
                        return Attempt::Failed(CcError::from(e));
                    }
                    Some(Err(other)) => {
                        return Attempt::Failed(CcError::client(
                            ClientErrorCode::SseServerError,
                            format!("malformed event stream: {other}"),
                        ));
                    }
                    None => {
                        return Attempt::Failed(CcError::client(
                            ClientErrorCode::SseServerError,
                            format!("connection closed without {END_OF_STREAM_EVENT}"),
                        ));
                    }
                },
                _ = health.tick() => {
                    if last_seen.elapsed() > period {
                        return Attempt::Failed(CcError::client(
                            ClientErrorCode::SseHealthError,
                            format!("no event or heartbeat for {}ms", period.as_millis()),
                        ));
                    }
                }
            }
        }
    }

    fn prepare_request(&self) -> Result<RequestDescriptor, CcError> {
        let mut request = self.inner.source.request()?;
        request.cache = None;
        request.debug |= self.inner.config.debug;
        request.headers.set_if_missing(ACCEPT, MIME_EVENT_STREAM);
        match self.cursor() {
            Some(cursor) => {
                request.headers.set(LAST_EVENT_ID, cursor);
            }
            None => {
                request.headers.remove(LAST_EVENT_ID);
            }
        }
        Ok(request)
    }

    fn dispatch(&self, event: StreamEvent) -> Dispatch {
        match event.name.as_str() {
            HEARTBEAT_EVENT => Dispatch::Continue,
            END_OF_STREAM_EVENT => match EndOfStream::parse(&event.data) {
                Ok(end) => Dispatch::End(end),
                Err(e) => Dispatch::Fail(e),
            },
            SERVER_CLOSE_EVENT => Dispatch::Fail(CcError::client(
                ClientErrorCode::SseServerError,
                "server closed the stream",
            )),
            name => {
                if let Some(id) = &event.id {
                    *lock(&self.inner.cursor) = Some(id.clone());
                }
                let handlers = lock(&self.inner.handlers)
                    .by_name
                    .get(name)
                    .cloned()
                    .unwrap_or_default();
                for handler in handlers {
                    handler(&event);
                }
                Dispatch::Continue
            }
        }
    }

    fn notify_open(&self) {
        let opens = self.inner.opens.fetch_add(1, Ordering::SeqCst) + 1;
        self.log(format_args!("open #{opens}"));
        let handlers = lock(&self.inner.handlers).open.clone();
        for handler in handlers {
            handler();
        }
    }

    fn notify_error(&self, err: &CcError) {
        let handlers = lock(&self.inner.handlers).error.clone();
        for handler in handlers {
            handler(err);
        }
    }

    fn finish_closed(&self, reason: Option<String>) -> StreamOutcome {
        self.set_phase(StreamPhase::Closed);
        self.log(format_args!("closed by caller: {reason:?}"));
        StreamOutcome::Closed(reason)
    }

    fn finish_failed(&self, err: CcError) -> CcError {
        self.set_phase(StreamPhase::Failed);
        tracing::warn!(code = err.code(), "stream failed: {err}");
        err
    }

    fn set_phase(&self, phase: StreamPhase) {
        *lock(&self.inner.phase) = phase;
        self.log(format_args!("phase {phase:?}"));
    }

    fn log(&self, msg: fmt::Arguments<'_>) {
        if self.inner.config.debug {
            tracing::debug!(target: "cc_client::stream", "{msg}");
        } else {
            tracing::trace!(target: "cc_client::stream", "{msg}");
        }
    }
}

async fn wait_while_paused(control: &mut watch::Receiver<Control>) {
    while control.changed().await.is_ok() {
        if *control.borrow_and_update() != Control::Paused {
            return;
        }
    }
}
