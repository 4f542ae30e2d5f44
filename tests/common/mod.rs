#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cc_client::{CcClient, CcClientBuilder};
use httpmock::MockServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

pub fn setup_server() -> MockServer {
    init_test_tracing();
    MockServer::start()
}

/// Routes crate logs to the test output when built with `--features tracing-subscriber`.
/// `RUST_LOG` overrides the default filter.
pub fn init_test_tracing() {
    #[cfg(feature = "tracing-subscriber")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cc_client=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

pub fn builder_for(server: &MockServer) -> CcClientBuilder {
    CcClient::builder().base_url(Url::parse(&server.base_url()).unwrap())
}

pub fn client_for(server: &MockServer) -> CcClient {
    builder_for(server).build().unwrap()
}

/// Formats one SSE frame.
pub fn sse_event(name: &str, id: Option<&str>, data: &str) -> String {
    let mut out = format!("event: {name}\n");
    if let Some(id) = id {
        out.push_str(&format!("id: {id}\n"));
    }
    out.push_str(&format!("data: {data}\n\n"));
    out
}

pub fn end_of_stream(ended_by: &str) -> String {
    sse_event(
        "END_OF_STREAM",
        None,
        &format!(r#"{{"endedBy":"{ended_by}"}}"#),
    )
}

/// What the scripted server does with one connection.
#[derive(Debug, Clone)]
pub struct Script {
    pub status: u16,
    pub content_type: String,
    /// Written in order, each after its delay.
    pub chunks: Vec<(Duration, String)>,
    /// Keep the socket open after the last chunk until the client hangs up.
    pub hold_open: bool,
    /// Never answer; wait for the client to hang up.
    pub silent: bool,
}

impl Script {
    pub fn events(chunks: Vec<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream".into(),
            chunks: chunks.into_iter().map(|c| (Duration::ZERO, c)).collect(),
            hold_open: false,
            silent: false,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "application/json".into(),
            chunks: vec![(Duration::ZERO, r#"{"error":"scripted"}"#.into())],
            hold_open: false,
            silent: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::status(200)
        }
    }

    pub fn delayed(mut self, delay: Duration, chunk: String) -> Self {
        self.chunks.push((delay, chunk));
        self
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// A raw TCP server that plays one [`Script`] per accepted connection and
/// records every request head. Connections past the last script get a 500.
pub struct ScriptedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub async fn start(scripts: Vec<Script>) -> Self {
        init_test_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            let mut index = 0usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let script = scripts
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| Script::status(500));
                index += 1;
                let recorded = Arc::clone(&recorded);

                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    recorded.lock().unwrap().push(head);
                    if script.silent {
                        drain(&mut socket).await;
                        return;
                    }

                    let reason = if script.status == 200 { "OK" } else { "Scripted" };
                    let response_head = format!(
                        "HTTP/1.1 {} {reason}\r\ncontent-type: {}\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n",
                        script.status, script.content_type
                    );
                    if socket.write_all(response_head.as_bytes()).await.is_err() {
                        return;
                    }
                    for (delay, chunk) in &script.chunks {
                        if !delay.is_zero() {
                            tokio::time::sleep(*delay).await;
                        }
                        if socket.write_all(chunk.as_bytes()).await.is_err() {
                            return;
                        }
                        let _ = socket.flush().await;
                    }
                    if script.hold_open {
                        drain(&mut socket).await;
                    }
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&self.base_url).unwrap()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Value of `name` in request number `index`, if present.
    pub fn request_header(&self, index: usize, name: &str) -> Option<String> {
        let requests = self.requests.lock().unwrap();
        let head = requests.get(index)?;
        head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

/// Reads until the peer hangs up.
async fn drain(socket: &mut tokio::net::TcpStream) {
    let mut buf = [0u8; 256];
    while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Stream command reading a fixed path.
pub struct PathStream(pub &'static str);

impl cc_client::StreamCommand for PathStream {
    fn to_request_params(
        &self,
        _params: &cc_client::CommandParams,
    ) -> Result<cc_client::RequestDescriptor, cc_client::CcError> {
        Ok(cc_client::RequestDescriptor::get(self.0))
    }
}

pub fn open_stream(
    client: &CcClient,
    path: &'static str,
    config: cc_client::StreamConfigOverride,
) -> cc_client::CcStream {
    client
        .stream(&cc_client::Command::<()>::stream(PathStream(path)), Some(&config))
        .unwrap()
}

/// Retries with a 10ms initial delay so tests stay fast.
pub fn fast_retry(max_retry_count: u32) -> cc_client::StreamConfigOverride {
    cc_client::StreamConfigOverride::new().retry(cc_client::RetryPolicy::new(
        max_retry_count,
        Duration::from_millis(10),
        2.0,
    ))
}

/// Polls `cond` every 10ms, panicking after 5s.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
