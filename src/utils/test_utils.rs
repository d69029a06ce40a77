//! In-process HTTP fixtures for tests.
//!
//! Each [`MockServer`] answers connections in order with the configured
//! [`MockResponse`]s (the last one repeats), and records every request.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub chunks: Vec<String>,
    pub chunk_delay: Duration,
    /// Keep the connection open after the last chunk instead of closing it.
    pub hold_open: bool,
    /// Read the request and never answer.
    pub never_respond: bool,
    /// Write `chunks` verbatim, status line and headers included.
    pub raw: bool,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.to_string()],
            chunk_delay: Duration::ZERO,
            hold_open: false,
            never_respond: false,
            raw: false,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            content_type: "text/plain",
            chunks: vec![body.to_string()],
            ..Self::json(status, serde_json::Value::Null)
        }
    }

    /// Server-sent events, one `data:` line per payload.
    pub fn sse(payloads: &[&str]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            chunks: payloads
                .iter()
                .map(|payload| format!("data: {payload}\n\n"))
                .collect(),
            chunk_delay: Duration::from_millis(5),
            hold_open: false,
            never_respond: false,
            raw: false,
        }
    }

    /// A hand-written response, for malformed framing.
    pub fn raw(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
            chunk_delay: Duration::from_millis(5),
            raw: true,
            ..Self::json(200, serde_json::Value::Null)
        }
    }

    pub fn hang() -> Self {
        Self {
            never_respond: true,
            ..Self::json(200, serde_json::Value::Null)
        }
    }

    pub fn holding_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

pub struct MockServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

pub async fn spawn_mock_server(responses: Vec<MockResponse>) -> MockServer {
    assert!(!responses.is_empty(), "mock server needs a response");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    tokio::spawn(async move {
        let mut served = 0usize;
        while let Ok((stream, _)) = listener.accept().await {
            let response = responses[served.min(responses.len() - 1)].clone();
            served += 1;
            let captured = Arc::clone(&captured);
            tokio::spawn(async move {
                let _ = serve_connection(stream, response, captured).await;
            });
        }
    });

    MockServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    response: MockResponse,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    captured.lock().await.push(request);

    if response.never_respond {
        tokio::time::sleep(Duration::from_secs(60)).await;
        return Ok(());
    }

    if !response.raw {
        let reason = if response.status < 400 { "OK" } else { "Error" };
        let head = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: {}\r\nconnection: close\r\n\r\n",
            response.status, reason, response.content_type
        );
        stream.write_all(head.as_bytes()).await?;
        stream.flush().await?;
    }

    for chunk in &response.chunks {
        if !response.chunk_delay.is_zero() {
            tokio::time::sleep(response.chunk_delay).await;
        }
        stream.write_all(chunk.as_bytes()).await?;
        stream.flush().await?;
    }

    if response.hold_open {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
    stream.shutdown().await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<CapturedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos;
        }
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// A client that ignores proxy environment variables.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client should build")
}
