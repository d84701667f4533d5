#![allow(dead_code)]

use async_trait::async_trait;
use cbpro::core::config::ExchangeConfig;
use cbpro::core::kernel::{RestClient, RestResponse};
use cbpro::ExchangeError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use std::collections::VecDeque;
use std::env;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

pub const TEST_KEY: &str = "key";
pub const TEST_SECRET: &str = "dGVzdC1zZWNyZXQ=";
pub const TEST_PASSPHRASE: &str = "satoshi";
pub const TEST_TIMESTAMP: u64 = 1_544_805_953;

/// Test configuration utilities
pub struct TestConfig;

impl TestConfig {
    /// Live sandbox tests only run when explicitly requested
    pub fn should_run_live_tests() -> bool {
        env::var("RUN_LIVE_TESTS").unwrap_or_default() == "true"
    }

    pub fn test_timeout_seconds() -> u64 {
        env::var("TEST_TIMEOUT_SECONDS")
            .unwrap_or_default()
            .parse()
            .unwrap_or(30)
    }

    /// Sandbox config from `CBPRO_*` variables, read-only when none are set
    pub fn sandbox_config() -> ExchangeConfig {
        ExchangeConfig::from_env("CBPRO")
            .unwrap_or_else(|_| ExchangeConfig::read_only())
            .sandbox(true)
    }
}

/// Endpoint, query and auth flag of one call seen by [`MockRest`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub authenticated: bool,
}

impl RecordedRequest {
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// In-memory transport answering with scripted `200` list pages
#[derive(Debug, Clone, Default)]
pub struct MockRest {
    pages: Arc<Mutex<VecDeque<RestResponse>>>,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockRest {
    pub fn respond_page(&self, body: &str, before: Option<&str>, after: Option<&str>) {
        let mut headers = HeaderMap::new();
        for (name, cursor) in [("cb-before", before), ("cb-after", after)] {
            if let Some(cursor) = cursor {
                headers.insert(name, HeaderValue::from_str(cursor).unwrap());
            }
        }
        self.pages.lock().unwrap().push_back(RestResponse {
            status: 200,
            headers,
            body: body.as_bytes().to_vec(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestClient for MockRest {
    async fn send(
        &self,
        _method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        _body: &[u8],
        authenticated: bool,
    ) -> Result<RestResponse, ExchangeError> {
        self.seen.lock().unwrap().push(RecordedRequest {
            endpoint: endpoint.to_string(),
            query: query_params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            authenticated,
        });
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExchangeError::network("no page left"))
    }
}

/// Request line, headers and body as received by [`serve_once`]
#[derive(Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Answer exactly one HTTP request on a local port
///
/// Returns the base URL to point the client at and a receiver for what the
/// client sent.
pub async fn serve_once(
    status: u16,
    headers: &[(&str, &str)],
    body: &str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut response = format!(
        "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        let _ = tx.send(request);
    });

    (format!("http://{}", addr), rx)
}

/// Accept one connection and never answer it
pub async fn serve_silent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        drop(socket);
    });

    format!("http://{}", addr)
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before request headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        request_line,
        headers,
        body,
    }
}
