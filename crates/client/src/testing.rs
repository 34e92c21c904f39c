//! Scripted mock HTTP servers and session fixtures for tests.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use geodex_auth::{DirectGrantAuthenticator, KeycloakEndpoint, TokenSet};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::CatalogSession;

/// One canned HTTP response.
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("Content-Type".into(), "application/json".into())],
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Starts a mock server that serves `responses` in order, one connection
/// per response, recording each raw request. Connections beyond the script
/// are refused, so an unexpected extra call fails loudly.
pub async fn scripted_server(
    responses: Vec<MockResponse>,
) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    tokio::spawn(async move {
        for resp in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };

            let mut buf = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            recorded
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf).into_owned());

            let mut header_lines = String::new();
            for (name, value) in &resp.headers {
                header_lines.push_str(&format!("{name}: {value}\r\n"));
            }
            let raw = format!(
                "HTTP/1.1 {} X\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                resp.status,
                header_lines,
                resp.body.len(),
                resp.body
            );
            let _ = stream.write_all(raw.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (url, requests)
}

/// True once the buffered request holds all headers plus the declared body.
fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text
        .lines()
        .find_map(|l| {
            l.to_ascii_lowercase()
                .strip_prefix("content-length:")
                .map(str::trim)
                .map(String::from)
        })
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    buf.len() >= split + 4 + content_length
}

/// A session pointed at `graphql_url`, already holding a long-lived token.
pub fn authed_session(graphql_url: &str, access_token: &str) -> CatalogSession {
    let endpoint = KeycloakEndpoint::new("http://127.0.0.1:1", "test", "files-ui");
    let tokens = TokenSet::new(access_token, "refresh", 3600, 3600, Utc::now());
    let mut session = CatalogSession::with_authenticator(
        graphql_url,
        DirectGrantAuthenticator::with_tokens(endpoint, tokens),
    );
    session.set_username("tester");
    session
}

/// A session whose token is already inside every refresh window, wired to
/// `token_server_url` for the refresh grant.
pub fn near_expiry_session(graphql_url: &str, token_server_url: &str) -> CatalogSession {
    let endpoint = KeycloakEndpoint::new(token_server_url, "test", "files-ui");
    let tokens = TokenSet::new("stale", "refresh-1", 60, 60, Utc::now());
    let mut session = CatalogSession::with_authenticator(
        graphql_url,
        DirectGrantAuthenticator::with_tokens(endpoint, tokens),
    );
    session.set_username("tester");
    session
}
