// src/core/enricher/fetcher.rs

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use std::time::Duration;
use strum::Display;
use tracing::debug;
use url::Url;

/// Browser-like agent sent with every probe.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:54.0) Gecko/20100101 Firefox/54.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

/// Retrieves the response headers of `scheme://target/` as an opaque blob.
///
/// Errors are plain strings: callers only log them.
#[async_trait]
pub trait HeaderFetcher: Send + Sync {
    async fn fetch(&self, scheme: Scheme, target: &str) -> Result<String, String>;
}

/// `reqwest` client with certificate checks off, since scan targets commonly
/// present self-signed certificates.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HeaderFetcher for HttpFetcher {
    async fn fetch(&self, scheme: Scheme, target: &str) -> Result<String, String> {
        let url = Url::parse(&format!("{scheme}://{target}"))
            .map_err(|e| format!("Invalid target URL: {}", e))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;
        debug!(identifier = target, %scheme, status = %response.status(), "Received response.");
        Ok(headers_to_json(response.headers()))
    }
}

/// Serializes a header map to a JSON object. Repeated names are joined with
/// `", "`; values that are not valid UTF-8 are replaced by a marker.
pub fn headers_to_json(headers: &HeaderMap) -> String {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap_or("[Invalid UTF-8]"))
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_string(), Value::String(joined));
    }
    Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap().to_string();
        (listener, target)
    }

    #[test]
    fn headers_serialize_as_json_object() {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let blob = headers_to_json(&headers);
        let parsed: Value = serde_json::from_str(&blob).unwrap();

        assert_eq!(parsed["server"], "nginx");
        assert_eq!(parsed["set-cookie"], "a=1, b=2");
    }

    #[test]
    fn scheme_renders_lowercase() {
        assert_eq!(Scheme::Http.to_string(), "http");
        assert_eq!(Scheme::Https.to_string(), "https");
    }

    #[tokio::test]
    async fn silent_server_times_out_as_error() {
        let (listener, target) = local_listener().await;
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        let fetcher = HttpFetcher::new(Duration::from_millis(200), DEFAULT_USER_AGENT).unwrap();

        let started = Instant::now();
        let result = fetcher.fetch(Scheme::Http, &target).await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let (listener, target) = local_listener().await;
        drop(listener);
        let fetcher = HttpFetcher::new(Duration::from_millis(200), DEFAULT_USER_AGENT).unwrap();

        assert!(fetcher.fetch(Scheme::Http, &target).await.is_err());
    }

    #[tokio::test]
    async fn response_headers_come_back_as_json() {
        let (listener, target) = local_listener().await;
        let (request_tx, request_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nServer: canned\r\nX-Frame-Options: DENY\r\n\
                      Content-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            let _ = request_tx.send(String::from_utf8_lossy(&request).into_owned());
        });
        let fetcher = HttpFetcher::new(Duration::from_secs(1), DEFAULT_USER_AGENT).unwrap();

        let blob = fetcher.fetch(Scheme::Http, &target).await.unwrap();
        let parsed: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(parsed["server"], "canned");
        assert_eq!(parsed["x-frame-options"], "DENY");

        let request = request_rx.await.unwrap();
        assert!(request.contains(DEFAULT_USER_AGENT));
    }
}
