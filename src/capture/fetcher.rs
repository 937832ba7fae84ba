use reqwest::header::{self, HeaderMap, HeaderValue};
use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Chrome on Windows; some camera CDNs block unknown agents
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Raw result of one HTTP GET
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub status: u16,
    /// Value of the Content-Type header, if any
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedImage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can produce snapshot bytes for a URL
///
/// One call is one attempt; retrying is up to the poll loop's schedule.
pub trait ImageSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedImage, FetchError>> + Send;
}

/// HTTP snapshot fetcher with browser-like headers and a bounded timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        // Accept-Encoding is left to reqwest so bodies get decompressed
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

impl ImageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        tracing::debug!(url, status, size = bytes.len(), "fetched snapshot");

        Ok(FetchedImage {
            status,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response, returning the request head we saw
    async fn serve_once(response: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
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
            socket.write_all(&response).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/cam.jpeg", addr), handle)
    }

    #[tokio::test]
    async fn test_fetch_returns_body_status_and_type() {
        let body = b"\xFF\xD8\xFFfake-jpeg-body".to_vec();
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);

        let (url, server) = serve_once(response).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let fetched = fetcher.fetch(&url).await.unwrap();

        assert_eq!(fetched.status, 200);
        assert!(fetched.is_success());
        assert_eq!(fetched.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(fetched.bytes, body);

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.contains("user-agent: mozilla/5.0"));
        assert!(request.contains("accept: image/webp"));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let response =
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_vec();
        let (url, _server) = serve_once(response).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let fetched = fetcher.fetch(&url).await.unwrap();
        assert_eq!(fetched.status, 503);
        assert!(!fetched.is_success());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let fetcher = HttpFetcher::new(Duration::from_millis(200)).unwrap();
        let result = fetcher.fetch(&format!("http://{}/cam.jpeg", addr)).await;

        assert!(matches!(result, Err(FetchError::Timeout(d)) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let result = fetcher.fetch(&format!("http://{}/cam.jpeg", addr)).await;

        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
