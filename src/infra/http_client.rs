use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use crate::app::ports::{FetchRequest, HttpClientPort, HttpGetResult};
use crate::error::FetchError;

/// reqwest-backed `HttpClientPort`. Holds one pooled client for ordinary
/// requests and one that never sends a Referer for `omit_credentials`.
/// Bodies larger than `max_body_bytes` are refused; 0 means no limit.
pub struct ReqwestHttp {
    client: reqwest::Client,
    anonymous: reqwest::Client,
    max_body_bytes: u64,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration, max_body_bytes: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let anonymous = reqwest::Client::builder()
            .timeout(timeout)
            .referer(false)
            .build()?;
        Ok(Self {
            client,
            anonymous,
            max_body_bytes,
        })
    }
}

fn header_map(request: &FetchRequest) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn append_limited(buf: &mut Vec<u8>, chunk: &[u8], limit: u64) -> Result<(), FetchError> {
    if limit > 0 && (buf.len() + chunk.len()) as u64 > limit {
        return Err(FetchError::BodyTooLarge { limit });
    }
    buf.extend_from_slice(chunk);
    Ok(())
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, request: &FetchRequest) -> Result<HttpGetResult, FetchError> {
        let client = if request.omit_credentials {
            &self.anonymous
        } else {
            &self.client
        };
        let mut resp = client
            .get(&request.url)
            .headers(header_map(request)?)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let limit = self.max_body_bytes;
        let declared = resp.content_length();
        if limit > 0 && declared.map_or(false, |len| len > limit) {
            return Err(FetchError::BodyTooLarge { limit });
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            append_limited(&mut bytes, &chunk, limit)?;
        }

        Ok(HttpGetResult {
            status,
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP/1.1 response on a local port and returns its URL.
    async fn serve_once(head: String, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/report.pdf", addr)
    }

    fn client(max_body_bytes: u64) -> ReqwestHttp {
        ReqwestHttp::new(Duration::from_secs(5), max_body_bytes).unwrap()
    }

    #[test]
    fn test_header_map_carries_strategy_headers() {
        let request = FetchRequest::get("https://example.gov/a.pdf")
            .header("User-Agent", "Mozilla/5.0")
            .header("Cache-Control", "no-cache");
        let headers = header_map(&request).unwrap();
        assert_eq!(headers.get("user-agent").unwrap(), "Mozilla/5.0");
        assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    }

    #[test]
    fn test_header_map_rejects_bad_names() {
        let request = FetchRequest::get("https://example.com").header("bad header", "x");
        assert!(matches!(
            header_map(&request),
            Err(FetchError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_append_limited_stops_at_the_limit() {
        let mut buf = Vec::new();
        append_limited(&mut buf, &[0; 600], 1_000).unwrap();
        append_limited(&mut buf, &[0; 400], 1_000).unwrap();
        assert!(matches!(
            append_limited(&mut buf, &[0; 1], 1_000),
            Err(FetchError::BodyTooLarge { limit: 1_000 })
        ));
        assert_eq!(buf.len(), 1_000);

        let mut unlimited = Vec::new();
        append_limited(&mut unlimited, &[0; 5_000], 0).unwrap();
        assert_eq!(unlimited.len(), 5_000);
    }

    #[tokio::test]
    async fn test_declared_oversized_body_is_refused() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n";
        let url = serve_once(head.to_string(), vec![b'%'; 4096]).await;

        let result = client(1_024).get(&FetchRequest::get(url)).await;
        assert!(matches!(result, Err(FetchError::BodyTooLarge { limit: 1_024 })));
    }

    #[tokio::test]
    async fn test_undeclared_oversized_body_is_refused_while_streaming() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nConnection: close\r\n\r\n";
        let url = serve_once(head.to_string(), vec![b'%'; 64 * 1024]).await;

        let result = client(1_024).get(&FetchRequest::get(url)).await;
        assert!(matches!(result, Err(FetchError::BodyTooLarge { limit: 1_024 })));
    }

    #[tokio::test]
    async fn test_body_within_limit_is_returned() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: 2048\r\nConnection: close\r\n\r\n";
        let url = serve_once(head.to_string(), vec![b'%'; 2048]).await;

        let response = client(10_000).get(&FetchRequest::get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.bytes.len(), 2048);
        assert_eq!(response.content_type.as_deref(), Some("application/pdf"));
    }
}
