use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::{FetchRequest, HttpClientPort};
use crate::pipeline::strategy::expand_template;

static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").expect("static regex is valid"));
static HTML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&#?[a-z0-9]+;").expect("static regex is valid"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex is valid"));

#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    contents: Option<String>,
}

/// Best-effort page title lookup through a JSON relay, used to prefill the
/// title when the user did not type one. Every failure yields `None`.
pub struct TitleExtractor {
    http: Arc<dyn HttpClientPort>,
    relay_template: String,
    timeout: Duration,
}

impl TitleExtractor {
    pub fn new(http: Arc<dyn HttpClientPort>, relay_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            relay_template: relay_template.into(),
            timeout,
        }
    }

    pub async fn suggest(&self, url: &str) -> Option<String> {
        let request = FetchRequest::get(expand_template(&self.relay_template, url))
            .header("Accept", "application/json");

        let response = match tokio::time::timeout(self.timeout, self.http.get(&request)).await {
            Ok(Ok(response)) if (200..300).contains(&response.status) => response,
            Ok(Ok(response)) => {
                warn!(status = response.status, "Title relay returned an error status");
                return None;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Title relay request failed");
                return None;
            }
            Err(_) => {
                warn!("Title relay timed out");
                return None;
            }
        };

        let envelope: RelayEnvelope = match serde_json::from_slice(&response.bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Title relay payload is not JSON");
                return None;
            }
        };
        envelope.contents.as_deref().and_then(extract_title)
    }
}

/// Pulls the first `<title>` out of an HTML document, drops entities and
/// collapses whitespace.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_TAG.captures(html)?.get(1)?.as_str();
    let without_entities = HTML_ENTITY.replace_all(raw, " ");
    let title = WHITESPACE.replace_all(without_entities.trim(), " ").trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::error::FetchError;
    use async_trait::async_trait;

    struct FixedHttp(Result<(u16, String), String>);

    #[async_trait]
    impl HttpClientPort for FixedHttp {
        async fn get(&self, request: &FetchRequest) -> Result<HttpGetResult, FetchError> {
            assert!(request.url.starts_with("https://api.allorigins.win/get?url=https%3A%2F%2F"));
            match &self.0 {
                Ok((status, body)) => Ok(HttpGetResult {
                    status: *status,
                    bytes: body.clone().into_bytes(),
                    content_type: Some("application/json".to_string()),
                }),
                Err(e) => Err(FetchError::Other(e.clone())),
            }
        }
    }

    fn extractor(reply: Result<(u16, String), String>) -> TitleExtractor {
        TitleExtractor::new(
            Arc::new(FixedHttp(reply)),
            crate::constants::TITLE_RELAY_TEMPLATE,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_extract_title_cleans_entities_and_whitespace() {
        let html = "<html><head><TITLE lang=\"fr\">\n  Recyclage &amp; batteries\n\t2024 </TITLE></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Recyclage batteries 2024"));
    }

    #[test]
    fn test_extract_title_missing_or_empty() {
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
        assert_eq!(extract_title("<title>&nbsp;</title>"), None);
    }

    #[tokio::test]
    async fn test_suggest_reads_relay_envelope() {
        let body = serde_json::json!({ "contents": "<title>Li-Cycle Hub</title>" }).to_string();
        let title = extractor(Ok((200, body))).suggest("https://li-cycle.com/hub").await;
        assert_eq!(title.as_deref(), Some("Li-Cycle Hub"));
    }

    #[tokio::test]
    async fn test_suggest_swallows_failures() {
        assert_eq!(extractor(Err("dns".to_string())).suggest("https://x.example").await, None);
        assert_eq!(extractor(Ok((502, String::new()))).suggest("https://x.example").await, None);
        assert_eq!(extractor(Ok((200, "not json".to_string()))).suggest("https://x.example").await, None);
    }
}
