use reqwest::Url;

use crate::domain::{DocumentRequest, DocumentType};
use crate::error::PipelineError;

/// A request after the pre-I/O checks: required fields present and the
/// source URL normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub title: String,
    pub source_url: String,
    pub author: Option<String>,
    pub doc_type: DocumentType,
    pub description: Option<String>,
    pub associated_entity_id: Option<String>,
}

impl NormalizedRequest {
    pub fn from_request(request: DocumentRequest) -> Result<Self, PipelineError> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(PipelineError::InvalidRequest("title is required".to_string()));
        }
        let source_url = normalize_url(&request.source_url)?;

        Ok(Self {
            title,
            source_url,
            author: non_blank(request.author),
            doc_type: request.doc_type,
            description: non_blank(request.description),
            associated_entity_id: non_blank(request.associated_entity_id),
        })
    }
}

/// Trims, prepends `https://` to input without a `scheme://` part and checks that the
/// result parses as an http(s) URL with a host. The returned string is the
/// trimmed input (plus scheme), not a re-serialized URL.
pub fn normalize_url(raw: &str) -> Result<String, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidRequest("source URL is required".to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate)
        .map_err(|e| PipelineError::InvalidRequest(format!("invalid source URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(PipelineError::InvalidRequest(format!(
            "source URL '{}' is not an http(s) address",
            raw
        )));
    }
    Ok(candidate)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_added_and_text_kept_verbatim() {
        assert_eq!(normalize_url("  example.com/report.pdf ").unwrap(), "https://example.com/report.pdf");
        assert_eq!(normalize_url("https://dead-site.example/page").unwrap(), "https://dead-site.example/page");
        assert_eq!(normalize_url("http://example.com").unwrap(), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com/a").unwrap(), "HTTPS://Example.com/a");
    }

    #[test]
    fn test_hosts_starting_with_http_still_get_a_scheme() {
        assert_eq!(normalize_url("httpbin.org/report.pdf").unwrap(), "https://httpbin.org/report.pdf");
        assert_eq!(normalize_url("httpd.apache.org").unwrap(), "https://httpd.apache.org");
        assert!(matches!(
            normalize_url("ftp://example.com/report.pdf"),
            Err(PipelineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        let no_title = DocumentRequest::new("  ", "https://example.com");
        assert!(matches!(
            NormalizedRequest::from_request(no_title),
            Err(PipelineError::InvalidRequest(_))
        ));

        let no_url = DocumentRequest::new("Title", "");
        assert!(matches!(
            NormalizedRequest::from_request(no_url),
            Err(PipelineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unparseable_url_is_invalid() {
        assert!(normalize_url("https://").is_err());
        assert!(normalize_url("https://exa mple.com").is_err());
    }

    #[test]
    fn test_blank_optional_fields_become_none() {
        let request = DocumentRequest::new("T", "example.com")
            .with_author("   ")
            .with_description(" desc ");
        let normalized = NormalizedRequest::from_request(request).unwrap();
        assert_eq!(normalized.author, None);
        assert_eq!(normalized.description.as_deref(), Some("desc"));
    }
}
