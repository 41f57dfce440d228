use std::fmt;

use crate::config::ValidationConfig;
use crate::constants::GENERIC_BINARY_MIME;
use crate::domain::{RawResponse, ValidatedPayload};

/// Why a fetched response did not count as a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NonSuccessStatus(u16),
    /// Below the hard size floor, whatever the content-type says.
    TooSmall { size: u64, floor: u64 },
    /// A relay answered with something that is not a document type.
    RelayContentType(Option<String>),
    /// Passed the floor but matched no acceptance rule.
    NotADocument { content_type: Option<String>, size: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NonSuccessStatus(status) => write!(f, "HTTP status {}", status),
            Rejection::TooSmall { size, floor } => {
                write!(f, "payload of {} bytes is below the {} byte floor", size, floor)
            }
            Rejection::RelayContentType(ct) => write!(
                f,
                "relay returned content-type {}",
                ct.as_deref().unwrap_or("<none>")
            ),
            Rejection::NotADocument { content_type, size } => write!(
                f,
                "{} bytes of {} do not look like a document",
                size,
                content_type.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

/// Heuristic document gate. It never parses the payload.
///
/// A response is accepted when it is a 2xx, clears the size floor, and any
/// of these holds:
/// - the declared content-type is in the accepted MIME list
/// - the source URL ends with the expected suffix
/// - the payload is larger than the size acceptance threshold
#[derive(Debug, Clone)]
pub struct PayloadValidator {
    config: ValidationConfig,
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl PayloadValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, raw: RawResponse) -> Result<ValidatedPayload, Rejection> {
        self.validate_with(raw, false)
    }

    /// `strict_content_type` applies the relay guard: only document types or
    /// a generic binary type are believed.
    pub fn validate_with(
        &self,
        raw: RawResponse,
        strict_content_type: bool,
    ) -> Result<ValidatedPayload, Rejection> {
        if !raw.is_success() {
            return Err(Rejection::NonSuccessStatus(raw.status));
        }

        let size = raw.byte_length();
        if size < self.config.min_document_bytes {
            return Err(Rejection::TooSmall {
                size,
                floor: self.config.min_document_bytes,
            });
        }

        let essence = raw.content_type.as_deref().map(mime_essence);
        let declared_document = essence
            .as_deref()
            .map(|m| self.is_accepted_mime(m))
            .unwrap_or(false);

        if strict_content_type {
            let generic = essence.as_deref() == Some(GENERIC_BINARY_MIME);
            if !declared_document && !generic {
                return Err(Rejection::RelayContentType(raw.content_type.clone()));
            }
        }

        let suffix_matches = path_has_suffix(&raw.source_url, &self.config.expected_suffix);
        let large_enough = size > self.config.size_accept_bytes;

        if !(declared_document || suffix_matches || large_enough) {
            return Err(Rejection::NotADocument {
                content_type: raw.content_type.clone(),
                size,
            });
        }

        let mime = match essence {
            Some(m) if !m.is_empty() && m != GENERIC_BINARY_MIME => m,
            _ => self.config.expected_mime.clone(),
        };
        Ok(ValidatedPayload::new(raw.bytes, mime))
    }

    fn is_accepted_mime(&self, essence: &str) -> bool {
        self.config
            .accepted_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(essence))
    }
}

/// `application/pdf; charset=binary` -> `application/pdf`
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn path_has_suffix(url: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url.to_lowercase(),
    };
    path.ends_with(&suffix.to_lowercase())
}
