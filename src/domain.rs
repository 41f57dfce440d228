// Data shapes shared by the pipeline stages, ports and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of document the user is attaching to a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Report,
    Study,
    #[default]
    Article,
    #[serde(rename = "press release")]
    PressRelease,
    Analysis,
    Research,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Report => "report",
            DocumentType::Study => "study",
            DocumentType::Article => "article",
            DocumentType::PressRelease => "press release",
            DocumentType::Analysis => "analysis",
            DocumentType::Research => "research",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "report" => Some(DocumentType::Report),
            "study" => Some(DocumentType::Study),
            "article" => Some(DocumentType::Article),
            "press release" => Some(DocumentType::PressRelease),
            "analysis" => Some(DocumentType::Analysis),
            "research" => Some(DocumentType::Research),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user submission: one URL plus the metadata typed into the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub title: String,
    pub source_url: String,
    pub author: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
    pub description: Option<String>,
    /// Facility the document belongs to, if any.
    pub associated_entity_id: Option<String>,
}

impl DocumentRequest {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            author: None,
            doc_type: DocumentType::default(),
            description: None,
            associated_entity_id: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.associated_entity_id = Some(entity_id.into());
        self
    }
}

/// What one strategy attempt got back. Lives only inside the resolver.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The URL the user asked for, not the relay URL that served it.
    pub source_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl RawResponse {
    pub fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Bytes that passed the validator (or were rendered by the synthesizer).
/// Only constructible inside the crate.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ValidatedPayload {
    pub(crate) fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Short format tag derived from the MIME type (`pdf`, `html`, ...).
    pub fn format(&self) -> String {
        let essence = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if essence.contains("pdf") {
            return crate::constants::PDF_FORMAT.to_string();
        }
        essence
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("bin")
            .to_string()
    }

    /// File extension for storage keys.
    pub fn extension(&self) -> String {
        match self.format().as_str() {
            "octet-stream" => "bin".to_string(),
            "plain" => "txt".to_string(),
            other => other.to_string(),
        }
    }
}

/// Location of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub bucket: String,
    pub key: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// A payload was stored and `url` points at the storage copy.
    Downloaded,
    /// Nothing stored; `url` is the normalized source URL.
    Referenced,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Downloaded => "downloaded",
            Provenance::Referenced => "referenced",
        }
    }
}

/// The canonical library entry handed back to the caller for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub format: String,
    pub description: String,
    pub url: String,
    pub storage_key: Option<String>,
    pub date: DateTime<Utc>,
    pub provenance: Provenance,
    pub associated_entity_id: Option<String>,
}

/// Where the stored bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadOrigin {
    Fetched,
    Synthesized,
}

/// User-facing notification level for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success,
    Warning(String),
}

impl Notice {
    pub fn is_warning(&self) -> bool {
        matches!(self, Notice::Warning(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Accepted,
    /// Transport error, timeout or non-success status.
    Failed(String),
    /// Got bytes, but the validator said no.
    Rejected(String),
    /// Not started (run budget spent).
    Skipped(String),
}

/// One line of the per-run attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptReport {
    pub strategy_id: String,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl AttemptReport {
    /// True when a request was actually sent for this attempt.
    pub fn was_attempted(&self) -> bool {
        !matches!(self.outcome, AttemptOutcome::Skipped(_))
    }
}

/// Result of a successful `submit_document` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub record: DocumentRecord,
    pub notice: Notice,
    pub attempts: Vec<AttemptReport>,
    pub payload_origin: Option<PayloadOrigin>,
}

impl Submission {
    /// Strategy ids that were actually attempted, in order.
    pub fn attempted_strategies(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.was_attempted())
            .map(|a| a.strategy_id.as_str())
            .collect()
    }
}
