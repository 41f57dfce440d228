use thiserror::Error;

/// Terminal outcomes of a document pipeline run.
///
/// `NetworkExhaustion` and `ValidationRejected` are produced inside the
/// fetch resolver and recorded per attempt; a run degrades instead of
/// surfacing them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("All {attempts} fetch strategies failed")]
    NetworkExhaustion { attempts: usize },

    #[error("Response rejected by validator: {0}")]
    ValidationRejected(String),

    #[error("Storage provisioning failed: {0}")]
    StorageProvision(String),

    #[error("Placeholder document could not be rendered: {0}")]
    Synthesis(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::NetworkExhaustion { .. } => "network_exhaustion",
            PipelineError::ValidationRejected(_) => "validation_rejected",
            PipelineError::StorageProvision(_) => "storage_provision",
            PipelineError::Synthesis(_) => "synthesis",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

/// Errors reported by an object storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage is not configured: {0}")]
    NotConfigured(String),
}

/// Errors from the outbound HTTP port.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
