pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod storage;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub use app::DocumentPipeline;
pub use config::Config;
pub use domain::{DocumentRecord, DocumentRequest, DocumentType, Notice, Provenance, Submission};
pub use error::PipelineError;
