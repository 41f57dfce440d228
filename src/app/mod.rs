pub mod ports;
pub mod submit_document_use_case;

pub use submit_document_use_case::DocumentPipeline;
