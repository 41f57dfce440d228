use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::constants::PDF_FORMAT;
use crate::domain::{DocumentRecord, Provenance, StorageObject};
use crate::pipeline::classifier::UrlClassification;
use crate::pipeline::request::NormalizedRequest;

/// What the pipeline ended up with for one request.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Stored {
        object: StorageObject,
        format: String,
    },
    /// Nothing stored. `payload_format` is set when a payload was fetched
    /// but could not be stored.
    Referenced { payload_format: Option<String> },
}

/// Merges request metadata with the pipeline outcome. Pure.
#[derive(Debug, Clone)]
pub struct DocumentRecordAssembler {
    default_author: String,
    default_referenced_format: String,
}

impl Default for DocumentRecordAssembler {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl DocumentRecordAssembler {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            default_author: config.default_author.clone(),
            default_referenced_format: config.default_referenced_format.clone(),
        }
    }

    pub fn assemble(
        &self,
        id: String,
        request: &NormalizedRequest,
        classification: &UrlClassification,
        outcome: RecordOutcome,
        date: DateTime<Utc>,
    ) -> DocumentRecord {
        let (provenance, url, storage_key, format) = match outcome {
            RecordOutcome::Stored { object, format } => {
                (Provenance::Downloaded, object.public_url, Some(object.key), format)
            }
            RecordOutcome::Referenced { payload_format } => {
                let format = payload_format.unwrap_or_else(|| {
                    if classification.is_likely_pdf {
                        PDF_FORMAT.to_string()
                    } else {
                        self.default_referenced_format.clone()
                    }
                });
                (Provenance::Referenced, request.source_url.clone(), None, format)
            }
        };

        DocumentRecord {
            id,
            title: request.title.clone(),
            author: request
                .author
                .clone()
                .unwrap_or_else(|| self.default_author.clone()),
            doc_type: request.doc_type,
            format,
            description: request
                .description
                .clone()
                .unwrap_or_else(|| format!("Source: {}", request.source_url)),
            url,
            storage_key,
            date,
            provenance,
            associated_entity_id: request.associated_entity_id.clone(),
        }
    }
}
