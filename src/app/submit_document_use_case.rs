use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::{HttpClientPort, ObjectStorePort};
use crate::config::{Config, PipelineConfig};
use crate::domain::{
    AttemptReport, DocumentRequest, Notice, PayloadOrigin, Provenance, Submission, ValidatedPayload,
};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::{
    CancelFlag, DocumentRecordAssembler, FetchResolver, NormalizedRequest, PayloadValidator,
    RecordOutcome, ResolveOutcome, StorageProvisioner, StrategyTable, SyntheticDocumentGenerator,
    UrlClassification, UrlClassifier,
};

/// The single entry point the dashboard uses to add a document to the
/// library. Runs share nothing but the storage backend, so one pipeline can
/// serve any number of concurrent submissions.
pub struct DocumentPipeline {
    classifier: UrlClassifier,
    resolver: FetchResolver,
    synthesizer: SyntheticDocumentGenerator,
    provisioner: StorageProvisioner,
    assembler: DocumentRecordAssembler,
    policy: PipelineConfig,
}

impl DocumentPipeline {
    pub fn new(config: &Config, http: Arc<dyn HttpClientPort>, store: Arc<dyn ObjectStorePort>) -> Self {
        Self::with_strategies(config, StrategyTable::from_config(&config.fetch), http, store)
    }

    /// Same as `new` with an explicit strategy list.
    pub fn with_strategies(
        config: &Config,
        strategies: StrategyTable,
        http: Arc<dyn HttpClientPort>,
        store: Arc<dyn ObjectStorePort>,
    ) -> Self {
        let validator = PayloadValidator::new(config.validation.clone());
        Self {
            classifier: UrlClassifier::new(
                config.fetch.restricted_host_labels.clone(),
                config.validation.expected_suffix.clone(),
            ),
            resolver: FetchResolver::new(http, strategies, validator, &config.fetch),
            synthesizer: SyntheticDocumentGenerator::new(),
            provisioner: StorageProvisioner::new(store, config.storage.clone()),
            assembler: DocumentRecordAssembler::new(&config.pipeline),
            policy: config.pipeline.clone(),
        }
    }

    pub fn classify(&self, url: &str) -> UrlClassification {
        self.classifier.classify(url)
    }

    pub fn strategies(&self) -> &StrategyTable {
        self.resolver.strategies()
    }

    pub async fn submit_document(&self, request: DocumentRequest) -> Result<Submission> {
        self.submit_document_with_cancel(request, &CancelFlag::new()).await
    }

    /// Produces exactly one record or one error. `cancel` is honored between
    /// network calls only.
    pub async fn submit_document_with_cancel(
        &self,
        request: DocumentRequest,
        cancel: &CancelFlag,
    ) -> Result<Submission> {
        let span = tracing::info_span!("submit_document", title = %request.title);
        let result = self.run(request, cancel).instrument(span).await;

        match &result {
            Ok(submission) => metrics::submissions::completed(submission.record.provenance.as_str()),
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Document submission failed");
                metrics::submissions::failed(e.kind());
            }
        }
        result
    }

    /// Deletes a stored artifact by its storage key. Missing keys are fine.
    pub async fn remove_stored(&self, storage_key: &str) -> Result<()> {
        self.provisioner.remove(storage_key).await
    }

    async fn run(&self, request: DocumentRequest, cancel: &CancelFlag) -> Result<Submission> {
        let request = NormalizedRequest::from_request(request)?;
        let submitted_at = Utc::now();
        let classification = self.classifier.classify(&request.source_url);
        info!(
            url = %request.source_url,
            is_likely_pdf = classification.is_likely_pdf,
            domain_class = ?classification.domain_class,
            "Submitting document"
        );

        let resolution = self
            .resolver
            .resolve(&request.source_url, &classification, cancel)
            .await?;
        let attempts = resolution.attempts;

        let (payload, origin) = match resolution.outcome {
            ResolveOutcome::Resolved { payload, strategy_id } => {
                info!(strategy = %strategy_id, "Document retrieved");
                (payload, PayloadOrigin::Fetched)
            }
            ResolveOutcome::Exhausted if self.policy.synthesize_on_exhaustion => {
                match self
                    .synthesizer
                    .synthesize(&request.title, &request.source_url, submitted_at)
                {
                    Ok(payload) => {
                        info!("Fetch exhausted, storing placeholder document");
                        (payload, PayloadOrigin::Synthesized)
                    }
                    Err(e) => {
                        warn!(error = %e, "Placeholder rendering failed, saving as link");
                        return Ok(self.referenced(
                            &request,
                            &classification,
                            None,
                            submitted_at,
                            attempts,
                            format!("Document could not be retrieved; saved as a link ({})", e),
                        ));
                    }
                }
            }
            ResolveOutcome::Exhausted => {
                return Ok(self.referenced(
                    &request,
                    &classification,
                    None,
                    submitted_at,
                    attempts,
                    "Document could not be retrieved; saved as a link to the original page".to_string(),
                ));
            }
        };

        if cancel.is_cancelled() {
            info!("Run cancelled before storage");
            return Err(PipelineError::Cancelled);
        }

        self.store_and_assemble(request, classification, payload, origin, submitted_at, attempts)
            .await
    }

    async fn store_and_assemble(
        &self,
        request: NormalizedRequest,
        classification: UrlClassification,
        payload: ValidatedPayload,
        origin: PayloadOrigin,
        submitted_at: DateTime<Utc>,
        attempts: Vec<AttemptReport>,
    ) -> Result<Submission> {
        let format = payload.format();
        match self.provisioner.store(&payload, &request.title, submitted_at).await {
            Ok(object) => {
                let notice = match origin {
                    PayloadOrigin::Fetched => Notice::Success,
                    PayloadOrigin::Synthesized => Notice::Warning(
                        "Document could not be retrieved; a placeholder with the source link was stored"
                            .to_string(),
                    ),
                };
                let record = self.assembler.assemble(
                    Uuid::new_v4().to_string(),
                    &request,
                    &classification,
                    RecordOutcome::Stored { object, format },
                    submitted_at,
                );
                info!(url = %record.url, key = ?record.storage_key, "Document stored");
                Ok(Submission {
                    record,
                    notice,
                    attempts,
                    payload_origin: Some(origin),
                })
            }
            Err(e) if self.policy.require_storage => Err(e),
            Err(e) => {
                warn!(error = %e, "Storage unavailable, saving as link");
                let payload_format = match origin {
                    PayloadOrigin::Fetched => Some(format),
                    PayloadOrigin::Synthesized => None,
                };
                Ok(self.referenced(
                    &request,
                    &classification,
                    payload_format,
                    submitted_at,
                    attempts,
                    format!("Document could not be stored; saved as a link ({})", e),
                ))
            }
        }
    }

    fn referenced(
        &self,
        request: &NormalizedRequest,
        classification: &UrlClassification,
        payload_format: Option<String>,
        submitted_at: DateTime<Utc>,
        attempts: Vec<AttemptReport>,
        warning: String,
    ) -> Submission {
        let record = self.assembler.assemble(
            Uuid::new_v4().to_string(),
            request,
            classification,
            RecordOutcome::Referenced { payload_format },
            submitted_at,
        );
        debug_assert_eq!(record.provenance, Provenance::Referenced);
        warn!(url = %record.url, "{}", warning);
        Submission {
            record,
            notice: Notice::Warning(warning),
            attempts,
            payload_origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{FetchRequest, HttpGetResult};
    use crate::error::FetchError;
    use crate::storage::InMemoryObjectStore;
    use async_trait::async_trait;

    struct DeadNetwork;

    #[async_trait]
    impl HttpClientPort for DeadNetwork {
        async fn get(&self, _request: &FetchRequest) -> std::result::Result<HttpGetResult, FetchError> {
            Err(FetchError::Other("network unreachable".to_string()))
        }
    }

    struct PdfEverywhere;

    #[async_trait]
    impl HttpClientPort for PdfEverywhere {
        async fn get(&self, _request: &FetchRequest) -> std::result::Result<HttpGetResult, FetchError> {
            Ok(HttpGetResult {
                status: 200,
                bytes: vec![b'%'; 20_000],
                content_type: Some("application/pdf".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_invalid_request_fails_before_any_io() {
        let store = Arc::new(InMemoryObjectStore::new());
        let pipeline = DocumentPipeline::new(&Config::default(), Arc::new(DeadNetwork), store.clone());

        let result = pipeline
            .submit_document(DocumentRequest::new("", "https://example.com/a.pdf"))
            .await;

        assert!(matches!(result, Err(PipelineError::InvalidRequest(_))));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_synthesized_placeholder_is_stored_with_warning() {
        let mut config = Config::default();
        config.pipeline.synthesize_on_exhaustion = true;
        let store = Arc::new(InMemoryObjectStore::new());
        let pipeline = DocumentPipeline::new(&config, Arc::new(DeadNetwork), store.clone());

        let submission = pipeline
            .submit_document(DocumentRequest::new("Usine de recyclage", "https://dead-site.example/page"))
            .await
            .unwrap();

        assert_eq!(submission.record.provenance, Provenance::Downloaded);
        assert_eq!(submission.payload_origin, Some(PayloadOrigin::Synthesized));
        assert_eq!(submission.record.format, "pdf");
        assert!(submission.notice.is_warning());
        let key = submission.record.storage_key.clone().unwrap();
        assert!(store.object("documents2", &key).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_unless_required() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.fail_uploads(true);
        let pipeline = DocumentPipeline::new(&Config::default(), Arc::new(PdfEverywhere), store.clone());

        let submission = pipeline
            .submit_document(DocumentRequest::new("Report", "https://example.com/report.pdf"))
            .await
            .unwrap();
        assert_eq!(submission.record.provenance, Provenance::Referenced);
        assert_eq!(submission.record.url, "https://example.com/report.pdf");
        assert_eq!(submission.record.format, "pdf");
        assert!(submission.notice.is_warning());

        let mut strict = Config::default();
        strict.pipeline.require_storage = true;
        let pipeline = DocumentPipeline::new(&strict, Arc::new(PdfEverywhere), store);
        let result = pipeline
            .submit_document(DocumentRequest::new("Report", "https://example.com/report.pdf"))
            .await;
        assert!(matches!(result, Err(PipelineError::StorageProvision(_))));
    }

    #[tokio::test]
    async fn test_cancelled_run_creates_no_record() {
        let store = Arc::new(InMemoryObjectStore::new());
        let pipeline = DocumentPipeline::new(&Config::default(), Arc::new(PdfEverywhere), store.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = pipeline
            .submit_document_with_cancel(DocumentRequest::new("Report", "https://example.com/r.pdf"), &cancel)
            .await;

        assert_eq!(result.unwrap_err(), PipelineError::Cancelled);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_stored_tolerates_missing_keys() {
        let store = Arc::new(InMemoryObjectStore::new());
        let pipeline = DocumentPipeline::new(&Config::default(), Arc::new(PdfEverywhere), store.clone());

        let submission = pipeline
            .submit_document(DocumentRequest::new("Report", "https://example.com/r.pdf"))
            .await
            .unwrap();
        let key = submission.record.storage_key.unwrap();

        pipeline.remove_stored(&key).await.unwrap();
        assert!(store.object("documents2", &key).is_none());
        pipeline.remove_stored(&key).await.unwrap();
    }
}
