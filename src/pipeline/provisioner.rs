use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::ports::{BucketPolicy, ObjectStorePort, UploadRequest};
use crate::config::StorageConfig;
use crate::domain::{StorageObject, ValidatedPayload};
use crate::error::{PipelineError, StoreError};
use crate::observability::metrics;

/// Longest readable title slug kept in a key.
const MAX_SLUG_CHARS: usize = 60;
/// Hex characters of the title digest appended to the slug.
const TITLE_DIGEST_CHARS: usize = 12;

static UNSAFE_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("static regex is valid"));

/// Ensures the bucket exists, writes the artifact under a deterministic key
/// and resolves its public address.
pub struct StorageProvisioner {
    store: Arc<dyn ObjectStorePort>,
    config: StorageConfig,
}

impl StorageProvisioner {
    pub fn new(store: Arc<dyn ObjectStorePort>, config: StorageConfig) -> Self {
        Self { store, config }
    }

    pub async fn store(
        &self,
        payload: &ValidatedPayload,
        suggested_name: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<StorageObject, PipelineError> {
        self.ensure_bucket().await?;

        let key = derive_key(&self.config.prefix, submitted_at, suggested_name, &payload.extension());
        info!(bucket = %self.config.bucket, key = %key, bytes = payload.size_bytes(), "Uploading document");

        self.store
            .upload(UploadRequest {
                bucket: &self.config.bucket,
                path: &key,
                bytes: payload.bytes(),
                content_type: payload.mime_type(),
                cache_control: &self.config.cache_control,
                upsert: true,
            })
            .await
            .map_err(|e| {
                metrics::storage::upload_error();
                PipelineError::StorageProvision(format!("upload of '{}' failed: {}", key, e))
            })?;
        metrics::storage::upload_success(payload.size_bytes());

        let public_url = self.store.public_url(&self.config.bucket, &key);
        if public_url.trim().is_empty() {
            return Err(PipelineError::StorageProvision(format!(
                "no public URL for '{}'",
                key
            )));
        }

        Ok(StorageObject {
            bucket: self.config.bucket.clone(),
            key,
            public_url,
        })
    }

    pub async fn remove(&self, key: &str) -> Result<(), PipelineError> {
        match self.store.remove(&self.config.bucket, key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(PipelineError::StorageProvision(format!(
                "removal of '{}' failed: {}",
                key, e
            ))),
        }
    }

    /// Check-then-create. A concurrent creator winning the race shows up as
    /// `AlreadyExists`, which counts as success.
    async fn ensure_bucket(&self) -> Result<(), PipelineError> {
        let bucket = &self.config.bucket;
        let buckets = self.store.list_buckets().await.map_err(|e| {
            PipelineError::StorageProvision(format!("could not list buckets: {}", e))
        })?;
        if buckets.iter().any(|b| b == bucket) {
            debug!(bucket = %bucket, "Bucket present");
            return Ok(());
        }

        warn!(bucket = %bucket, "Bucket missing, creating it");
        let policy = BucketPolicy {
            public: self.config.public,
            allowed_mime_types: self.config.bucket_allowed_mime_types.clone(),
            file_size_limit: self.config.bucket_size_limit_bytes,
        };
        match self.store.create_bucket(bucket, &policy).await {
            Ok(()) => {
                info!(bucket = %bucket, "Bucket created");
                metrics::storage::bucket_created();
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!(bucket = %bucket, "Bucket created concurrently");
                Ok(())
            }
            Err(e) => Err(PipelineError::StorageProvision(format!(
                "could not create bucket '{}': {}",
                bucket, e
            ))),
        }
    }
}

/// `<prefix>/<millis>_<slug>_<digest>.<ext>`.
///
/// The slug is the lowercased title with every character outside `[a-z0-9]`
/// turned into `_`, capped at 60 characters. The digest is the first 12 hex
/// characters of the SHA-256 of the raw title, so titles that sanitize to
/// the same slug still get distinct keys.
pub fn derive_key(prefix: &str, submitted_at: DateTime<Utc>, title: &str, extension: &str) -> String {
    let file_name = format!(
        "{}_{}_{}.{}",
        submitted_at.timestamp_millis(),
        sanitize_title(title),
        title_digest(title),
        extension
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

fn sanitize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = UNSAFE_KEY_CHARS.replace_all(&lowered, "_");
    // Only ASCII survives the replacement, so byte truncation is safe.
    slug[..slug.len().min(MAX_SLUG_CHARS)].to_string()
}

fn title_digest(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..TITLE_DIGEST_CHARS].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file_name(key: &str) -> &str {
        key.rsplit('/').next().unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let at = Utc.timestamp_millis_opt(1_742_485_051_000).unwrap();
        let a = derive_key("pdfs", at, "Rapport Annuel 2024", "pdf");
        let b = derive_key("pdfs", at, "Rapport Annuel 2024", "pdf");
        assert_eq!(a, b);
        assert!(a.starts_with("pdfs/1742485051000_rapport_annuel_2024_"));
        assert!(a.ends_with(".pdf"));
        let digest = &a["pdfs/1742485051000_rapport_annuel_2024_".len()..a.len() - ".pdf".len()];
        assert_eq!(digest.len(), TITLE_DIGEST_CHARS);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_titles_or_times_give_distinct_keys() {
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        let later = Utc.timestamp_millis_opt(1_001).unwrap();
        assert_ne!(derive_key("p", at, "A", "pdf"), derive_key("p", at, "B", "pdf"));
        assert_ne!(derive_key("p", at, "A", "pdf"), derive_key("p", later, "A", "pdf"));
    }

    #[test]
    fn test_titles_with_the_same_slug_get_distinct_keys() {
        let at = Utc.timestamp_millis_opt(1_742_485_051_000).unwrap();
        assert_eq!(sanitize_title("Rapport 2024"), sanitize_title("Rapport-2024"));
        assert_ne!(
            derive_key("pdfs", at, "Rapport 2024", "pdf"),
            derive_key("pdfs", at, "Rapport-2024", "pdf")
        );

        assert_eq!(sanitize_title("报告"), sanitize_title("文件"));
        assert_ne!(derive_key("pdfs", at, "报告", "pdf"), derive_key("pdfs", at, "文件", "pdf"));
    }

    #[test]
    fn test_long_titles_are_capped() {
        let at = Utc.timestamp_millis_opt(7).unwrap();
        let title = "Battery recycling ".repeat(20);
        let key = derive_key("pdfs", at, &title, "pdf");
        let expected_len = "7_".len() + MAX_SLUG_CHARS + 1 + TITLE_DIGEST_CHARS + ".pdf".len();
        assert_eq!(file_name(&key).len(), expected_len);
    }

    #[test]
    fn test_key_without_prefix_and_with_non_ascii_title() {
        let at = Utc.timestamp_millis_opt(5).unwrap();
        let key = derive_key("/", at, "Étude: Li-ion", "html");
        assert!(!key.contains('/'));
        assert!(key.starts_with("5__tude__li_ion_"));
        assert!(key.ends_with(".html"));
    }
}
