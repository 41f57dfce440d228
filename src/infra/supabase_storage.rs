use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::ports::{BucketPolicy, ObjectStorePort, UploadRequest};
use crate::config::StorageConfig;
use crate::error::StoreError;

/// Supabase Storage over its REST API.
/// Config via `StorageConfig` (filled from the environment by
/// `Config::with_env_overrides`):
/// - SUPABASE_URL or SUPABASE_PROJECT_REF
/// - SUPABASE_SERVICE_ROLE_KEY (falls back to SUPABASE_ANON_KEY)
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BucketSummary {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateBucketBody<'a> {
    id: &'a str,
    name: &'a str,
    public: bool,
    allowed_mime_types: &'a [String],
    file_size_limit: u64,
}

impl SupabaseStorage {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let base_url = config
            .supabase_url
            .clone()
            .ok_or_else(|| StoreError::NotConfigured("SUPABASE_URL or SUPABASE_PROJECT_REF".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| StoreError::NotConfigured("SUPABASE_SERVICE_ROLE_KEY".to_string()))?;
        Ok(Self::new(base_url, api_key))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.clone())
    }

    fn object_endpoint(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }
}

/// Supabase reports conflicts either as HTTP 409 or as a 400 whose body
/// says "Duplicate" / "already exists". Other statuses are never conflicts.
fn is_conflict(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    status == StatusCode::BAD_REQUEST && (lower.contains("duplicate") || lower.contains("already exists"))
}

fn is_missing(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    status == StatusCode::BAD_REQUEST && (lower.contains("not found") || lower.contains("not_found"))
}

fn cache_control_value(cache_control: &str) -> String {
    if cache_control.chars().all(|c| c.is_ascii_digit()) {
        format!("max-age={}", cache_control)
    } else {
        cache_control.to_string()
    }
}

fn backend_error(status: StatusCode, body: String) -> StoreError {
    StoreError::Backend {
        status: status.as_u16(),
        message: body,
    }
}

#[async_trait]
impl ObjectStorePort for SupabaseStorage {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let endpoint = format!("{}/storage/v1/bucket", self.base_url);
        let resp = self.authorized(self.client.get(&endpoint)).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(backend_error(status, body));
        }
        let buckets: Vec<BucketSummary> = serde_json::from_str(&body)?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }

    async fn create_bucket(&self, name: &str, policy: &BucketPolicy) -> Result<(), StoreError> {
        let endpoint = format!("{}/storage/v1/bucket", self.base_url);
        let body = CreateBucketBody {
            id: name,
            name,
            public: policy.public,
            allowed_mime_types: &policy.allowed_mime_types,
            file_size_limit: policy.file_size_limit,
        };
        let resp = self
            .authorized(self.client.post(&endpoint))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            debug!(bucket = %name, "Supabase bucket created");
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        if is_conflict(status, &text) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        Err(backend_error(status, text))
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<(), StoreError> {
        let endpoint = self.object_endpoint(request.bucket, request.path);
        let resp = self
            .authorized(self.client.post(&endpoint))
            .header(CONTENT_TYPE, request.content_type)
            .header(CACHE_CONTROL, cache_control_value(request.cache_control))
            .header("x-upsert", if request.upsert { "true" } else { "false" })
            .body(request.bytes.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        if !request.upsert && is_conflict(status, &text) {
            return Err(StoreError::AlreadyExists(request.path.to_string()));
        }
        Err(backend_error(status, text))
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        let endpoint = self.object_endpoint(bucket, path);
        let resp = self.authorized(self.client.delete(&endpoint)).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        if is_missing(status, &text) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Err(backend_error(status, text))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_format() {
        let store = SupabaseStorage::new("https://xyz.supabase.co/", "key");
        assert_eq!(
            store.public_url("documents2", "pdfs/1_a.pdf"),
            "https://xyz.supabase.co/storage/v1/object/public/documents2/pdfs/1_a.pdf"
        );
    }

    #[test]
    fn test_conflict_detection() {
        assert!(is_conflict(StatusCode::CONFLICT, ""));
        assert!(is_conflict(
            StatusCode::BAD_REQUEST,
            r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#
        ));
        assert!(!is_conflict(StatusCode::BAD_REQUEST, r#"{"error":"Invalid"}"#));
    }

    #[test]
    fn test_server_errors_mentioning_duplicates_are_not_conflicts() {
        assert!(!is_conflict(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"duplicate key value violates unique constraint"}"#
        ));
        assert!(!is_conflict(StatusCode::FORBIDDEN, "bucket already exists"));
    }

    #[test]
    fn test_missing_object_detection() {
        assert!(is_missing(StatusCode::NOT_FOUND, ""));
        assert!(is_missing(StatusCode::BAD_REQUEST, r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#));
        assert!(!is_missing(StatusCode::BAD_GATEWAY, "upstream not found"));
    }

    #[test]
    fn test_cache_control_seconds_become_max_age() {
        assert_eq!(cache_control_value("3600"), "max-age=3600");
        assert_eq!(cache_control_value("no-store"), "no-store");
    }

    #[test]
    fn test_from_config_requires_url_and_key() {
        let mut config = StorageConfig::default();
        assert!(matches!(
            SupabaseStorage::from_config(&config),
            Err(StoreError::NotConfigured(_))
        ));
        config.supabase_url = Some("https://xyz.supabase.co".to_string());
        config.api_key = Some("service".to_string());
        assert!(SupabaseStorage::from_config(&config).is_ok());
    }
}
