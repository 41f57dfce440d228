use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Barrier;
use tracing::debug;

use crate::app::ports::{BucketPolicy, ObjectStorePort, UploadRequest};
use crate::error::StoreError;

pub const IN_MEMORY_BASE_URL: &str = "https://storage.local";

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory object store for development, dry runs and tests. Enforces the
/// same bucket policy and upsert rules as the hosted backend.
pub struct InMemoryObjectStore {
    buckets: Mutex<HashMap<String, BucketPolicy>>,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    calls: AtomicUsize,
    bucket_creations: AtomicUsize,
    fail_uploads: AtomicBool,
    /// When set, `list_buckets` waits here so concurrent runs all observe
    /// the same snapshot before any of them creates the bucket.
    list_barrier: Option<Barrier>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            bucket_creations: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            list_barrier: None,
        }
    }

    pub fn with_list_barrier(parties: usize) -> Self {
        Self {
            list_barrier: Some(Barrier::new(parties)),
            ..Self::new()
        }
    }

    pub fn with_bucket(self, name: &str, policy: BucketPolicy) -> Self {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), policy);
        self
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Every port call, including `public_url`.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bucket_creations(&self) -> usize {
        self.bucket_creations.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.bytes.clone())
    }

    pub fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.content_type.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn public_base(bucket: &str) -> String {
        format!("{}/storage/v1/object/public/{}/", IN_MEMORY_BASE_URL, bucket)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn mime_allowed(allowed: &[String], content_type: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    allowed.iter().any(|pattern| match pattern.strip_suffix("/*") {
        Some(family) => essence
            .split('/')
            .next()
            .map(|f| f.eq_ignore_ascii_case(family))
            .unwrap_or(false),
        None => pattern.eq_ignore_ascii_case(essence),
    })
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        self.touch();
        let names: Vec<String> = self
            .buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        if let Some(barrier) = &self.list_barrier {
            barrier.wait().await;
        }
        Ok(names)
    }

    async fn create_bucket(&self, name: &str, policy: &BucketPolicy) -> Result<(), StoreError> {
        self.touch();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        if buckets.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        buckets.insert(name.to_string(), policy.clone());
        self.bucket_creations.fetch_add(1, Ordering::SeqCst);
        debug!("Created bucket: {}", name);
        Ok(())
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<(), StoreError> {
        self.touch();
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend {
                status: 503,
                message: "storage unavailable".to_string(),
            });
        }

        let policy = self
            .buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(request.bucket)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("bucket {}", request.bucket)))?;
        if !mime_allowed(&policy.allowed_mime_types, request.content_type) {
            return Err(StoreError::Backend {
                status: 415,
                message: format!("mime type {} is not supported", request.content_type),
            });
        }
        if policy.file_size_limit > 0 && request.bytes.len() as u64 > policy.file_size_limit {
            return Err(StoreError::Backend {
                status: 413,
                message: "payload too large".to_string(),
            });
        }

        let key = (request.bucket.to_string(), request.path.to_string());
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        if !request.upsert && objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(request.path.to_string()));
        }
        objects.insert(
            key,
            StoredObject {
                bytes: request.bytes.to_vec(),
                content_type: request.content_type.to_string(),
            },
        );
        debug!("Stored object: {}/{}", request.bucket, request.path);
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        self.touch();
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(bucket.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.touch();
        format!("{}{}", Self::public_base(bucket), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BucketPolicy {
        BucketPolicy {
            public: true,
            allowed_mime_types: vec!["application/pdf".to_string(), "image/*".to_string()],
            file_size_limit: 100,
        }
    }

    fn upload<'a>(path: &'a str, bytes: &'a [u8], content_type: &'a str, upsert: bool) -> UploadRequest<'a> {
        UploadRequest {
            bucket: "docs",
            path,
            bytes,
            content_type,
            cache_control: "3600",
            upsert,
        }
    }

    #[tokio::test]
    async fn test_second_create_reports_already_exists() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("docs", &policy()).await.unwrap();
        let err = store.create_bucket("docs", &policy()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.bucket_creations(), 1);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_plain_upload_conflicts() {
        let store = InMemoryObjectStore::new().with_bucket("docs", policy());
        store.upload(upload("a.pdf", b"one", "application/pdf", true)).await.unwrap();
        store.upload(upload("a.pdf", b"two", "application/pdf", true)).await.unwrap();
        assert_eq!(store.object("docs", "a.pdf").unwrap(), b"two".to_vec());
        assert_eq!(store.object_count(), 1);

        let err = store
            .upload(upload("a.pdf", b"three", "application/pdf", false))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_bucket_policy_is_enforced() {
        let store = InMemoryObjectStore::new().with_bucket("docs", policy());
        assert!(store.upload(upload("a.png", b"img", "image/png", true)).await.is_ok());
        assert!(store.upload(upload("a.html", b"<html>", "text/html", true)).await.is_err());
        assert!(store.upload(upload("big.pdf", &[0u8; 101], "application/pdf", true)).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_to_missing_bucket_fails() {
        let store = InMemoryObjectStore::new();
        let err = store.upload(upload("a.pdf", b"x", "application/pdf", true)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
