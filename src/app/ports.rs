use async_trait::async_trait;

use crate::error::{FetchError, StoreError};

/// One outbound GET as a strategy describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Send no Referer header and no cookies.
    pub omit_credentials: bool,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            omit_credentials: false,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Outbound HTTP used by fetch strategies and the title extractor.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<HttpGetResult, FetchError>;
}

/// Bucket settings applied when the provisioner has to create the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketPolicy {
    pub public: bool,
    pub allowed_mime_types: Vec<String>,
    pub file_size_limit: u64,
}

#[derive(Clone, Debug)]
pub struct UploadRequest<'a> {
    pub bucket: &'a str,
    pub path: &'a str,
    pub bytes: &'a [u8],
    pub content_type: &'a str,
    pub cache_control: &'a str,
    pub upsert: bool,
}

/// Object storage backend (Supabase Storage in production).
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>, StoreError>;

    /// Must return `StoreError::AlreadyExists` when the bucket is already there.
    async fn create_bucket(&self, name: &str, policy: &BucketPolicy) -> Result<(), StoreError>;

    async fn upload(&self, request: UploadRequest<'_>) -> Result<(), StoreError>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<(), StoreError>;

    /// Stable public address of an object; no I/O.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
