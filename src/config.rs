use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub validation: ValidationConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelayConfig {
    pub id: String,
    /// Target URL with `{url}` or `{url_encoded}` placeholders.
    pub template: String,
}

impl RelayConfig {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub attempt_timeout_secs: u64,
    /// Optional cap on the whole run. Unset means every applicable
    /// strategy gets its own attempt timeout.
    pub run_budget_secs: Option<u64>,
    pub user_agent: String,
    /// Host labels (after the first one) that mark a host as restricted.
    pub restricted_host_labels: Vec<String>,
    pub relays: Vec<RelayConfig>,
    pub last_resort_relay: Option<RelayConfig>,
    pub title_relay_template: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            run_budget_secs: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            restricted_host_labels: DEFAULT_RESTRICTED_HOST_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            relays: DEFAULT_RELAYS
                .iter()
                .map(|(id, template)| RelayConfig::new(*id, *template))
                .collect(),
            last_resort_relay: Some(RelayConfig::new(
                DEFAULT_LAST_RESORT_RELAY.0,
                DEFAULT_LAST_RESORT_RELAY.1,
            )),
            title_relay_template: TITLE_RELAY_TEMPLATE.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub accepted_mime_types: Vec<String>,
    pub expected_suffix: String,
    /// MIME assumed for accepted payloads with no usable content-type.
    pub expected_mime: String,
    pub min_document_bytes: u64,
    pub size_accept_bytes: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            accepted_mime_types: DEFAULT_ACCEPTED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            expected_suffix: DEFAULT_EXPECTED_SUFFIX.to_string(),
            expected_mime: PDF_MIME.to_string(),
            min_document_bytes: DEFAULT_MIN_DOCUMENT_BYTES,
            size_accept_bytes: DEFAULT_SIZE_ACCEPT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// e.g. https://xyzcompany.supabase.co
    pub supabase_url: Option<String>,
    pub api_key: Option<String>,
    pub bucket: String,
    pub prefix: String,
    pub cache_control: String,
    pub public: bool,
    pub bucket_size_limit_bytes: u64,
    pub bucket_allowed_mime_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            api_key: None,
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: DEFAULT_OBJECT_PREFIX.to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            public: true,
            bucket_size_limit_bytes: DEFAULT_BUCKET_SIZE_LIMIT_BYTES,
            bucket_allowed_mime_types: DEFAULT_BUCKET_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Store a rendered placeholder when every fetch strategy fails.
    pub synthesize_on_exhaustion: bool,
    /// Fail the run instead of degrading when storage is unavailable.
    pub require_storage: bool,
    pub default_referenced_format: String,
    pub default_author: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            synthesize_on_exhaustion: false,
            require_storage: false,
            default_referenced_format: REFERENCED_FORMAT.to_string(),
            default_author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

impl Config {
    /// Reads `path` when it exists, otherwise starts from defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Layers Supabase settings from the environment on top of the file.
    /// Accepts either SUPABASE_URL or SUPABASE_PROJECT_REF.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            self.storage.supabase_url = Some(url);
        } else if let Ok(project_ref) = std::env::var("SUPABASE_PROJECT_REF") {
            self.storage.supabase_url = Some(format!("https://{}.supabase.co", project_ref));
        }
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
        {
            self.storage.api_key = Some(key);
        }
        if let Ok(bucket) = std::env::var("SUPABASE_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Ok(prefix) = std::env::var("SUPABASE_PREFIX") {
            self.storage.prefix = prefix;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.attempt_timeout_secs must be positive".to_string(),
            ));
        }
        if matches!(self.fetch.run_budget_secs, Some(budget) if budget < self.fetch.attempt_timeout_secs) {
            return Err(ConfigError::Invalid(
                "fetch.run_budget_secs must cover at least one attempt".to_string(),
            ));
        }
        let relays = self.fetch.relays.iter().chain(self.fetch.last_resort_relay.iter());
        for relay in relays {
            if !relay.template.contains("{url}") && !relay.template.contains("{url_encoded}") {
                return Err(ConfigError::Invalid(format!(
                    "relay '{}' template has no {{url}} placeholder",
                    relay.id
                )));
            }
        }
        if self.validation.min_document_bytes > self.validation.size_accept_bytes {
            return Err(ConfigError::Invalid(
                "validation.min_document_bytes exceeds size_accept_bytes".to_string(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket is empty".to_string()));
        }
        Ok(())
    }
}
