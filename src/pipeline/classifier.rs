use reqwest::Url;
use serde::Serialize;

use crate::constants::DEFAULT_RESTRICTED_HOST_LABELS;

/// Coarse host class used to pick specialized fetch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainClass {
    /// Government, education and organization style hosts.
    Restricted,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UrlClassification {
    /// Path ends in the document suffix. An ordering hint only.
    pub is_likely_pdf: bool,
    pub domain_class: DomainClass,
}

/// Pure, declarative URL classifier.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    restricted_labels: Vec<String>,
    document_suffix: String,
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_RESTRICTED_HOST_LABELS.iter().map(|s| s.to_string()).collect(),
            crate::constants::DEFAULT_EXPECTED_SUFFIX,
        )
    }
}

impl UrlClassifier {
    pub fn new(restricted_labels: Vec<String>, document_suffix: impl Into<String>) -> Self {
        Self {
            restricted_labels: restricted_labels
                .into_iter()
                .map(|l| l.trim().trim_matches('.').to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            document_suffix: document_suffix.into().to_lowercase(),
        }
    }

    pub fn classify(&self, url: &str) -> UrlClassification {
        let parsed = Url::parse(url).ok();

        let path = parsed
            .as_ref()
            .map(|u| u.path().to_lowercase())
            .unwrap_or_else(|| strip_query(url).to_lowercase());
        let is_likely_pdf = path.ends_with(&self.document_suffix);

        let domain_class = match parsed.as_ref().and_then(|u| u.host_str()) {
            Some(host) if self.is_restricted_host(host) => DomainClass::Restricted,
            _ => DomainClass::Open,
        };

        UrlClassification {
            is_likely_pdf,
            domain_class,
        }
    }

    /// A host is restricted when any label after the first matches, so
    /// `agency.gov`, `www.gov.uk` and `data.gouv.fr` qualify while
    /// `gov.example.com` does not.
    fn is_restricted_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        host.split('.')
            .skip(1)
            .any(|label| self.restricted_labels.iter().any(|r| r == label))
    }
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
