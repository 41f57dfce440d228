use crate::app::ports::FetchRequest;
use crate::config::{FetchConfig, RelayConfig};
use crate::constants::*;
use crate::pipeline::classifier::{DomainClass, UrlClassification};

/// How a strategy reaches the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    /// Plain GET with document accept headers.
    Direct,
    /// Browser identification, no referrer or credentials. Restricted hosts only.
    RestrictedHeaders,
    /// Third-party mirror from a different origin.
    Relay { template: String },
    /// Distinct relay tried after everything else, restricted hosts only.
    LastResortRelay { template: String },
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::RestrictedHeaders => "restricted_headers",
            StrategyKind::Relay { .. } => "relay",
            StrategyKind::LastResortRelay { .. } => "last_resort_relay",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StrategyKind::Direct => 0,
            StrategyKind::RestrictedHeaders => 1,
            StrategyKind::Relay { .. } => 2,
            StrategyKind::LastResortRelay { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub id: String,
    pub kind: StrategyKind,
}

impl Strategy {
    pub fn direct() -> Self {
        Self {
            id: DIRECT_STRATEGY_ID.to_string(),
            kind: StrategyKind::Direct,
        }
    }

    pub fn restricted_headers() -> Self {
        Self {
            id: RESTRICTED_STRATEGY_ID.to_string(),
            kind: StrategyKind::RestrictedHeaders,
        }
    }

    pub fn relay(relay: &RelayConfig) -> Self {
        Self {
            id: relay.id.clone(),
            kind: StrategyKind::Relay {
                template: relay.template.clone(),
            },
        }
    }

    pub fn last_resort(relay: &RelayConfig) -> Self {
        Self {
            id: relay.id.clone(),
            kind: StrategyKind::LastResortRelay {
                template: relay.template.clone(),
            },
        }
    }

    pub fn applies_to(&self, classification: &UrlClassification) -> bool {
        match self.kind {
            StrategyKind::Direct | StrategyKind::Relay { .. } => true,
            StrategyKind::RestrictedHeaders | StrategyKind::LastResortRelay { .. } => {
                classification.domain_class == DomainClass::Restricted
            }
        }
    }

    /// Relays routinely answer 200 with their own HTML error pages.
    pub fn requires_document_content_type(&self) -> bool {
        matches!(self.kind, StrategyKind::Relay { .. })
    }

    pub fn request_for(
        &self,
        url: &str,
        classification: &UrlClassification,
        user_agent: &str,
    ) -> FetchRequest {
        let accept = if classification.is_likely_pdf {
            DOCUMENT_ACCEPT_HEADER
        } else {
            RESTRICTED_ACCEPT_HEADER
        };
        match &self.kind {
            StrategyKind::Direct => FetchRequest::get(url).header("Accept", accept),
            StrategyKind::RestrictedHeaders => {
                let mut request = FetchRequest::get(url)
                    .header("User-Agent", user_agent)
                    .header("Accept", RESTRICTED_ACCEPT_HEADER)
                    .header("Cache-Control", "no-cache")
                    .header("Pragma", "no-cache");
                request.omit_credentials = true;
                request
            }
            StrategyKind::Relay { template } => {
                FetchRequest::get(expand_template(template, url))
                    .header("Accept", RESTRICTED_ACCEPT_HEADER)
            }
            StrategyKind::LastResortRelay { template } => {
                FetchRequest::get(expand_template(template, url))
                    .header("Accept", "*/*")
                    .header("User-Agent", user_agent)
            }
        }
    }
}

/// Ordered strategy list. Direct access first, then specialized headers,
/// then the relays in priority order, then the last-resort relay.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    strategies: Vec<Strategy>,
    user_agent: String,
}

impl StrategyTable {
    /// Builds a table from an explicit list. The sort is stable, so relays
    /// keep the priority order they were given in.
    pub fn new(mut strategies: Vec<Strategy>, user_agent: impl Into<String>) -> Self {
        strategies.sort_by_key(|s| s.kind.rank());
        Self {
            strategies,
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        let mut strategies = vec![Strategy::direct(), Strategy::restricted_headers()];
        strategies.extend(config.relays.iter().map(Strategy::relay));
        if let Some(last) = &config.last_resort_relay {
            strategies.push(Strategy::last_resort(last));
        }
        Self::new(strategies, config.user_agent.clone())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Strategies that apply to this URL, in execution order.
    pub fn plan(&self, classification: &UrlClassification) -> Vec<&Strategy> {
        self.strategies
            .iter()
            .filter(|s| s.applies_to(classification))
            .collect()
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

pub(crate) fn expand_template(template: &str, url: &str) -> String {
    template
        .replace("{url_encoded}", &encode_component(url))
        .replace("{url}", url)
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub(crate) fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted_pdf() -> UrlClassification {
        UrlClassification {
            is_likely_pdf: true,
            domain_class: DomainClass::Restricted,
        }
    }

    fn open_page() -> UrlClassification {
        UrlClassification {
            is_likely_pdf: false,
            domain_class: DomainClass::Open,
        }
    }

    fn ids<'a>(plan: &[&'a Strategy]) -> Vec<&'a str> {
        plan.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_open_plan_skips_restricted_only_strategies() {
        let table = StrategyTable::default();
        let plan = table.plan(&open_page());
        assert_eq!(
            ids(&plan),
            vec!["direct", "corsproxy", "allorigins_raw", "cors_sh", "cors_anywhere", "crossorigin", "yacdn"]
        );
    }

    #[test]
    fn test_restricted_plan_orders_headers_before_relays_and_last_resort_last() {
        let table = StrategyTable::default();
        let plan = table.plan(&restricted_pdf());
        let ids = ids(&plan);
        assert_eq!(ids.first(), Some(&"direct"));
        assert_eq!(ids.get(1), Some(&"restricted_headers"));
        assert_eq!(ids.last(), Some(&"thingproxy"));
        assert_eq!(ids.len(), DEFAULT_RELAYS.len() + 3);
    }

    #[test]
    fn test_injected_list_is_normalized_into_canonical_order() {
        let table = StrategyTable::new(
            vec![
                Strategy::relay(&RelayConfig::new("b", "https://b/{url}")),
                Strategy::last_resort(&RelayConfig::new("z", "https://z/{url}")),
                Strategy::relay(&RelayConfig::new("a", "https://a/{url}")),
                Strategy::direct(),
            ],
            "agent",
        );
        let all: Vec<&str> = table.strategies().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(all, vec!["direct", "b", "a", "z"]);
    }

    #[test]
    fn test_restricted_request_sets_browser_headers_and_omits_credentials() {
        let request = Strategy::restricted_headers().request_for(
            "https://agency.gov/notice.pdf",
            &restricted_pdf(),
            BROWSER_USER_AGENT,
        );
        assert_eq!(request.url, "https://agency.gov/notice.pdf");
        assert_eq!(request.header_value("user-agent"), Some(BROWSER_USER_AGENT));
        assert_eq!(request.header_value("Cache-Control"), Some("no-cache"));
        assert!(request.omit_credentials);
    }

    #[test]
    fn test_relay_templates_expand_raw_and_encoded() {
        let url = "https://example.com/a b.pdf?x=1&y=2";
        assert_eq!(
            expand_template("https://corsproxy.io/?{url_encoded}", url),
            "https://corsproxy.io/?https%3A%2F%2Fexample.com%2Fa%20b.pdf%3Fx%3D1%26y%3D2"
        );
        assert_eq!(
            expand_template("https://yacdn.org/proxy/{url}", url),
            format!("https://yacdn.org/proxy/{}", url)
        );
    }

    #[test]
    fn test_only_main_relays_require_document_content_type() {
        assert!(!Strategy::direct().requires_document_content_type());
        assert!(Strategy::relay(&RelayConfig::new("r", "https://r/{url}")).requires_document_content_type());
        assert!(!Strategy::last_resort(&RelayConfig::new("l", "https://l/{url}")).requires_document_content_type());
    }
}
