// Named defaults for the document pipeline. Every value here can be
// overridden from the TOML config.

// Payload validation
pub const PDF_MIME: &str = "application/pdf";
pub const GENERIC_BINARY_MIME: &str = "application/octet-stream";
pub const DEFAULT_ACCEPTED_MIME_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];
pub const DEFAULT_EXPECTED_SUFFIX: &str = ".pdf";
/// Anything under this is an error page, whatever it claims to be.
pub const DEFAULT_MIN_DOCUMENT_BYTES: u64 = 1_024;
/// A minimal real PDF is usually larger than this.
pub const DEFAULT_SIZE_ACCEPT_BYTES: u64 = 8_000;

// Fetching
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 12;
pub const DOCUMENT_ACCEPT_HEADER: &str = "application/pdf";
pub const RESTRICTED_ACCEPT_HEADER: &str = "application/pdf,*/*";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_RESTRICTED_HOST_LABELS: &[&str] = &["gov", "gouv", "edu", "org", "mil", "int"];

/// Relay templates, tried strictly in this order.
/// `{url}` is replaced by the raw target URL, `{url_encoded}` by its
/// percent-encoded form.
pub const DEFAULT_RELAYS: &[(&str, &str)] = &[
    ("corsproxy", "https://corsproxy.io/?{url_encoded}"),
    ("allorigins_raw", "https://api.allorigins.win/raw?url={url_encoded}"),
    ("cors_sh", "https://proxy.cors.sh/{url}"),
    ("cors_anywhere", "https://cors-anywhere.herokuapp.com/{url}"),
    ("crossorigin", "https://crossorigin.me/{url}"),
    ("yacdn", "https://yacdn.org/proxy/{url}"),
];
pub const DEFAULT_LAST_RESORT_RELAY: (&str, &str) =
    ("thingproxy", "https://thingproxy.freeboard.io/fetch/{url}");
pub const TITLE_RELAY_TEMPLATE: &str = "https://api.allorigins.win/get?url={url_encoded}";

// Strategy ids
pub const DIRECT_STRATEGY_ID: &str = "direct";
pub const RESTRICTED_STRATEGY_ID: &str = "restricted_headers";

// Storage
pub const DEFAULT_BUCKET: &str = "documents2";
pub const DEFAULT_OBJECT_PREFIX: &str = "pdfs";
pub const DEFAULT_CACHE_CONTROL: &str = "3600";
pub const DEFAULT_BUCKET_SIZE_LIMIT_BYTES: u64 = 50_000_000;
pub const DEFAULT_BUCKET_ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/*"];

// Records
pub const DEFAULT_AUTHOR: &str = "Source Web";
pub const REFERENCED_FORMAT: &str = "external_link";
pub const PDF_FORMAT: &str = "pdf";
