use thiserror::Error;

/// Fatal, run-scoped failures. Anything here aborts the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} did not return HTML (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a listing row could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("row has no detail-page link")]
    MissingKey,

    #[error("detail-page link has an empty identifier")]
    EmptyKey,

    #[error("row has no vessel name")]
    MissingName,
}
