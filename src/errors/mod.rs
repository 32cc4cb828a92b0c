use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedwallError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential for {source_name}: {credential}")]
    MissingCredential {
        source_name: String,
        credential: &'static str,
    },

    // Source errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Source not configured: {0}")]
    SourceNotConfigured(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Parsing errors
    #[error("Feed parsing failed: {0}")]
    FeedParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<url::ParseError> for FeedwallError {
    fn from(err: url::ParseError) -> Self {
        FeedwallError::InvalidUrl(err.to_string())
    }
}

pub type FeedwallResult<T> = Result<T, FeedwallError>;
