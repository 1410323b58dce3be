use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelkitError>;

#[derive(Debug, Error)]
pub enum SelkitError {
    #[error("{0}")]
    Fetch(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Attribute selector the explainer cannot split into `attr=value`.
    #[error("Malformed selector '{0}': attribute selectors must have the form [attr=value]")]
    MalformedSelector(String),

    #[error("Could not fetch content")]
    EmptyContent,

    #[error("Invalid spider name")]
    InvalidSpiderName,

    #[error("Spider not found: {0}")]
    SpiderNotFound(String),

    #[error("Failed to run crawler '{program}': {reason}")]
    CrawlLaunch { program: String, reason: String },

    /// A blocking worker panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SelkitError {
    fn from(err: reqwest::Error) -> Self {
        SelkitError::Fetch(err.to_string())
    }
}
