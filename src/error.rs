use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch file error: {0}")]
    Batch(#[from] toml::de::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Failed to load {url} after {attempts} attempt(s): {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: NavigationError,
    },

    #[error("Page blocked at {0}")]
    Blocked(String),

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Cannot prepare output directory {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl ScrapeError {
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single page load attempt.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("page not ready after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Driver(String),
}

impl NavigationError {
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }
}

/// Failure of a single download attempt.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("not an allowed media type: {0}")]
    NonImageContent(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("received an empty body")]
    EmptyBody,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::EmptyBody)
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::HttpStatus(status.as_u16()),
            None => Self::Network(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
