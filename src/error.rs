use std::time::Duration;
use thiserror::Error;

/// Failure of a single page fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The page did not settle before the page timeout
    #[error("timed out after {0:?} waiting for the page to settle")]
    Timeout(Duration),

    /// DNS, connection or TLS failure
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx terminal status
    #[error("server responded with HTTP {status}")]
    Http { status: u16 },

    /// The site refused automated rendering (bot wall, redirect loop)
    #[error("page blocked automated rendering: {0}")]
    Blocked(String),

    /// The browser engine itself failed or could not be reached
    #[error("browser session error: {0}")]
    Driver(String),
}

impl FetchError {
    /// Whether the failure came from the rendering session rather than the site
    pub fn is_session_failure(&self) -> bool {
        matches!(self, FetchError::Driver(_))
    }
}

/// Terminal failure of a whole clone request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloneError {
    /// The seed URL was rejected before anything was fetched
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The seed page could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The request deadline expired before the seed page completed
    #[error("clone request deadline expired before the seed page completed")]
    Timeout,

    /// The traversal finished without producing a single page
    #[error("no pages could be cloned")]
    EmptyResult,

    /// The cloner's configuration cannot be used for a request
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloneError {
    /// A single human-readable reason suitable for the caller
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Failure to load a clone configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_fetch_failure_reason_is_single_line() {
        let err = CloneError::from(FetchError::Http { status: 404 });
        assert_eq!(err.reason(), "server responded with HTTP 404");
        assert!(!err.reason().contains('\n'));
    }

    #[test]
    fn test_session_failure_classification() {
        assert!(FetchError::Driver("lost session".into()).is_session_failure());
        assert!(!FetchError::Timeout(Duration::from_secs(1)).is_session_failure());
        assert!(!FetchError::Http { status: 500 }.is_session_failure());
    }
}
