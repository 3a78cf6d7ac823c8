use crate::error::{CloneError, ConfigError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Configuration shared by every clone request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Maximum number of pages rendered at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Page budget used when a request does not set one
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Depth budget used when a request does not set one
    #[serde(default)]
    pub max_depth: usize,

    /// How long the network must stay quiet before a page counts as rendered
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Upper bound for loading and settling a single page
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Deadline for the whole clone request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Regex patterns a discovered link must match (empty means all)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns that exclude a discovered link from traversal
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    3
}

fn default_max_pages() -> usize {
    1
}

fn default_quiet_period_ms() -> u64 {
    500
}

fn default_page_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Static assets are referenced by pages, never traversed as pages
fn default_exclude_patterns() -> Vec<String> {
    vec![r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip|mp4|mp3)$".to_string()]
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            max_concurrency: default_max_concurrency(),
            max_pages: default_max_pages(),
            max_depth: 0,
            quiet_period_ms: default_quiet_period_ms(),
            page_timeout_secs: default_page_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl CloneConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Override the WebDriver URL with the WEBDRIVER_URL environment variable if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Inbound clone request as a client sends it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneInput {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// One traversal: the seed and its budgets. Immutable once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    seed_url: Url,
    max_pages: usize,
    max_depth: usize,
}

impl CloneRequest {
    /// Validate the seed URL and fill unset budgets from the configuration.
    ///
    /// The seed must be an absolute `http` or `https` URL with a host. A page
    /// budget of zero still allows the seed itself to be cloned.
    pub fn new(
        url: &str,
        max_pages: Option<usize>,
        max_depth: Option<usize>,
        config: &CloneConfig,
    ) -> Result<Self, CloneError> {
        let seed_url = Url::parse(url.trim())
            .map_err(|e| CloneError::InvalidInput(format!("{}: {}", url, e)))?;

        if !matches!(seed_url.scheme(), "http" | "https") {
            return Err(CloneError::InvalidInput(format!(
                "{}: only http and https URLs can be cloned",
                url
            )));
        }
        if seed_url.host_str().is_none_or(str::is_empty) {
            return Err(CloneError::InvalidInput(format!("{}: missing host", url)));
        }

        Ok(Self {
            seed_url,
            max_pages: max_pages.unwrap_or(config.max_pages).max(1),
            max_depth: max_depth.unwrap_or(config.max_depth),
        })
    }

    pub fn from_input(input: &CloneInput, config: &CloneConfig) -> Result<Self, CloneError> {
        Self::new(&input.url, input.max_pages, input.max_depth, config)
    }

    pub fn seed_url(&self) -> &Url {
        &self.seed_url
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
