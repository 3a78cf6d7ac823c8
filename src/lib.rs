pub mod config;
pub mod crawlers;
pub mod dom;
pub mod error;
pub mod fetchers;
pub mod filter;
pub mod results;

// Re-export commonly used types for convenience
pub use config::{CloneConfig, CloneInput, CloneRequest};
pub use error::{CloneError, ConfigError, FetchError};
pub use fetchers::{PageFetcher, RenderedPage, WebDriverFetcher};
pub use results::{CloneResponse, CloneResult, PageRecord};

use crawlers::Scheduler;
use filter::UrlFilter;
use std::sync::Arc;

/// Main builder for cloning a site from a seed URL
pub struct SiteCloner {
    config: CloneConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl Default for SiteCloner {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteCloner {
    /// Create a cloner with default configuration and environment overrides
    pub fn new() -> Self {
        Self {
            config: CloneConfig::default().with_env_overrides(),
            fetcher: None,
        }
    }

    /// Replace the whole configuration, rejecting invalid URL patterns
    pub fn with_config(mut self, config: CloneConfig) -> Result<Self, ConfigError> {
        for pattern in config.include_patterns.iter().chain(&config.exclude_patterns) {
            regex::Regex::new(pattern)?;
        }
        self.config = config;
        Ok(self)
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = CloneConfig::from_file(path)?.with_env_overrides();
        self.with_config(config)
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self, ConfigError> {
        let config = CloneConfig::from_json(config_str)?.with_env_overrides();
        self.with_config(config)
    }

    /// Set the maximum number of pages rendered at the same time
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    /// Set the deadline for a whole clone request
    pub fn with_request_timeout(mut self, timeout_seconds: u64) -> Self {
        self.config.request_timeout_secs = timeout_seconds;
        self
    }

    pub fn with_webdriver_url(mut self, webdriver_url: impl Into<String>) -> Self {
        self.config.webdriver_url = webdriver_url.into();
        self
    }

    /// Render pages with `fetcher` instead of a WebDriver browser
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn config(&self) -> &CloneConfig {
        &self.config
    }

    /// Clone the site behind `url`, seed page first
    pub async fn clone_site(
        &self,
        url: &str,
        max_pages: Option<usize>,
        max_depth: Option<usize>,
    ) -> CloneResult {
        let request = CloneRequest::new(url, max_pages, max_depth, &self.config)?;
        self.run(&request).await
    }

    /// Handle an inbound request and shape the outcome for the caller
    pub async fn handle(&self, input: &CloneInput) -> CloneResponse {
        let result = match CloneRequest::from_input(input, &self.config) {
            Ok(request) => self.run(&request).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            ::log::warn!("Clone of {} failed: {}", input.url, e);
        }
        CloneResponse::from(result)
    }

    /// Run a validated request to its terminal result
    pub async fn run(&self, request: &CloneRequest) -> CloneResult {
        let filter = UrlFilter::from_config(request.seed_url(), &self.config)
            .map_err(|e| CloneError::Config(ConfigError::Pattern(e).to_string()))?;

        // Each request gets its own sessions unless a backend was supplied
        let fetcher: Arc<dyn PageFetcher> = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(WebDriverFetcher::from_config(&self.config)),
        };

        let scheduler = Scheduler::new(
            Arc::clone(&fetcher),
            self.config.max_concurrency,
            self.config.request_timeout(),
        );
        let result = scheduler.run(request, filter).await;
        fetcher.shutdown().await;
        result
    }
}
