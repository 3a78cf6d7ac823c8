use crate::config::CloneConfig;
use regex::Regex;
use url::Url;

/// Canonical form of a URL used as the equality basis for deduplication.
///
/// Drops the fragment and any trailing slashes on non-root paths. Host
/// lowercasing and default-port removal come from the URL parser itself.
pub fn canonicalize(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let path = canonical.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        canonical.set_path(&trimmed);
    }

    canonical
}

/// Whether two URLs share scheme and host
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str()
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Decides which discovered links the crawl may follow
#[derive(Debug)]
pub struct UrlFilter {
    origins: Vec<Url>,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a filter scoped to the origin of `seed`
    pub fn new(
        seed: &Url,
        include_patterns: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let include_regexes = include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origins: vec![seed.clone()],
            include_regexes,
            exclude_regexes,
        })
    }

    pub fn from_config(seed: &Url, config: &CloneConfig) -> Result<Self, regex::Error> {
        Self::new(seed, &config.include_patterns, &config.exclude_patterns)
    }

    /// Also accept links on the origin of `url`
    pub fn allow_origin(&mut self, url: &Url) {
        if !self.origins.iter().any(|origin| same_origin(url, origin)) {
            ::log::info!("Extending crawl scope to {}://{}", url.scheme(), url.host_str().unwrap_or_default());
            self.origins.push(url.clone());
        }
    }

    /// Determine if a URL should be crawled based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !is_http(url) || !self.origins.iter().any(|origin| same_origin(url, origin)) {
            return false;
        }

        // Exclusions take precedence over inclusions
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|re| re.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|re| re.is_match(url_str))
    }
}
