use crate::error::CloneError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata derived from a normalized page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// First non-empty `<title>`, or empty
    pub title: String,

    /// `meta[name=description]` content, or empty
    pub description: String,

    /// Absolute favicon URL if one could be determined
    pub favicon: Option<String>,
}

/// Snapshot of one cloned page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical absolute URL of the page
    pub url: String,

    /// Normalized markup with absolutized references
    pub html: String,

    pub title: String,

    pub description: String,

    pub favicon: Option<String>,
}

impl PageRecord {
    /// Create a page record from its URL, markup and extracted metadata
    pub fn new(url: String, html: String, metadata: Metadata) -> Self {
        Self {
            url,
            html,
            title: metadata.title,
            description: metadata.description,
            favicon: metadata.favicon,
        }
    }
}

/// Outcome of a clone request: a non-empty ordered page sequence, seed first
pub type CloneResult = Result<Vec<PageRecord>, CloneError>;

/// Outbound shape of a clone result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CloneResponse {
    Pages { pages: Vec<PageRecord> },
    Failure { error: String },
}

impl From<CloneResult> for CloneResponse {
    fn from(result: CloneResult) -> Self {
        match result {
            Ok(pages) => CloneResponse::Pages { pages },
            Err(e) => CloneResponse::Failure { error: e.reason() },
        }
    }
}

/// Collects finished pages in discovery order.
///
/// Pages are keyed by the discovery index the frontier assigned to their URL,
/// so the final sequence does not depend on which render finished first.
#[derive(Debug, Default)]
pub struct SnapshotAggregator {
    pages: BTreeMap<usize, PageRecord>,
}

impl SnapshotAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished page under its discovery index
    pub fn append(&mut self, index: usize, record: PageRecord) {
        if let Some(previous) = self.pages.insert(index, record) {
            ::log::warn!("Replaced page record at index {}: {}", index, previous.url);
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether the page at `index` has completed
    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains_key(&index)
    }

    /// Produce the terminal result for the request
    pub fn finalize(self) -> CloneResult {
        if self.pages.is_empty() {
            return Err(CloneError::EmptyResult);
        }
        Ok(self.pages.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> PageRecord {
        PageRecord::new(url.to_string(), String::new(), Metadata::default())
    }

    #[test]
    fn test_finalize_empty_is_failure() {
        assert_eq!(
            SnapshotAggregator::new().finalize(),
            Err(CloneError::EmptyResult)
        );
    }

    #[test]
    fn test_finalize_orders_by_discovery_index() {
        let mut aggregator = SnapshotAggregator::new();
        aggregator.append(2, record("https://example.com/b"));
        aggregator.append(0, record("https://example.com/"));
        aggregator.append(1, record("https://example.com/a"));

        let urls: Vec<String> = aggregator
            .finalize()
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/b"
            ]
        );
    }

    #[test]
    fn test_response_shapes() {
        let ok = CloneResponse::from(Ok(vec![record("https://example.com/")]));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["pages"][0]["url"], "https://example.com/");

        let failed = CloneResponse::from(Err(CloneError::EmptyResult));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "no pages could be cloned");
    }

    #[test]
    fn test_record_serializes_with_metadata_fields() {
        let page = PageRecord::new(
            "https://example.com/".to_string(),
            "<html></html>".to_string(),
            Metadata {
                title: "Example".to_string(),
                description: String::new(),
                favicon: None,
            },
        );
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["title"], "Example");
        assert!(json["favicon"].is_null());
    }
}
