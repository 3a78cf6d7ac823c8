#[cfg(test)]
pub mod fake;
pub mod session;
pub mod web;

use crate::error::FetchError;
use async_trait::async_trait;
use url::Url;

pub use session::SessionPool;
pub use web::WebDriverFetcher;

/// A page as the browser engine materialized it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Serialized DOM after client-side rendering settled
    pub html: String,

    /// URL the browser ended up on after redirects
    pub final_url: Url,
}

/// Retrieves rendered pages. The only seam between the pipeline and a
/// rendering backend.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url` and return its rendered DOM
    async fn fetch(&self, url: &Url) -> Result<RenderedPage, FetchError>;

    /// Release every resource held for the current request
    async fn shutdown(&self) {}
}
