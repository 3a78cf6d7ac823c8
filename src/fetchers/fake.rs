use super::{PageFetcher, RenderedPage};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

enum Reply {
    Page(RenderedPage),
    Fail(FetchError),
    Panic,
}

struct Route {
    reply: Reply,
    delay: Duration,
}

/// In-memory fetcher serving canned pages by URL
#[derive(Default)]
pub struct FakeFetcher {
    routes: HashMap<String, Route>,
    fetched: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
}

fn key(url: &str) -> String {
    Url::parse(url).unwrap().to_string()
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.redirect(url, url, html)
    }

    /// Serve `html` for `url` as if the browser ended up on `final_url`
    pub fn redirect(mut self, url: &str, final_url: &str, html: &str) -> Self {
        let page = RenderedPage {
            html: html.to_string(),
            final_url: Url::parse(final_url).unwrap(),
        };
        self.routes.insert(
            key(url),
            Route {
                reply: Reply::Page(page),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, error: FetchError) -> Self {
        self.routes.insert(
            key(url),
            Route {
                reply: Reply::Fail(error),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.routes.insert(
            key(url),
            Route {
                reply: Reply::Panic,
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Hold back the reply for an already registered URL
    pub fn delayed(mut self, url: &str, delay: Duration) -> Self {
        if let Some(route) = self.routes.get_mut(&key(url)) {
            route.delay = delay;
        }
        self
    }

    /// URLs requested so far, in request order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<RenderedPage, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());

        let Some(route) = self.routes.get(url.as_str()) else {
            return Err(FetchError::Network(format!("no route to {}", url)));
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        match &route.reply {
            Reply::Page(page) => Ok(page.clone()),
            Reply::Fail(error) => Err(error.clone()),
            Reply::Panic => panic!("renderer crashed on {}", url),
        }
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
