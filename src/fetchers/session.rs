use crate::error::FetchError;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Common local WebDriver endpoints tried when the configured one fails
const FALLBACK_WEBDRIVER_URLS: &[&str] = &[
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // geckodriver / Selenium default
    "http://127.0.0.1:4444",
];

/// A WebDriver session checked out of the pool
pub struct Session {
    id: usize,
    pub client: Client,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Session>,
    /// Every live session, including checked-out ones, for shutdown
    live: HashMap<usize, Client>,
    next_id: usize,
}

/// Browser sessions for one clone request.
///
/// Sessions are created lazily, checked out for a single fetch and returned
/// afterwards. A session that failed is discarded rather than returned.
/// `shutdown` closes every session the pool ever opened.
pub struct SessionPool {
    webdriver_url: String,
    headless: bool,
    state: Mutex<PoolState>,
}

impl SessionPool {
    pub fn new(webdriver_url: impl Into<String>, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            headless,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Take an idle session or open a new one
    pub async fn checkout(&self) -> Result<Session, FetchError> {
        if let Some(session) = self.state.lock().await.idle.pop() {
            ::log::trace!("Reusing browser session {}", session.id);
            return Ok(session);
        }

        let client = self.connect().await?;
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(id, client.clone());
        ::log::debug!("Opened browser session {}", id);

        Ok(Session { id, client })
    }

    /// Return a healthy session for reuse
    pub async fn checkin(&self, session: Session) {
        self.state.lock().await.idle.push(session);
    }

    /// Close a session that can no longer be trusted
    pub async fn discard(&self, session: Session) {
        self.state.lock().await.live.remove(&session.id);
        ::log::warn!("Discarding browser session {}", session.id);
        if let Err(e) = session.client.close().await {
            ::log::debug!("Failed to close session {}: {}", session.id, e);
        }
    }

    /// Close every session opened by this pool
    pub async fn shutdown(&self) {
        let live: Vec<(usize, Client)> = {
            let mut state = self.state.lock().await;
            state.idle.clear();
            state.live.drain().collect()
        };

        for (id, client) in live {
            if let Err(e) = client.close().await {
                ::log::debug!("Failed to close session {}: {}", id, e);
            }
        }
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();
        if self.headless {
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--disable-gpu", "--no-sandbox"] }),
            );
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless"] }),
            );
        }
        caps
    }

    /// Connect to the configured WebDriver, then to common local fallbacks
    async fn connect(&self) -> Result<Client, FetchError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());

        let first_error = match builder.connect(&self.webdriver_url).await {
            Ok(client) => return Ok(client),
            Err(e) => e.to_string(),
        };
        ::log::error!(
            "Failed to connect to WebDriver at {}: {}",
            self.webdriver_url,
            first_error
        );

        for url in FALLBACK_WEBDRIVER_URLS {
            if *url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = builder.connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(FetchError::Driver(format!(
            "no WebDriver reachable at {}: {}",
            self.webdriver_url, first_error
        )))
    }
}
