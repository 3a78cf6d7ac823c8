use super::session::{Session, SessionPool};
use super::{PageFetcher, RenderedPage};
use crate::config::CloneConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use fantoccini::Client;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use url::Url;

/// Interval between render-settle probes
const SETTLE_POLL: Duration = Duration::from_millis(100);

/// Document state and network activity, probed during render-settle
const SETTLE_PROBE: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

/// Status of the main document, when the browser exposes it
const STATUS_PROBE: &str = "const nav = performance.getEntriesByType('navigation')[0]; \
     return nav && typeof nav.responseStatus === 'number' ? nav.responseStatus : null;";

/// Lowercased title fragments of well-known bot walls
const CHALLENGE_TITLES: &[&str] = &[
    "just a moment...",
    "attention required! | cloudflare",
    "are you a robot",
    "access denied",
    "pardon our interruption",
];

const NETWORK_ERROR_MARKERS: &[&str] = &[
    "net::ERR_",
    "NS_ERROR_",
    "dnsNotFound",
    "connectionFailure",
    "nssFailure",
];

/// Fetches pages through a WebDriver-controlled browser
pub struct WebDriverFetcher {
    pool: SessionPool,
    quiet_period: Duration,
    page_timeout: Duration,
}

impl WebDriverFetcher {
    pub fn new(pool: SessionPool, quiet_period: Duration, page_timeout: Duration) -> Self {
        Self {
            pool,
            quiet_period,
            page_timeout,
        }
    }

    /// Build a fetcher with a fresh session pool from configuration
    pub fn from_config(config: &CloneConfig) -> Self {
        Self::new(
            SessionPool::new(config.webdriver_url.clone(), config.headless),
            config.quiet_period(),
            config.page_timeout(),
        )
    }

    /// One attempt on one session, bounded by the page timeout
    async fn attempt(&self, session: &Session, url: &Url) -> Result<RenderedPage, FetchError> {
        match timeout(self.page_timeout, self.render(&session.client, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.page_timeout)),
        }
    }

    async fn render(&self, client: &Client, url: &Url) -> Result<RenderedPage, FetchError> {
        let started = Instant::now();

        client
            .goto(url.as_str())
            .await
            .map_err(|e| classify_error(&e.to_string(), self.page_timeout))?;

        self.wait_for_settle(client).await?;

        let title = client.title().await.unwrap_or_default();
        if is_challenge_title(&title) {
            return Err(FetchError::Blocked(format!("challenge page {:?}", title)));
        }

        if let Some(status) = self.response_status(client).await {
            if !(200..300).contains(&status) {
                return Err(FetchError::Http { status });
            }
        }

        let html = client
            .source()
            .await
            .map_err(|e| classify_error(&e.to_string(), self.page_timeout))?;
        let final_url = client
            .current_url()
            .await
            .map_err(|e| classify_error(&e.to_string(), self.page_timeout))?;

        ::log::debug!(
            "Rendered {} ({} bytes) in {:.2} seconds",
            final_url,
            html.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(RenderedPage { html, final_url })
    }

    /// Wait until the document is complete and no new resources were
    /// requested for the quiet period
    async fn wait_for_settle(&self, client: &Client) -> Result<(), FetchError> {
        let mut tracker = SettleTracker::new(self.quiet_period, Instant::now());

        loop {
            let probe = client
                .execute(SETTLE_PROBE, Vec::new())
                .await
                .map_err(|e| classify_error(&e.to_string(), self.page_timeout))?;

            let complete = probe[0].as_str() == Some("complete");
            if tracker.observe(complete, probe[1].as_u64(), Instant::now()) {
                return Ok(());
            }

            sleep(SETTLE_POLL).await;
        }
    }

    async fn response_status(&self, client: &Client) -> Option<u16> {
        match client.execute(STATUS_PROBE, Vec::new()).await {
            Ok(value) => value
                .as_u64()
                .and_then(|status| u16::try_from(status).ok())
                .filter(|status| *status != 0),
            Err(e) => {
                ::log::trace!("Navigation status unavailable: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn fetch(&self, url: &Url) -> Result<RenderedPage, FetchError> {
        ::log::debug!("FETCH: {}", url);

        let mut retried = false;
        loop {
            let session = self.pool.checkout().await?;
            let result = self.attempt(&session, url).await;

            match disposition(&result, retried) {
                Disposition::Checkin => {
                    self.pool.checkin(session).await;
                    return result;
                }
                Disposition::Discard => {
                    self.pool.discard(session).await;
                    return result;
                }
                Disposition::DiscardAndRetry => {
                    self.pool.discard(session).await;
                    if let Err(e) = &result {
                        ::log::warn!("Lost browser session while fetching {}, retrying: {}", url, e);
                    }
                    retried = true;
                }
            }
        }
    }

    async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// What happens to a session after one fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Healthy session goes back to the pool; the result is final
    Checkin,
    /// Session is closed; the result is final
    Discard,
    /// Session is closed and the fetch runs again on a fresh one
    DiscardAndRetry,
}

/// A crashed session gets one retry on a fresh session. A timed-out
/// session may still be loading, so it is never handed to the next fetch.
pub fn disposition(result: &Result<RenderedPage, FetchError>, retried: bool) -> Disposition {
    match result {
        Err(e) if e.is_session_failure() && !retried => Disposition::DiscardAndRetry,
        Err(e) if e.is_session_failure() => Disposition::Discard,
        Err(FetchError::Timeout(_)) => Disposition::Discard,
        _ => Disposition::Checkin,
    }
}

/// Tracks render-settle probes: settled once the document is complete and
/// the resource count has held still for the quiet period
#[derive(Debug)]
pub struct SettleTracker {
    quiet_period: Duration,
    last_count: Option<u64>,
    quiet_since: Instant,
}

impl SettleTracker {
    pub fn new(quiet_period: Duration, now: Instant) -> Self {
        Self {
            quiet_period,
            last_count: None,
            quiet_since: now,
        }
    }

    /// Record one probe and report whether the page has settled
    pub fn observe(&mut self, complete: bool, count: Option<u64>, now: Instant) -> bool {
        if !complete || count != self.last_count {
            self.last_count = count;
            self.quiet_since = now;
            return false;
        }
        now.duration_since(self.quiet_since) >= self.quiet_period
    }
}

/// Map a WebDriver error message onto the fetch error taxonomy
pub fn classify_error(message: &str, page_timeout: Duration) -> FetchError {
    if message.contains("ERR_TOO_MANY_REDIRECTS") || message.contains("redirectLoop") {
        return FetchError::Blocked(message.to_string());
    }
    if message.contains("ERR_TIMED_OUT") || message.to_ascii_lowercase().contains("timeout") {
        return FetchError::Timeout(page_timeout);
    }
    if NETWORK_ERROR_MARKERS.iter().any(|m| message.contains(m)) {
        return FetchError::Network(message.to_string());
    }
    // lost sessions, unreachable drivers and anything else the browser reports
    FetchError::Driver(message.to_string())
}

/// Whether a page title identifies a bot-detection interstitial
pub fn is_challenge_title(title: &str) -> bool {
    let title = title.trim().to_ascii_lowercase();
    CHALLENGE_TITLES.iter().any(|t| title.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(15);

    #[test]
    fn test_classify_network_errors() {
        for message in [
            "unknown error: net::ERR_NAME_NOT_RESOLVED",
            "unknown error: net::ERR_CONNECTION_REFUSED",
            "unknown error: net::ERR_CERT_AUTHORITY_INVALID",
            "Reached error page: about:neterror?e=dnsNotFound",
            "NS_ERROR_UNKNOWN_HOST",
        ] {
            assert!(
                matches!(classify_error(message, LIMIT), FetchError::Network(_)),
                "{}",
                message
            );
        }
    }

    #[test]
    fn test_classify_redirect_loop_as_blocked() {
        assert!(matches!(
            classify_error("unknown error: net::ERR_TOO_MANY_REDIRECTS", LIMIT),
            FetchError::Blocked(_)
        ));
    }

    #[test]
    fn test_classify_timeouts() {
        assert_eq!(
            classify_error("timeout: Timed out receiving message from renderer", LIMIT),
            FetchError::Timeout(LIMIT)
        );
        assert_eq!(
            classify_error("unknown error: net::ERR_TIMED_OUT", LIMIT),
            FetchError::Timeout(LIMIT)
        );
    }

    #[test]
    fn test_classify_session_errors() {
        assert!(classify_error("invalid session id", LIMIT).is_session_failure());
        assert!(classify_error("webdriver went away", LIMIT).is_session_failure());
    }

    fn page() -> Result<RenderedPage, FetchError> {
        Ok(RenderedPage {
            html: "<html></html>".to_string(),
            final_url: Url::parse("https://example.com/").unwrap(),
        })
    }

    #[test]
    fn test_successful_session_is_checked_in() {
        assert_eq!(disposition(&page(), false), Disposition::Checkin);
        assert_eq!(disposition(&page(), true), Disposition::Checkin);
    }

    #[test]
    fn test_lost_session_is_retried_once() {
        let lost = Err(FetchError::Driver("invalid session id".into()));
        assert_eq!(disposition(&lost, false), Disposition::DiscardAndRetry);
        assert_eq!(disposition(&lost, true), Disposition::Discard);
    }

    #[test]
    fn test_timed_out_session_is_discarded() {
        let timed_out = Err(FetchError::Timeout(LIMIT));
        assert_eq!(disposition(&timed_out, false), Disposition::Discard);
    }

    #[test]
    fn test_site_failures_keep_the_session() {
        for error in [
            FetchError::Http { status: 404 },
            FetchError::Network("net::ERR_NAME_NOT_RESOLVED".into()),
            FetchError::Blocked("challenge page".into()),
        ] {
            assert_eq!(disposition(&Err(error.clone()), false), Disposition::Checkin, "{}", error);
        }
    }

    #[test]
    fn test_settle_waits_for_quiet_period() {
        let quiet = Duration::from_millis(500);
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);
        let mut tracker = SettleTracker::new(quiet, start);

        // still loading
        assert!(!tracker.observe(false, Some(3), at(100)));
        // complete, but resources are still arriving
        assert!(!tracker.observe(true, Some(5), at(200)));
        assert!(!tracker.observe(true, Some(5), at(600)));
        assert!(!tracker.observe(true, Some(6), at(650)));
        assert!(!tracker.observe(true, Some(6), at(1100)));
        assert!(tracker.observe(true, Some(6), at(1150)));
    }

    #[test]
    fn test_settle_restarts_when_document_reloads() {
        let quiet = Duration::from_millis(200);
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);
        let mut tracker = SettleTracker::new(quiet, start);

        assert!(!tracker.observe(true, Some(2), at(0)));
        assert!(!tracker.observe(false, Some(2), at(150)));
        assert!(!tracker.observe(true, Some(2), at(300)));
        assert!(tracker.observe(true, Some(2), at(350)));
    }

    #[test]
    fn test_challenge_titles() {
        assert!(is_challenge_title("Just a moment..."));
        assert!(is_challenge_title("  Attention Required! | Cloudflare "));
        assert!(!is_challenge_title("Example Domain"));
        assert!(!is_challenge_title(""));
    }
}
