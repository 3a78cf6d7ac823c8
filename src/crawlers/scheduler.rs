use super::frontier::{Frontier, FrontierEntry, Offer};
use crate::config::CloneRequest;
use crate::dom;
use crate::error::{CloneError, FetchError};
use crate::fetchers::{PageFetcher, RenderedPage};
use crate::filter::UrlFilter;
use crate::results::{CloneResult, PageRecord, SnapshotAggregator};
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tokio::time::{Instant, timeout_at};
use url::Url;

/// Where a clone request is in its traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Frontier non-empty and budget remaining
    Pending,
    /// Pages are being rendered and nothing new can be dispatched yet
    Processing,
    /// Frontier drained, budget exhausted, or deadline reached
    Done,
}

/// A rendered page turned into its record plus the links it offers
#[derive(Debug)]
struct PageOutput {
    record: PageRecord,
    links: Vec<Url>,
    final_url: Url,
}

/// A finished page waiting for its turn to feed the frontier
struct Completion {
    depth: usize,
    links: Vec<Url>,
    final_url: Option<Url>,
}

/// Normalize, absolutize, extract and discover for one rendered page
fn snapshot(entry: &FrontierEntry, page: RenderedPage) -> PageOutput {
    let tree = dom::normalize(&page.html);
    let tree = dom::absolutize(&tree, &page.final_url);
    let metadata = dom::extract(&tree, &page.final_url);
    let links = dom::discover(&tree, &page.final_url);

    PageOutput {
        record: PageRecord::new(entry.canonical.clone(), tree.into_markup(), metadata),
        links,
        final_url: page.final_url,
    }
}

/// Fetch and process one frontier entry
async fn process(
    fetcher: Arc<dyn PageFetcher>,
    entry: FrontierEntry,
) -> Result<PageOutput, FetchError> {
    let page = fetcher.fetch(&entry.url).await?;
    catch_unwind(AssertUnwindSafe(|| snapshot(&entry, page))).map_err(|_| {
        ::log::error!("Processing panicked for {}", entry.url);
        FetchError::Driver(format!("failed to process {}", entry.url))
    })
}

/// Drives a clone request breadth-first over a bounded pool of renders.
///
/// The scheduler task is the only owner of the frontier, so the visited-set
/// check-and-insert is never raced. Finished pages feed their links back to
/// the frontier strictly in discovery order, which makes the accepted URL
/// set and the record order identical to a sequential breadth-first run no
/// matter which render finishes first.
pub struct Scheduler {
    fetcher: Arc<dyn PageFetcher>,
    max_concurrency: usize,
    request_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        max_concurrency: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
            request_timeout,
        }
    }

    /// Run a whole clone request to its terminal result
    pub async fn run(&self, request: &CloneRequest, mut filter: UrlFilter) -> CloneResult {
        let deadline = Instant::now() + self.request_timeout;
        let mut frontier = Frontier::new(
            request.seed_url(),
            request.max_pages(),
            request.max_depth(),
        );
        let mut aggregator = SnapshotAggregator::new();
        let mut in_flight: JoinSet<(usize, Result<PageOutput, FetchError>)> = JoinSet::new();
        let mut tasks: HashMap<Id, usize> = HashMap::new();
        let mut dispatched: HashMap<usize, FrontierEntry> = HashMap::new();
        let mut completed: BTreeMap<usize, Completion> = BTreeMap::new();
        let mut next_release = 0;
        let mut phase = Phase::Pending;

        ::log::info!(
            "Cloning {} (max pages {}, max depth {})",
            request.seed_url(),
            request.max_pages(),
            request.max_depth()
        );

        while phase != Phase::Done {
            // Pending -> Processing: fill the worker pool from the frontier
            while in_flight.len() < self.max_concurrency {
                let Some(entry) = frontier.pop() else { break };
                ::log::debug!("Dispatching #{} {} (depth {})", entry.index, entry.url, entry.depth);
                let index = entry.index;
                dispatched.insert(index, entry.clone());
                let fetcher = Arc::clone(&self.fetcher);
                let handle = in_flight.spawn(async move { (index, process(fetcher, entry).await) });
                tasks.insert(handle.id(), index);
            }

            if in_flight.is_empty() {
                phase = Phase::Done;
                continue;
            }
            phase = Phase::Processing;

            let joined = match timeout_at(deadline, in_flight.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => {
                    phase = Phase::Done;
                    continue;
                }
                Err(_) => {
                    ::log::warn!(
                        "Deadline reached for {}, aborting {} in-flight pages",
                        request.seed_url(),
                        in_flight.len()
                    );
                    in_flight.shutdown().await;
                    phase = Phase::Done;
                    continue;
                }
            };

            let (index, outcome) = match joined {
                Ok((index, outcome)) => {
                    tasks.retain(|_, i| *i != index);
                    (index, outcome)
                }
                Err(join_error) => {
                    let Some(index) = tasks.remove(&join_error.id()) else {
                        ::log::error!("Lost track of a page task: {}", join_error);
                        continue;
                    };
                    (index, Err(FetchError::Driver(join_error.to_string())))
                }
            };
            let Some(entry) = dispatched.remove(&index) else {
                continue;
            };

            let completion = match outcome {
                Ok(output) => {
                    ::log::info!("Cloned page #{}: {}", index, output.record.url);
                    aggregator.append(index, output.record);
                    Completion {
                        depth: entry.depth,
                        links: output.links,
                        final_url: Some(output.final_url),
                    }
                }
                Err(error) if index == 0 => {
                    ::log::error!("Seed {} failed: {}", request.seed_url(), error);
                    in_flight.shutdown().await;
                    return Err(CloneError::Fetch(error));
                }
                Err(error) => {
                    ::log::warn!("Skipping {}: {}", entry.url, error);
                    Completion {
                        depth: entry.depth,
                        links: Vec::new(),
                        final_url: None,
                    }
                }
            };
            completed.insert(index, completion);

            // Release finished pages to the frontier in discovery order
            while let Some(done) = completed.remove(&next_release) {
                if let Some(final_url) = &done.final_url {
                    // a redirected seed moves the crawl scope with it
                    if next_release == 0 {
                        filter.allow_origin(final_url);
                    }
                    frontier.mark_visited(final_url);
                }
                enqueue_links(&mut frontier, &filter, &done);
                next_release += 1;
            }

            if !frontier.is_empty() {
                phase = Phase::Pending;
            }
        }

        if !aggregator.is_empty() && !aggregator.contains(0) {
            // pages after the seed are worthless without it
            return Err(CloneError::Timeout);
        }
        if aggregator.is_empty() && Instant::now() >= deadline {
            return Err(CloneError::Timeout);
        }

        ::log::info!(
            "Clone of {} complete: {} pages ({} accepted)",
            request.seed_url(),
            aggregator.len(),
            frontier.accepted()
        );
        aggregator.finalize()
    }
}

fn enqueue_links(frontier: &mut Frontier, filter: &UrlFilter, done: &Completion) {
    for link in &done.links {
        if !filter.should_crawl(link) {
            ::log::debug!("URL filter rejected: {}", link);
            continue;
        }
        match frontier.offer(link, done.depth + 1) {
            Offer::Accepted(index) => ::log::info!("Queuing link #{} for cloning: {}", index, link),
            Offer::AlreadySeen => ::log::trace!("Skipping already queued link: {}", link),
            Offer::TooDeep | Offer::OverBudget => {
                ::log::trace!("Budget exhausted, not queuing {}", link);
                // Every later link gets the same depth and the page budget only shrinks
                return;
            }
        }
    }
}
