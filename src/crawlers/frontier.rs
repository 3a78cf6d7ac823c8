use crate::filter::canonicalize;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL accepted for visiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Discovery index; the seed is 0
    pub index: usize,

    /// URL to load (fragment stripped)
    pub url: Url,

    /// Canonical form, used for dedup and as the page record URL
    pub canonical: String,

    /// Link distance from the seed
    pub depth: usize,
}

/// Why a URL was or was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted(usize),
    AlreadySeen,
    TooDeep,
    OverBudget,
}

/// FIFO queue of pending URLs plus the set of canonical URLs already accepted.
///
/// `offer` is the single check-and-insert point: a canonical URL is accepted
/// at most once, never beyond `max_depth`, and never past `max_pages` total.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    accepted: usize,
    max_pages: usize,
    max_depth: usize,
}

impl Frontier {
    /// Create a frontier holding only the seed
    pub fn new(seed: &Url, max_pages: usize, max_depth: usize) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            accepted: 0,
            max_pages: max_pages.max(1),
            max_depth,
        };
        frontier.offer(seed, 0);
        frontier
    }

    /// Accept `url` at `depth` unless it was seen or a budget forbids it
    pub fn offer(&mut self, url: &Url, depth: usize) -> Offer {
        if depth > self.max_depth {
            return Offer::TooDeep;
        }

        let canonical = canonicalize(url);
        let key = canonical.to_string();
        if self.visited.contains(&key) {
            return Offer::AlreadySeen;
        }
        if self.accepted >= self.max_pages {
            return Offer::OverBudget;
        }

        let mut target = url.clone();
        target.set_fragment(None);

        let index = self.accepted;
        self.accepted += 1;
        self.visited.insert(key.clone());
        self.queue.push_back(FrontierEntry {
            index,
            url: target,
            canonical: key,
            depth,
        });

        Offer::Accepted(index)
    }

    /// Record a URL as seen without queueing it (e.g. a redirect target)
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(canonicalize(url).to_string())
    }

    /// Next URL in breadth-first order
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total URLs ever accepted, including the seed
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn budget_exhausted(&self) -> bool {
        self.accepted >= self.max_pages
    }
}
