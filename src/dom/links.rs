use super::Document;
use crate::filter::{canonicalize, is_http, same_origin};
use scraper::Selector;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Collect same-origin page links from a document.
///
/// Links come back as written minus the fragment, deduplicated by canonical
/// form and in document order of their first occurrence. Fragment-only and
/// non-HTTP(S) links are skipped.
pub fn discover(doc: &Document, base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in doc.select(&ANCHORS).filter_map(|el| el.value().attr("href")) {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let Ok(resolved) = base.join(href) else {
            ::log::trace!("Skipping unresolvable link {:?}", href);
            continue;
        };
        if !is_http(&resolved) || !same_origin(&resolved, base) {
            continue;
        }

        let mut target = resolved;
        target.set_fragment(None);
        if seen.insert(canonicalize(&target).to_string()) {
            links.push(target);
        }
    }

    ::log::debug!("Discovered {} same-origin links on {}", links.len(), base);
    links
}
