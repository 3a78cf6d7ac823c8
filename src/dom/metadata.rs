use super::Document;
use crate::results::Metadata;
use scraper::Selector;
use std::sync::LazyLock;
use url::Url;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static META_NAMED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name]").expect("static selector"));
static LINK_REL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("static selector"));

/// Derive title, description and favicon from a document.
///
/// Never fails: anything missing comes back empty (or `None` for the favicon).
pub fn extract(doc: &Document, page_url: &Url) -> Metadata {
    Metadata {
        title: title(doc),
        description: description(doc),
        favicon: favicon(doc, page_url),
    }
}

fn title(doc: &Document) -> String {
    doc.select(&TITLE)
        .map(|el| el.text().collect::<String>())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn description(doc: &Document) -> String {
    doc.select(&META_NAMED)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// First resolvable `link[rel~=icon]`, else `/favicon.ico` on the page's origin
fn favicon(doc: &Document, page_url: &Url) -> Option<String> {
    let declared = doc
        .select(&LINK_REL)
        .filter(|el| {
            el.value().attr("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("icon"))
            })
        })
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .find_map(|href| match page_url.join(href) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                ::log::debug!("Ignoring unresolvable favicon {:?}: {}", href, e);
                None
            }
        });
    if declared.is_some() {
        return declared;
    }

    if !matches!(page_url.scheme(), "http" | "https") {
        return None;
    }
    page_url.join("/favicon.ico").ok().map(|u| u.to_string())
}
