pub mod absolutize;
pub mod links;
pub mod metadata;

#[cfg(test)]
mod tests;

use html5ever::serialize::{SerializeOpts, TraversalScope};
use scraper::{Html, Selector};
use std::sync::LazyLock;

pub use absolutize::absolutize;
pub use links::discover;
pub use metadata::extract;

static BODY_CHILDREN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body > *").expect("static selector"));

/// A parsed page: the serialized markup plus a queryable tree built from it.
///
/// Documents are never mutated in place. Every pipeline stage takes a
/// document and returns a new one.
pub struct Document {
    markup: String,
    tree: Html,
}

impl Document {
    /// Parse markup as-is, without re-serializing it
    fn from_markup(markup: String) -> Self {
        let tree = Html::parse_document(&markup);
        Self { markup, tree }
    }

    /// Serialized markup of the document
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn into_markup(self) -> String {
        self.markup
    }

    /// Query the tree with a CSS selector
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> scraper::html::Select<'a, 'b> {
        self.tree.select(selector)
    }

    /// Number of element children of `<body>`; zero for a degraded parse
    pub fn body_len(&self) -> usize {
        self.tree.select(&BODY_CHILDREN).count()
    }

    /// Parse errors the tree builder recovered from
    pub fn recovered_errors(&self) -> usize {
        self.tree.errors.len()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.markup.len())
            .field("recovered_errors", &self.recovered_errors())
            .finish()
    }
}

/// Parse raw markup into a normalized document.
///
/// The HTML5 tree builder recovers from any input (unclosed tags, missing
/// doctype, stray end tags), so this never fails. The markup is re-serialized
/// from the recovered tree. Scripts and inline event handlers are kept.
pub fn normalize(raw_html: &str) -> Document {
    let parsed = Html::parse_document(raw_html);
    if !parsed.errors.is_empty() {
        ::log::debug!(
            "Recovered from {} parse errors while normalizing",
            parsed.errors.len()
        );
    }

    let markup = serialize(&parsed);
    Document {
        markup,
        tree: parsed,
    }
}

/// Serialize with scripting enabled, matching how the tree was parsed, so
/// `<noscript>` content is written back as markup rather than escaped text
fn serialize(tree: &Html) -> String {
    let opts = SerializeOpts {
        scripting_enabled: true,
        traversal_scope: TraversalScope::IncludeNode,
        create_missing_parent: false,
    };

    let mut buf = Vec::new();
    if let Err(e) = html5ever::serialize(&mut buf, tree, opts) {
        ::log::warn!("Serializing normalized tree failed: {}", e);
        return tree.html();
    }
    String::from_utf8(buf).unwrap_or_else(|_| tree.html())
}
