use super::Document;
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, text};
use url::Url;

/// URL-bearing element/attribute pairs rewritten to absolute form
pub const URL_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("link", "href"),
    ("img", "src"),
    ("script", "src"),
    ("source", "src"),
    ("iframe", "src"),
];

/// Resolve one attribute value against `base`.
///
/// Returns `None` when the value must be left untouched: empty values,
/// fragment-only references, anything that is already an absolute URL
/// (including `data:`, `mailto:` and `javascript:`) and values that cannot
/// be resolved at all.
pub fn resolve_reference(value: &str, base: &Url) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if Url::parse(trimmed).is_ok() {
        return None;
    }

    match base.join(trimmed) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(e) => {
            ::log::trace!("Leaving unresolvable reference {:?}: {}", value, e);
            None
        }
    }
}

/// Rewrite every relative reference in `doc` to an absolute URL.
///
/// Only attributes that actually change are touched, so the untouched
/// markup passes through byte for byte and applying this twice with the
/// same base changes nothing the second time.
pub fn absolutize(doc: &Document, base: &Url) -> Document {
    match rewrite_references(doc.markup(), base) {
        Ok(markup) => Document::from_markup(markup),
        Err(e) => {
            ::log::warn!("Reference rewriting failed for {}, keeping markup: {}", base, e);
            Document::from_markup(doc.markup().to_string())
        }
    }
}

fn rewrite_references(markup: &str, base: &Url) -> Result<String, RewriteFailure> {
    let mut output = Vec::with_capacity(markup.len());

    let mut handlers: Vec<_> = URL_ATTRIBUTES
        .iter()
        .map(|(tag, attr)| {
            let selector = format!("{}[{}]", tag, attr);
            let attr = *attr;
            element!(selector, move |el| {
                if let Some(value) = el.get_attribute(attr) {
                    if let Some(absolute) = resolve_reference(&value, base) {
                        el.set_attribute(attr, &absolute)?;
                    }
                }
                Ok(())
            })
        })
        .collect();

    // <noscript> is raw text to the rewriter; its fallback markup is
    // rewritten on its own once the whole text node has been seen
    let mut fallback = String::new();
    handlers.push(text!("noscript", move |chunk| {
        fallback.push_str(chunk.as_str());
        if chunk.last_in_text_node() {
            let inner = std::mem::take(&mut fallback);
            let rewritten = rewrite_references(&inner, base).unwrap_or(inner);
            chunk.replace(&rewritten, ContentType::Html);
        } else {
            chunk.remove();
        }
        Ok(())
    }));

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter.write(markup.as_bytes())?;
    rewriter.end()?;

    Ok(String::from_utf8(output)?)
}

#[derive(Debug, thiserror::Error)]
enum RewriteFailure {
    #[error(transparent)]
    Rewriting(#[from] RewritingError),

    #[error("rewritten markup is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[test]
    fn test_resolve_reference() {
        let base = base();
        assert_eq!(
            resolve_reference("/logo.png", &base).as_deref(),
            Some("https://example.com/logo.png")
        );
        assert_eq!(
            resolve_reference("img/a.png", &base).as_deref(),
            Some("https://example.com/blog/img/a.png")
        );
        assert_eq!(
            resolve_reference("../up", &base).as_deref(),
            Some("https://example.com/up")
        );
        assert_eq!(
            resolve_reference("//cdn.example.net/lib.js", &base).as_deref(),
            Some("https://cdn.example.net/lib.js")
        );
        assert_eq!(
            resolve_reference("?page=2", &base).as_deref(),
            Some("https://example.com/blog/post?page=2")
        );
    }

    #[test]
    fn test_resolve_reference_leaves_non_network_values() {
        let base = base();
        for value in [
            "",
            "   ",
            "#top",
            "https://other.org/x",
            "http://other.org/x",
            "mailto:hi@example.com",
            "data:image/png;base64,AAAA",
            "javascript:void(0)",
            "tel:+15555555",
        ] {
            assert_eq!(resolve_reference(value, &base), None, "{:?}", value);
        }
    }

    #[test]
    fn test_leaves_unresolvable_values() {
        // A relative reference cannot be resolved against a cannot-be-a-base URL
        let opaque = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(resolve_reference("page.html", &opaque), None);
    }
}
