use crate::dom::normalize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_document() {
        let doc = normalize(
            "<!DOCTYPE html><html><head><title>Hi</title></head><body><p>Hello</p></body></html>",
        );
        assert!(doc.markup().starts_with("<!DOCTYPE html>"));
        assert!(doc.markup().contains("<p>Hello</p>"));
        assert_eq!(doc.body_len(), 1);
    }

    #[test]
    fn test_unclosed_tags_are_recovered() {
        let doc = normalize("<div><p>one<p>two<span>three");
        let markup = doc.markup();
        assert!(markup.contains("<p>one</p>"));
        assert!(markup.contains("<p>two<span>three</span></p>"));
        assert!(markup.contains("</div>"));
        assert!(doc.recovered_errors() > 0);
    }

    #[test]
    fn test_missing_doctype_and_wrappers() {
        let doc = normalize("<p>bare</p>");
        let markup = doc.markup();
        assert!(markup.contains("<html>"));
        assert!(markup.contains("<head></head>"));
        assert!(markup.contains("<body><p>bare</p></body>"));
    }

    #[test]
    fn test_empty_input_degrades_to_empty_tree() {
        let doc = normalize("");
        assert_eq!(doc.body_len(), 0);
        assert!(doc.markup().contains("<body></body>"));
    }

    #[test]
    fn test_garbage_input_never_fails() {
        let doc = normalize("<<<>>></////><a href=\"x\"<<title>");
        assert!(!doc.markup().is_empty());
    }

    #[test]
    fn test_scripts_and_event_handlers_are_preserved() {
        let doc = normalize(
            r#"<html><head><script src="/app.js"></script><script>window.x = 1;</script></head><body><button onclick="go(state)">Go</button></body></html>"#,
        );
        let markup = doc.markup();
        assert!(markup.contains(r#"<script src="/app.js"></script>"#));
        assert!(markup.contains("<script>window.x = 1;</script>"));
        assert!(markup.contains(r#"onclick="go(state)""#));
    }

    #[test]
    fn test_noscript_fallback_stays_markup() {
        let doc = normalize(
            r#"<html><body><noscript><img src="/ns.png" alt="a &amp; b"></noscript></body></html>"#,
        );
        let markup = doc.markup();
        assert!(
            markup.contains(r#"<noscript><img src="/ns.png" alt="a &amp; b"></noscript>"#),
            "{}",
            markup
        );
        assert!(!markup.contains("&lt;img"));

        // serializing again changes nothing
        assert_eq!(normalize(markup).markup(), markup);
    }
}
