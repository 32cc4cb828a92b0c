//! HTML helpers shared by the adapters.

use scraper::Html;

/// Decode entities in a text field. Anything that looks like markup is
/// kept verbatim: `Vec&lt;String&gt;` becomes `Vec<String>`.
pub fn decode(text: &str) -> String {
    if !text.contains('&') {
        return text.trim().to_string();
    }

    // Escaped so the parser only ever sees a text node
    let escaped = text.replace('<', "&lt;");
    let fragment = Html::parse_fragment(&escaped);
    let decoded: String = fragment.root_element().text().collect();

    decoded.trim().to_string()
}

/// Extract plain text from HTML content, preserving word boundaries
pub fn to_text(html: &str) -> String {
    let document = Html::parse_fragment(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        if let Some(text_node) = node.value().as_text() {
            text.push_str(text_node);
        }
        // Add space after block elements to preserve word boundaries
        if let Some(element) = node.value().as_element() {
            match element.name() {
                "p" | "br" | "div" | "li" => text.push(' '),
                _ => {}
            }
        }
    }

    // Collapse whitespace and trim
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate text to a reasonable length for a title
pub fn truncate_for_title(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();

    // Try to break at a word boundary
    match cut.rfind(' ') {
        Some(pos) => format!("{}...", &cut[..pos]),
        None => format!("{}...", cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode("&quot;quoted&quot;"), "\"quoted\"");
    }

    #[test]
    fn test_decode_plain_text_untouched() {
        assert_eq!(decode("  Plain title "), "Plain title");
    }

    #[test]
    fn test_decode_keeps_escaped_angle_brackets() {
        assert_eq!(decode("Using Vec&lt;String&gt; in Rust"), "Using Vec<String> in Rust");
        assert_eq!(decode("<b>not markup</b> &amp; more"), "<b>not markup</b> & more");
    }

    #[test]
    fn test_decode_angle_brackets_without_entities_untouched() {
        assert_eq!(decode("Using Vec<String> in Rust"), "Using Vec<String> in Rust");
        assert_eq!(decode("I <3 Rust"), "I <3 Rust");
    }

    #[test]
    fn test_to_text_simple() {
        assert_eq!(to_text("<p>Hello world</p>"), "Hello world");
    }

    #[test]
    fn test_to_text_with_links() {
        let html = r#"<p>Check out <a href="https://example.com">this link</a>!</p>"#;
        assert_eq!(to_text(html), "Check out this link!");
    }

    #[test]
    fn test_to_text_multiple_paragraphs() {
        let html = "<p>First paragraph</p><p>Second paragraph</p>";
        assert_eq!(to_text(html), "First paragraph Second paragraph");
    }

    #[test]
    fn test_to_text_with_hashtags() {
        let html = r#"<p>Post content <a href="https://mastodon.social/tags/test" class="mention hashtag">#<span>test</span></a></p>"#;
        assert_eq!(to_text(html), "Post content #test");
    }

    #[test]
    fn test_to_text_decodes_entities() {
        assert_eq!(to_text("<p>R&amp;D &lt;news&gt;</p>"), "R&D <news>");
    }

    #[test]
    fn test_to_text_empty() {
        assert_eq!(to_text(""), "");
    }

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate_for_title("Short text", 50), "Short text");
    }

    #[test]
    fn test_truncate_long_text() {
        let text = "This is a very long text that should be truncated at a word boundary";
        assert_eq!(truncate_for_title(text, 30), "This is a very long text that...");
    }

    #[test]
    fn test_truncate_no_word_boundary() {
        assert_eq!(truncate_for_title("Verylongwordwithoutspaces", 10), "Verylongwo...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_for_title("ééééé", 3), "ééé...");
    }
}
