//! HTML text and link extraction

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Schemes that never lead to a crawlable page
const SKIPPED_PREFIXES: &[&str] = &["mailto:", "tel:", "javascript:", "#"];

/// Extract the visible text of a page, skipping script/style/noscript subtrees
pub fn visible_text(html: &str) -> String {
    use scraper::node::Node;

    let document = Html::parse_document(html);
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return String::new();
    };

    let mut text_parts = Vec::new();
    for node_ref in body.descendants() {
        if let Node::Text(text_node) = node_ref.value() {
            let in_excluded = node_ref.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                    .unwrap_or(false)
            });

            if !in_excluded {
                let trimmed = text_node.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
        }
    }

    normalize_whitespace(&text_parts.join(" "))
}

/// Extract links that stay on the same host as `scope`
///
/// Links are resolved against `page_url`, stripped of fragments and
/// returned once each, in document order.
pub fn extract_links(page_url: &Url, html: &str, scope: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || SKIPPED_PREFIXES.iter().any(|p| href.starts_with(p)) {
            continue;
        }

        let Ok(mut link) = page_url.join(href) else {
            continue;
        };
        if !same_origin_host(&link, scope) {
            continue;
        }

        link.set_fragment(None);
        if seen.insert(link.as_str().to_string()) {
            links.push(link);
        }
    }

    links
}

/// Web link on the same host and explicit port; http and https both count
pub fn same_origin_host(link: &Url, scope: &Url) -> bool {
    matches!(link.scheme(), "http" | "https")
        && link.host_str() == scope.host_str()
        && link.port() == scope.port()
}

/// Normalize whitespace in text
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text() {
        let html = r#"
            <html>
            <head><title>Test Page</title></head>
            <body>
                <script>var x = "not found";</script>
                <h1>Hello World</h1>
                <p>This is test content.</p>
                <style>.x { color: red; }</style>
            </body>
            </html>
        "#;

        let text = visible_text(html);
        assert!(text.contains("Hello World"));
        assert!(text.contains("test content"));
        assert!(!text.contains("not found"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Test Page"));
    }

    #[test]
    fn test_visible_text_plain_body() {
        assert_eq!(visible_text("Alice's Profile"), "Alice's Profile");
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "  hello   world  \n\t  test  ";
        assert_eq!(normalize_whitespace(input), "hello world test");
    }

    #[test]
    fn test_extract_links_filters() {
        let page = Url::parse("https://example.com/docs/").unwrap();
        let html = r##"
            <a href="/about">About</a>
            <a href="intro#part-2">Intro</a>
            <a href="https://example.com/about#team">About again</a>
            <a href="https://other.org/page">Elsewhere</a>
            <a href="mailto:me@example.com">Mail</a>
            <a href="tel:123">Call</a>
            <a href="javascript:void(0)">JS</a>
            <a href="#top">Top</a>
            <a href="http://example.com:8080/alt">Other port</a>
            <a href="http://example.com/plain">Plain http</a>
            <a href="https://example.com:443/explicit">Default port spelled out</a>
            <a>No href</a>
        "##;

        let links: Vec<String> = extract_links(&page, html, &page)
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            links,
            [
                "https://example.com/about",
                "https://example.com/docs/intro",
                "http://example.com/plain",
                "https://example.com/explicit",
            ]
        );
    }
}
