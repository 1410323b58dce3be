use crate::error::{Result, SelkitError};
use crate::fetcher::PageFetcher;
use crate::selectors::count_matches;
use crate::types::DiscoveredSelector;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::fmt::Write;
use tracing::{debug, info};

pub const MAX_SELECTORS: usize = 50;
pub const SAMPLE_CHARS: usize = 100;

/// Elements whose subtrees never yield candidates or sample text.
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "head"];

/// Fetches `url` without rendering and proposes selectors that match exactly one
/// element on the page.
///
/// The document walk runs on a blocking thread so large pages do not stall the
/// runtime.
pub async fn discover(fetcher: &PageFetcher, url: &str) -> Result<Vec<DiscoveredSelector>> {
    let page = fetcher.fetch(url, false).await?;
    if page.content.trim().is_empty() {
        return Err(SelkitError::EmptyContent);
    }
    let found = tokio::task::spawn_blocking(move || discover_document(&page.content))
        .await
        .map_err(|e| SelkitError::Task(format!("Discovery task failed: {}", e)))?;
    info!("Discovered {} unique selector(s) on {}", found.len(), url);
    Ok(found)
}

/// Proposes `tag.class1.class2` selectors that match exactly one element.
pub fn discover_document(html: &str) -> Vec<DiscoveredSelector> {
    scan_document(html).found
}

struct Scan {
    found: Vec<DiscoveredSelector>,
    /// Candidates counted against the whole document.
    evaluated: usize,
}

fn scan_document(html: &str) -> Scan {
    let document = Html::parse_document(html);
    let mut scan = Scan { found: Vec::new(), evaluated: 0 };
    let mut accepted = HashSet::new();
    let mut rejected = HashSet::new();

    for node in document.root_element().descendants() {
        if scan.found.len() >= MAX_SELECTORS {
            break;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if is_skipped(&element) {
            continue;
        }
        let Some((selector, text)) = candidate_for(&element) else {
            continue;
        };
        // Match counts never change for a parsed document, so a verdict holds.
        if accepted.contains(&selector) || rejected.contains(&selector) {
            continue;
        }
        scan.evaluated += 1;
        if !is_unique(&document, &selector) {
            rejected.insert(selector);
            continue;
        }
        accepted.insert(selector.clone());
        scan.found.push(DiscoveredSelector {
            selector,
            sample_text: text.chars().take(SAMPLE_CHARS).collect(),
        });
    }

    debug!(
        "Evaluated {} candidate selector(s), rejected {}",
        scan.evaluated,
        rejected.len()
    );
    scan
}

/// Selector text and trimmed visible text for an element worth considering.
fn candidate_for(element: &ElementRef) -> Option<(String, String)> {
    let mut parts = Vec::new();
    collect_visible_text(element, &mut parts);
    let text = parts.concat();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut selector = element.value().name().to_string();
    let mut classes = element.value().attr("class")?.split_whitespace().peekable();
    classes.peek()?;
    for class in classes {
        selector.push('.');
        selector.push_str(&escape_ident(class));
    }
    Some((selector, text.to_string()))
}

fn is_unique(document: &Html, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(parsed) => count_matches(document, &parsed) == 1,
        Err(_) => false,
    }
}

/// Serializes a class token as a CSS identifier, escaping whatever the
/// selector grammar would otherwise read as syntax (`md:flex` becomes
/// `md\:flex`, `2col` becomes `\32 col`).
pub fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let leading_dash = ident.starts_with('-');
    if ident == "-" {
        return "\\-".to_string();
    }
    for (i, c) in ident.chars().enumerate() {
        let hex_escape = c == '\u{7f}'
            || ('\u{1}'..='\u{1f}').contains(&c)
            || (c.is_ascii_digit() && (i == 0 || (i == 1 && leading_dash)));
        if c == '\0' {
            out.push('\u{fffd}');
        } else if hex_escape {
            let _ = write!(out, "\\{:x} ", c as u32);
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

fn is_skipped(element: &ElementRef) -> bool {
    if SKIPPED_TAGS.contains(&element.value().name()) {
        return true;
    }
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|el| SKIPPED_TAGS.contains(&el.name()))
}

fn collect_visible_text(element: &ElementRef, parts: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if SKIPPED_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_visible_text(&child_element, parts);
        } else if let Some(text) = child.value().as_text() {
            parts.push(text.text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
      <head>
        <title class="page-title">Title</title>
        <style class="css">p { color: red }</style>
      </head>
      <body>
        <div class="wrapper">
          <h1 class="headline big">Breaking news</h1>
          <p class="lead">Lead paragraph <script class="inline">var x = 1;</script></p>
          <p class="item">One</p>
          <p class="item">Two</p>
          <p class="empty"></p>
          <p>No classes here</p>
          <span class="md:flex">Utility class</span>
        </div>
      </body>
    </html>"#;

    fn selectors(found: &[DiscoveredSelector]) -> Vec<&str> {
        found.iter().map(|d| d.selector.as_str()).collect()
    }

    #[test]
    fn test_discovers_unique_selectors_in_document_order() {
        let found = discover_document(PAGE);
        assert_eq!(
            selectors(&found),
            vec!["div.wrapper", "h1.headline.big", "p.lead", "span.md\\:flex"]
        );
        assert_eq!(found[1].sample_text, "Breaking news");
        assert_eq!(found[3].sample_text, "Utility class");
    }

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("headline"), "headline");
        assert_eq!(escape_ident("md:flex"), "md\\:flex");
        assert_eq!(escape_ident("w-1/2"), "w-1\\/2");
        assert_eq!(escape_ident("2col"), "\\32 col");
        assert_eq!(escape_ident("-1x"), "-\\31 x");
        assert_eq!(escape_ident("-"), "\\-");
        assert_eq!(escape_ident("_caf\u{e9}"), "_caf\u{e9}");
    }

    #[test]
    fn test_classes_outside_identifier_syntax_are_discovered() {
        let html = r#"<html><body>
            <div class="w-1/2">Half</div>
            <div class="2col grid">Columns</div>
            <div class="w-1/3">Third</div>
            <div class="w-1/3">Third again</div>
        </body></html>"#;
        let found = discover_document(html);
        assert_eq!(selectors(&found), vec!["div.w-1\\/2", "div.\\32 col.grid"]);
        assert_eq!(found[1].sample_text, "Columns");

        let document = Html::parse_document(html);
        for d in &found {
            let sel = Selector::parse(&d.selector).unwrap();
            assert_eq!(count_matches(&document, &sel), 1, "{} is not unique", d.selector);
        }
    }

    #[test]
    fn test_repeated_candidates_are_evaluated_once() {
        let items: String = (0..500)
            .map(|i| format!(r#"<li class="item">Item {}</li>"#, i))
            .collect();
        let html = format!(
            r#"<html><body><ul>{}</ul><p class="footer">End</p></body></html>"#,
            items
        );
        let scan = scan_document(&html);
        assert_eq!(scan.evaluated, 2);
        assert_eq!(selectors(&scan.found), vec!["p.footer"]);
    }

    #[tokio::test]
    async fn test_discover_fetches_and_scans_page() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blank"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("  \n", "text/html"))
            .mount(&server)
            .await;

        let fetcher = PageFetcher::new(reqwest::Client::new());
        let found = discover(&fetcher, &format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].selector, "div.wrapper");

        let err = discover(&fetcher, &format!("{}/blank", server.uri())).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not fetch content");
    }

    #[test]
    fn test_script_text_is_not_visible() {
        let found = discover_document(PAGE);
        let lead = found.iter().find(|d| d.selector == "p.lead").unwrap();
        assert_eq!(lead.sample_text, "Lead paragraph");
        assert!(!selectors(&found).contains(&"script.inline"));
        assert!(!selectors(&found).contains(&"title.page-title"));
    }

    #[test]
    fn test_sample_text_is_truncated() {
        let long = "x".repeat(250);
        let html = format!(r#"<html><body><p class="long">{}</p></body></html>"#, long);
        let found = discover_document(&html);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sample_text.chars().count(), SAMPLE_CHARS);
    }

    #[test]
    fn test_cap_uniqueness_and_no_duplicates() {
        let items: String = (0..80)
            .map(|i| format!(r#"<li class="entry-{}">Entry {}</li>"#, i, i))
            .collect();
        let html = format!("<html><body><ul>{}</ul></body></html>", items);
        let found = discover_document(&html);
        assert_eq!(found.len(), MAX_SELECTORS);

        let document = Html::parse_document(&html);
        let mut seen = HashSet::new();
        for d in &found {
            let sel = Selector::parse(&d.selector).unwrap();
            assert_eq!(count_matches(&document, &sel), 1, "{} is not unique", d.selector);
            assert!(seen.insert(d.selector.clone()), "duplicate {}", d.selector);
        }
    }
}
