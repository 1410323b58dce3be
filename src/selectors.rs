use crate::error::{Result, SelkitError};
use crate::fetcher::PageFetcher;
use crate::types::SelectorTestReport;
use scraper::{Html, Selector};
use tracing::info;

const SAMPLE_COUNT: usize = 3;

/// Parses a CSS selector, reporting the parser's complaint on failure.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| SelkitError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Elements of `document` matched by `selector`.
pub fn count_matches(document: &Html, selector: &Selector) -> usize {
    document.select(selector).count()
}

/// Number of matches for a raw selector string; unparseable selectors match nothing.
pub fn count_matches_str(document: &Html, selector: &str) -> usize {
    match Selector::parse(selector) {
        Ok(sel) => count_matches(document, &sel),
        Err(_) => 0,
    }
}

/// Counts matches of `selector` in `html` and keeps outer HTML of the first
/// few as samples.
pub fn test_selector(html: &str, selector: &str) -> Result<SelectorTestReport> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);

    let matches: Vec<_> = document.select(&sel).collect();
    let samples = matches
        .iter()
        .take(SAMPLE_COUNT)
        .map(|el| el.html().trim().to_string())
        .collect();
    let first_match = matches.first().map(|el| el.html());

    Ok(SelectorTestReport {
        match_count: matches.len(),
        samples,
        first_match,
    })
}

/// Fetches `url` (optionally rendered) and tests `selector` against the markup.
pub async fn test_selector_at(
    fetcher: &PageFetcher,
    url: &str,
    selector: &str,
    render: bool,
) -> Result<SelectorTestReport> {
    // Reject a bad selector before paying for the fetch.
    parse_selector(selector)?;
    let page = fetcher.fetch(url, render).await?;
    let report = test_selector(&page.content, selector)?;
    info!("Selector '{}' matched {} element(s) on {}", selector, report.match_count, url);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <ul>
          <li class="item"> First </li>
          <li class="item">Second</li>
          <li class="item">Third</li>
          <li class="item">Fourth</li>
        </ul>
    </body></html>"#;

    #[test]
    fn test_report_counts_and_samples() {
        let report = test_selector(PAGE, "li.item").unwrap();
        assert_eq!(report.match_count, 4);
        assert_eq!(report.samples.len(), 3);
        assert_eq!(report.samples[0], r#"<li class="item"> First </li>"#);
        assert_eq!(report.first_match.as_deref(), Some(r#"<li class="item"> First </li>"#));
    }

    #[test]
    fn test_no_matches() {
        let report = test_selector(PAGE, "table").unwrap();
        assert_eq!(report.match_count, 0);
        assert!(report.samples.is_empty());
        assert!(report.first_match.is_none());
    }

    #[test]
    fn test_invalid_selector() {
        let err = test_selector(PAGE, "li[").unwrap_err();
        assert!(matches!(err, SelkitError::InvalidSelector { .. }));
        assert_eq!(count_matches_str(&Html::parse_document(PAGE), "li["), 0);
    }
}
