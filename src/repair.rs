use crate::fetcher::PageFetcher;
use crate::selectors::count_matches_str;
use difflib::sequencematcher::SequenceMatcher;
use scraper::Html;
use std::fmt;
use tracing::{debug, info};

/// Minimum similarity for a class name to be offered as a correction.
pub const CLOSE_MATCH_CUTOFF: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    FetchFailed(String),
    Valid,
    /// The bare word matched once treated as a class name.
    Normalized(String),
    /// Nearest observed class name, without the leading dot.
    CloseMatch(String),
    NoCloseMatch,
    Unsupported,
}

impl fmt::Display for RepairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairOutcome::FetchFailed(msg) => write!(f, "Error fetching URL: {}", msg),
            RepairOutcome::Valid => f.write_str("Selector is valid and finds elements."),
            RepairOutcome::Normalized(candidate) => {
                write!(f, "Selector is valid. Did you mean to use '{}'?", candidate)
            }
            RepairOutcome::CloseMatch(class) => write!(
                f,
                "Selector did not find any elements. Did you mean '.{}'?",
                class
            ),
            RepairOutcome::NoCloseMatch => {
                f.write_str("Selector did not find any elements and no close matches were found.")
            }
            RepairOutcome::Unsupported => {
                f.write_str("Selector repair for this type of selector is not implemented yet.")
            }
        }
    }
}

/// Fetches `url` without rendering and diagnoses `selector` against the page.
pub async fn repair(fetcher: &PageFetcher, url: &str, selector: &str) -> RepairOutcome {
    info!("Repairing selector '{}' against {}", selector, url);
    match fetcher.fetch(url, false).await {
        Ok(page) => repair_document(&page.content, selector),
        Err(e) => RepairOutcome::FetchFailed(e.to_string()),
    }
}

/// Runs the repair steps against already-fetched markup, stopping at the first
/// outcome that applies.
pub fn repair_document(html: &str, selector: &str) -> RepairOutcome {
    let document = Html::parse_document(html);

    if count_matches_str(&document, selector) > 0 {
        return RepairOutcome::Valid;
    }

    let candidate = normalize(selector);
    if candidate != selector && count_matches_str(&document, &candidate) > 0 {
        return RepairOutcome::Normalized(candidate);
    }

    let Some(class_name) = candidate.strip_prefix('.') else {
        return RepairOutcome::Unsupported;
    };

    let classes = collect_classes(&document);
    debug!("Comparing '{}' against {} observed class tokens", class_name, classes.len());
    match closest_match(class_name, &classes, CLOSE_MATCH_CUTOFF) {
        Some(found) => RepairOutcome::CloseMatch(found.to_string()),
        None => RepairOutcome::NoCloseMatch,
    }
}

/// Treats a bare word as a class-name guess.
fn normalize(selector: &str) -> String {
    let already_shaped = selector.starts_with(['.', '#', '[']);
    if !already_shaped && !selector.chars().any(char::is_whitespace) {
        format!(".{}", selector)
    } else {
        selector.to_string()
    }
}

/// Every class token in the document, in document order, duplicates kept.
fn collect_classes(document: &Html) -> Vec<&str> {
    document
        .root_element()
        .descendants()
        .filter_map(|node| node.value().as_element())
        .filter_map(|el| el.attr("class"))
        .flat_map(str::split_whitespace)
        .collect()
}

/// Highest-scoring candidate at or above `cutoff`; the earliest one wins ties.
///
/// Scores are the matching-blocks ratio `2 * M / T` over the two strings' bytes,
/// with the candidate as the first sequence.
pub fn closest_match<'a>(target: &str, candidates: &[&'a str], cutoff: f32) -> Option<&'a str> {
    let mut matcher = SequenceMatcher::new("", target);
    let mut best: Option<(&'a str, f32)> = None;
    for &candidate in candidates {
        matcher.set_first_seq(candidate);
        let score = matcher.ratio();
        if score < cutoff {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(candidate, _)| candidate)
}
