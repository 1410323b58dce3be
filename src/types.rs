use serde::{Deserialize, Serialize};

/// Status of a fetched page. Headless navigations may finish without a response object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Code(u16),
    Unknown,
}

impl Serialize for HttpStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HttpStatus::Code(code) => serializer.serialize_u16(*code),
            HttpStatus::Unknown => serializer.serialize_str("Unknown"),
        }
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpStatus::Code(code) => write!(f, "{}", code),
            HttpStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageFetch {
    pub status: HttpStatus,
    /// Wall-clock seconds.
    pub latency: f64,
    pub charset: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredSelector {
    pub selector: String,
    pub sample_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectorTestReport {
    pub match_count: usize,
    pub samples: Vec<String>,
    pub first_match: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaffold {
    pub spider_code: String,
    pub item_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<i32>,
}

// HTTP query parameters

#[derive(Debug, Deserialize)]
pub struct UrlTestQuery {
    pub url: String,
    #[serde(default)]
    pub render: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectorTestQuery {
    pub url: String,
    pub selector: String,
    #[serde(default)]
    pub render: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub selector: String,
}

#[derive(Debug, Deserialize)]
pub struct RepairQuery {
    pub url: String,
    pub selector: String,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ScaffoldQuery {
    pub name: String,
    pub url: String,
    pub selector: String,
}

// HTTP responses

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepairResponse {
    pub suggestion: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub selectors: Vec<DiscoveredSelector>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
