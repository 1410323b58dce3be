use crate::error::{Result, SelkitError};
use crate::types::*;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Fixed timeout for both plain requests and headless navigations.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Retrieves page markup with a plain GET or a headless-browser render.
#[derive(Clone, Debug)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches `url` once. With `render` set the page is loaded in headless
    /// Chromium and the DOM after scripts run is returned instead of the raw body.
    pub async fn fetch(&self, url: &str, render: bool) -> Result<PageFetch> {
        let parsed = validate_url(url)?;
        let result = if render {
            self.fetch_rendered(parsed).await
        } else {
            self.fetch_static(&parsed).await
        };
        if let Err(e) = &result {
            warn!("Fetch of {} failed: {}", url, e);
        }
        result
    }

    async fn fetch_static(&self, url: &Url) -> Result<PageFetch> {
        info!("Fetching URL: {}", url);

        let started = Instant::now();
        let response = self
            .client
            .get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await?;
        let latency = started.elapsed().as_secs_f64();

        let response = response.error_for_status()?;
        let status = HttpStatus::Code(response.status().as_u16());
        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);

        let content = response.text().await?;
        let charset = declared.or_else(|| charset_from_markup(&content));

        debug!("Fetched {} ({} bytes, {:.3}s)", url, content.len(), latency);
        Ok(PageFetch {
            status,
            latency,
            charset,
            content,
        })
    }

    #[cfg(feature = "render")]
    async fn fetch_rendered(&self, url: Url) -> Result<PageFetch> {
        info!("Rendering URL in headless browser: {}", url);
        tokio::task::spawn_blocking(move || render::render_page(&url, FETCH_TIMEOUT))
            .await
            .map_err(|e| SelkitError::Fetch(format!("Render task failed: {}", e)))?
            .map_err(|e| SelkitError::Fetch(e.to_string()))
    }

    #[cfg(not(feature = "render"))]
    async fn fetch_rendered(&self, url: Url) -> Result<PageFetch> {
        Err(SelkitError::Fetch(format!(
            "Cannot render {}: built without the 'render' feature",
            url
        )))
    }
}

/// Parses `url`, accepting only `http` and `https`.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| SelkitError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SelkitError::InvalidUrl {
            url: url.to_string(),
            reason: "URL must use HTTP or HTTPS protocol".to_string(),
        });
    }
    Ok(parsed)
}

/// `charset` parameter of a Content-Type header value.
fn charset_from_content_type(content_type: &str) -> Option<String> {
    let re = Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"#).ok()?;
    re.captures(content_type).map(|c| c[1].to_string())
}

/// Charset declared in the document itself (`<meta charset>` or the http-equiv form).
fn charset_from_markup(html: &str) -> Option<String> {
    let re = Regex::new(r#"(?i)<meta[^>]*?charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).ok()?;
    re.captures(html).map(|c| c[1].to_string())
}

#[cfg(feature = "render")]
mod render {
    use crate::types::{HttpStatus, PageFetch};
    use anyhow::{anyhow, Result};
    use headless_chrome::{Browser, LaunchOptions};
    use std::time::{Duration, Instant};
    use url::Url;

    const NAVIGATION_STATUS_JS: &str = "(() => { \
        const nav = performance.getEntriesByType('navigation')[0]; \
        return nav && nav.responseStatus ? nav.responseStatus : null; \
        })()";

    /// One full browser lifecycle: launch, navigate, capture, close.
    pub(super) fn render_page(url: &Url, timeout: Duration) -> Result<PageFetch> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .map_err(|e| anyhow!("Failed to build browser launch options: {}", e))?;
        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(timeout);

        let started = Instant::now();
        tab.navigate_to(url.as_str())?;
        tab.wait_until_navigated()?;
        let latency = started.elapsed().as_secs_f64();

        let status = tab
            .evaluate(NAVIGATION_STATUS_JS, false)?
            .value
            .and_then(|v| v.as_u64())
            .and_then(|code| u16::try_from(code).ok())
            .map(HttpStatus::Code)
            .unwrap_or(HttpStatus::Unknown);
        let charset = tab
            .evaluate("document.characterSet", false)?
            .value
            .and_then(|v| v.as_str().map(str::to_string));
        let content = tab.get_content()?;

        drop(tab);
        drop(browser);

        Ok(PageFetch {
            status,
            latency,
            charset,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> PageFetcher {
        PageFetcher::new(Client::builder().timeout(FETCH_TIMEOUT).build().unwrap())
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html/>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let page = fetcher()
            .fetch(&format!("{}/page", server.uri()), false)
            .await
            .unwrap();
        assert_eq!(page.status, HttpStatus::Code(200));
        assert_eq!(page.charset.as_deref(), Some("utf-8"));
        assert_eq!(page.content, "<html/>");
        assert!(page.latency >= 0.0);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let fetcher = fetcher();
        for _ in 0..2 {
            match fetcher.fetch(&url, false).await {
                Err(SelkitError::Fetch(msg)) => {
                    assert!(msg.contains("404"), "unexpected message: {}", msg)
                }
                other => panic!("expected fetch error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_charset_from_meta_when_header_silent() {
        let server = MockServer::start().await;
        let body = r#"<html><head><meta charset="windows-1252"></head><body>hi</body></html>"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&server)
            .await;

        let page = fetcher().fetch(&server.uri(), false).await.unwrap();
        assert_eq!(page.charset.as_deref(), Some("windows-1252"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let err = fetcher().fetch("ftp://example.com/file", false).await.unwrap_err();
        assert!(matches!(err, SelkitError::InvalidUrl { .. }));
    }

    #[test]
    fn test_charset_parsing() {
        assert_eq!(
            charset_from_content_type("text/html; charset=\"ISO-8859-1\""),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(charset_from_content_type("application/json"), None);
        assert_eq!(
            charset_from_markup(
                r#"<meta http-equiv="Content-Type" content="text/html; charset=Shift_JIS">"#
            ),
            Some("Shift_JIS".to_string())
        );
    }
}
