pub mod api;
pub mod config;
pub mod crawl;
pub mod discover;
pub mod error;
pub mod explain;
pub mod fetcher;
pub mod repair;
pub mod scaffold;
pub mod selectors;
pub mod types;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub use config::Config;
pub use error::SelkitError;
pub use fetcher::PageFetcher;
pub use types::*;

#[derive(Clone, Debug)]
pub struct AppState {
    pub fetcher: PageFetcher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, http_client: reqwest::Client) -> Self {
        Self {
            fetcher: PageFetcher::new(http_client),
            config: Arc::new(config),
        }
    }
}

pub fn build_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(fetcher::FETCH_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(ca_cert_name) = &config.tls_ca_cert {
        let cert_path = config.cert_dir.join(ca_cert_name);
        let shown = cert_path.display();
        let pem = std::fs::read(&cert_path)
            .with_context(|| format!("Failed to read TLS CA certificate at {}", shown))?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .with_context(|| format!("Failed to parse TLS CA certificate at {}", shown))?;
        info!("Loaded TLS CA certificate from {}", shown);
        builder = builder.add_root_certificate(cert);
    }

    builder.build().context("Failed to build HTTP client")
}
