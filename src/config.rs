use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CERT_DIR: &str = "/app/certificates";
pub const DEFAULT_CRAWL_BIN: &str = "scrapy";

/// Keys that only shape the HTTP listener.
const LISTENER_KEYS: [&str; 3] = ["SELKIT_HOST", "SELKIT_PORT", "CORS_ORIGINS"];

/// Process configuration, read once at startup and handed to the glue layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    /// Root of the Scrapy project that scaffolding writes into and crawls run in.
    pub project_dir: PathBuf,
    pub crawl_bin: String,
    pub cert_dir: PathBuf,
    pub tls_host_cert: Option<String>,
    pub tls_host_key: Option<String>,
    pub tls_ca_cert: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration for processes that never bind a listener, such as the CLI.
    pub fn from_env_without_listener() -> Result<Self> {
        Self::from_lookup_without_listener(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_lookup`], leaving host, port and CORS origins at
    /// their defaults so a bad listener setting cannot break other commands.
    pub fn from_lookup_without_listener<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup(|key| {
            if LISTENER_KEYS.contains(&key) {
                None
            } else {
                lookup(key)
            }
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("SELKIT_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("SELKIT_PORT must be a port number, got '{}'", raw))?,
            None => DEFAULT_PORT,
        };

        let project_dir = match get("SELKIT_PROJECT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        Ok(Self {
            host: get("SELKIT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            cors_origins: get("CORS_ORIGINS").map(|v| parse_origins(&v)).unwrap_or_default(),
            project_dir,
            crawl_bin: get("SELKIT_CRAWL_BIN").unwrap_or_else(|| DEFAULT_CRAWL_BIN.to_string()),
            cert_dir: get("CERT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CERT_DIR)),
            tls_host_cert: get("TLS_HOST_CERT"),
            tls_host_key: get("TLS_HOST_KEY"),
            tls_ca_cert: get("TLS_CA_CERT"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            project_dir: PathBuf::from("."),
            crawl_bin: DEFAULT_CRAWL_BIN.to_string(),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            tls_host_cert: None,
            tls_host_key: None,
            tls_ca_cert: None,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.iter().any(|o| o == "*") {
        return Vec::new();
    }
    origins
}
