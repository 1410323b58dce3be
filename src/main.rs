use std::sync::Arc;
use tracing::{info, warn};

use selkit::{api, build_http_client, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    info!("Starting selkit server");
    info!("Project directory: {}", config.project_dir.display());
    if config.cors_origins.is_empty() {
        info!("CORS: any origin");
    } else {
        info!("CORS origins: {}", config.cors_origins.join(", "));
    }

    let http_client = build_http_client(&config)?;
    let addr = config.bind_addr();
    let tls = (config.tls_host_cert.clone(), config.tls_host_key.clone());
    let cert_dir = config.cert_dir.clone();

    let state = Arc::new(AppState::new(config, http_client));
    let app = api::router(state);

    match tls {
        (Some(cert_name), Some(key_name)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_dir.join(cert_name),
                cert_dir.join(key_name),
            )
            .await?;
            info!("selkit listening on https://{}", addr);
            axum_server::bind_rustls(addr.parse()?, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        (None, None) => {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("selkit listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        _ => {
            warn!(
                "TLS_HOST_CERT and TLS_HOST_KEY must both be set to enable inbound TLS. \
                 Falling back to HTTP."
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("selkit listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
