use crate::error::SelkitError;
use crate::types::*;
use crate::{crawl, discover, explain, repair, scaffold, selectors, AppState, Config};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Builds the HTTP surface over shared state, with CORS from the config and
/// per-request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/url/test", get(url_test_handler))
        .route("/selector/test", get(selector_test_handler))
        .route("/selector/explain", get(selector_explain_handler))
        .route("/selector/repair", get(selector_repair_handler))
        .route("/selector/discover", get(selector_discover_handler))
        .route("/spider/scaffold", get(spider_scaffold_handler))
        .route("/crawl/run", post(crawl_run_handler))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn error_response(err: SelkitError) -> ApiError {
    let status = match &err {
        SelkitError::Fetch(_) | SelkitError::EmptyContent => StatusCode::BAD_GATEWAY,
        SelkitError::InvalidUrl { .. }
        | SelkitError::InvalidSelector { .. }
        | SelkitError::MalformedSelector(_)
        | SelkitError::InvalidSpiderName => StatusCode::BAD_REQUEST,
        SelkitError::SpiderNotFound(_) => StatusCode::NOT_FOUND,
        SelkitError::CrawlLaunch { .. } | SelkitError::Task(_) | SelkitError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn missing_param(name: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Missing required parameter: {}", name),
        }),
    )
}

/// Missing or undecodable query parameters answer with the same JSON body as
/// every other client error.
fn query_rejection(rejection: QueryRejection) -> ApiError {
    warn!("Rejected query string: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "selkit",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn url_test_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UrlTestQuery>, QueryRejection>,
) -> ApiResult<PageFetch> {
    let Query(query) = query.map_err(query_rejection)?;
    state
        .fetcher
        .fetch(&query.url, query.render)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn selector_test_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SelectorTestQuery>, QueryRejection>,
) -> ApiResult<SelectorTestReport> {
    let Query(query) = query.map_err(query_rejection)?;
    selectors::test_selector_at(&state.fetcher, &query.url, &query.selector, query.render)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn selector_explain_handler(
    query: Result<Query<ExplainQuery>, QueryRejection>,
) -> ApiResult<ExplainResponse> {
    let Query(query) = query.map_err(query_rejection)?;
    explain::explain(&query.selector)
        .map(|explanation| Json(ExplainResponse { explanation }))
        .map_err(error_response)
}

async fn selector_repair_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RepairQuery>, QueryRejection>,
) -> ApiResult<RepairResponse> {
    let Query(query) = query.map_err(query_rejection)?;
    let outcome = repair::repair(&state.fetcher, &query.url, &query.selector).await;
    Ok(Json(RepairResponse {
        suggestion: outcome.to_string(),
    }))
}

async fn selector_discover_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DiscoverQuery>, QueryRejection>,
) -> ApiResult<DiscoverResponse> {
    let Query(query) = query.map_err(query_rejection)?;
    discover::discover(&state.fetcher, &query.url)
        .await
        .map(|selectors| Json(DiscoverResponse { selectors }))
        .map_err(error_response)
}

async fn spider_scaffold_handler(
    query: Result<Query<ScaffoldQuery>, QueryRejection>,
) -> ApiResult<Scaffold> {
    let Query(query) = query.map_err(query_rejection)?;
    scaffold::scaffold(&query.name, &query.url, &query.selector)
        .map(Json)
        .map_err(error_response)
}

/// Accepts repeated `arg` parameters, so the query is read as raw pairs.
async fn crawl_run_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<CrawlOutput> {
    let Query(params) = params.map_err(query_rejection)?;
    let mut spider = None;
    let mut args = Vec::new();
    let mut out = None;
    for (key, value) in params {
        match key.as_str() {
            "spider" => spider = Some(value),
            "arg" => args.push(value),
            "out" => out = Some(value).filter(|v| !v.is_empty()),
            _ => {}
        }
    }
    let spider = spider.ok_or_else(|| missing_param("spider"))?;

    info!("Running spider {} with {} argument(s)", spider, args.len());
    crawl::run_crawl(&state.config, &spider, &args, out.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}
