//! HTTP mode: exposes aggregation as a small JSON endpoint.
//!
//! - `POST /api/aggregate` with `{"location_id", "year", "month",
//!   "aggregate_all"}` runs the same aggregation the CLI does and returns
//!   the run summary.
//! - `GET /healthz` for liveness probes.

use crate::aggregate::{Aggregator, RunSummary, Scope};
use crate::args::ServeArgs;
use crate::commands::Out;
use crate::model::PeriodKey;
use crate::{Config, Result};
use anyhow::{bail, Context};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The JSON body of `POST /api/aggregate`.
///
/// With `aggregate_all` set, the filters narrow discovery the way the CLI
/// flags do. Without it, all three of `location_id`, `year` and `month` are
/// required and exactly that period is aggregated.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AggregateRequest {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub aggregate_all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Run the HTTP server until the process is stopped.
pub async fn serve(config: Config, args: ServeArgs) -> Result<Out<String>> {
    let router = router(config);
    let listener = tokio::net::TcpListener::bind(args.bind())
        .await
        .with_context(|| format!("Failed to bind to {}", args.bind()))?;
    info!("Listening on {}", args.bind());
    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;
    Ok(Out::new_message("Server stopped"))
}

fn router(config: Config) -> Router {
    Router::new()
        .route("/api/aggregate", post(aggregate_handler))
        .route("/healthz", get(healthz))
        .with_state(config)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn aggregate_handler(
    State(config): State<Config>,
    body: std::result::Result<Json<AggregateRequest>, JsonRejection>,
) -> Response {
    // Taking the extractor as a Result keeps malformed bodies on the same
    // 422 path as semantically invalid ones, instead of axum's plain 400.
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejecting aggregate request body: {rejection}");
            return error_response(rejection.to_string());
        }
    };
    match handle_aggregate(&config, &request).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            warn!("Rejecting aggregate request: {e:#}");
            error_response(format!("{e:#}"))
        }
    }
}

fn error_response(error: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { error })).into_response()
}

/// Validates the request and runs the aggregation. Per-key failures land in
/// the summary; an `Err` here means the request itself was unusable.
async fn handle_aggregate(config: &Config, request: &AggregateRequest) -> Result<RunSummary> {
    let db = config.db();
    let aggregator = Aggregator::new(db, db)
        .with_page_size(config.page_size())
        .with_throttle(config.throttle());

    if request.aggregate_all {
        let scope = Scope {
            location_id: request.location_id.clone(),
            year: request.year,
            month: request.month,
        };
        return aggregator.run(&scope).await;
    }

    let (Some(location_id), Some(year), Some(month)) =
        (request.location_id.as_ref(), request.year, request.month)
    else {
        bail!("location_id, year and month are required unless aggregate_all is set");
    };
    let key = PeriodKey::new(location_id.clone(), year, month);
    Ok(aggregator.run_key(&key).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ImportArgs;
    use crate::commands::import;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn seeded_config(dir: &TempDir) -> Config {
        let config = Config::create(dir.path().join("home")).await.unwrap();
        let csv_path = dir.path().join("lines.csv");
        std::fs::write(
            &csv_path,
            "location_id,year,month,category,subcategory,gl_account,amount\n\
             centrum,2024,1,Netto-omzet,,8000,1000.00\n\
             noord,2024,1,Netto-omzet,,8000,700.00\n",
        )
        .unwrap();
        import(config.clone(), ImportArgs::new(&csv_path))
            .await
            .unwrap();
        config
    }

    #[tokio::test]
    async fn test_single_key_request() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let request = AggregateRequest {
            location_id: Some("centrum".to_string()),
            year: Some(2024),
            month: Some(1),
            aggregate_all: false,
        };
        let summary = handle_aggregate(&config, &request).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_aggregate_all_request() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let request = AggregateRequest {
            aggregate_all: true,
            ..AggregateRequest::default()
        };
        let summary = handle_aggregate(&config, &request).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test]
    async fn test_incomplete_request_rejected() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let request = AggregateRequest {
            location_id: Some("centrum".to_string()),
            ..AggregateRequest::default()
        };
        let result = handle_aggregate(&config, &request).await;
        assert!(result.is_err());
    }

    fn json_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/aggregate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_aggregate_ok() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let response = router(config)
            .oneshot(json_post(
                r#"{"location_id":"centrum","year":2024,"month":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let summary: RunSummary = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test]
    async fn test_router_malformed_body_is_unprocessable() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let response = router(config).oneshot(json_post("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.error.is_empty());
    }

    #[tokio::test]
    async fn test_router_incomplete_body_is_unprocessable() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let response = router(config)
            .oneshot(json_post(r#"{"location_id":"centrum"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert!(body.error.contains("required"));
    }

    #[tokio::test]
    async fn test_router_healthz() {
        let dir = TempDir::new().unwrap();
        let config = seeded_config(&dir).await;
        let request = Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = router(config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let request: AggregateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, AggregateRequest::default());
        assert!(!request.aggregate_all);

        let request: AggregateRequest = serde_json::from_str(
            r#"{"location_id":"centrum","year":2024,"month":3,"aggregate_all":false}"#,
        )
        .unwrap();
        assert_eq!(request.month, Some(3));
    }
}
