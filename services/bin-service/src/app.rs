use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRef, State},
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, Request, StatusCode,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use common_auth::JwtVerifier;
use common_observability::BinMetrics;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::bin_handlers::{create_bin, get_bin, list_bins, nearby_bins, update_bin};
use crate::ingest::TelemetryPipeline;
use crate::notification_handlers::{
    delete_notification, list_notifications, mark_all_read, mark_read, unread_count,
};
use crate::sensor_handlers::{sensor_bin, sensor_bins, sensor_update};
use crate::store::{BinStore, NotificationStore};

pub const SERVICE_NAME: &str = "bin-service";

#[derive(Clone)]
pub struct AppState {
    pub bins: Arc<dyn BinStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub metrics: Arc<BinMetrics>,
    pub pipeline: TelemetryPipeline,
}

impl AppState {
    pub fn new(
        bins: Arc<dyn BinStore>,
        notifications: Arc<dyn NotificationStore>,
        jwt_verifier: Arc<JwtVerifier>,
        metrics: Arc<BinMetrics>,
    ) -> Self {
        let pipeline = TelemetryPipeline::new(bins.clone(), notifications.clone(), metrics.clone());
        Self {
            bins,
            notifications,
            jwt_verifier,
            metrics,
            pipeline,
        }
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {err}"),
        ),
    }
}

async fn error_metrics_mw(
    State(metrics): State<Arc<BinMetrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics.record_http_error(SERVICE_NAME, code, status.as_u16());
    }
    resp
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let metrics = state.metrics.clone();
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/bins", get(list_bins).post(create_bin))
        .route("/bins/search/nearby", get(nearby_bins))
        .route("/bins/:id", get(get_bin).put(update_bin))
        .route("/sensor/update", post(sensor_update))
        .route("/sensor/bins", get(sensor_bins))
        .route("/sensor/bin/:id", get(sensor_bin))
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread/count", get(unread_count))
        .route("/notifications/mark-all-read", post(mark_all_read))
        .route("/notifications/:id/mark-read", post(mark_read))
        .route("/notifications/:id", axum::routing::delete(delete_notification))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics, error_metrics_mw))
        .layer(cors_layer(cors_origins))
}
