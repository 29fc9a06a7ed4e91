use common_http_errors::ApiError;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use uuid::Uuid;

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forbidden_missing_role_variant() {
    let err = ApiError::ForbiddenMissingRole { role: "officer".into(), trace_id: None, message: Some("Only officers and admins can create bins".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_role");
    let body = body_json(resp).await;
    assert_eq!(body["missing_role"], "officer");
    assert!(body.get("trace_id").is_none());
}

#[test]
fn conflict_variant() {
    let resp = ApiError::conflict("bin_conflict", "bin 'b1' already exists").into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "bin_conflict");
}

#[tokio::test]
async fn bad_request_carries_field_message() {
    let resp = ApiError::bad_request("validation_error", "fillLevel must be between 0 and 100").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "validation_error");
    let body = body_json(resp).await;
    assert_eq!(body["message"], "fillLevel must be between 0 and 100");
}

#[test]
fn not_found_variant() {
    let resp = ApiError::not_found("bin_not_found", "Trash bin not found").into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "bin_not_found");
}

#[tokio::test]
async fn internal_variant_keeps_trace_id() {
    let trace = Uuid::new_v4();
    let resp = ApiError::internal("boom", Some(trace)).into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
    let body = body_json(resp).await;
    assert_eq!(body["trace_id"], trace.to_string());
}
