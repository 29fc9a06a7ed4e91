use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;

use crate::app::AppState;
use crate::bins::{self, BinDetail, BinPatch, CreateBinRequest};
use crate::listing::{self, BinListing, ListParams};
use crate::model::Bin;
use crate::proximity::{self, NearbyParams, NearbyResult};

pub(crate) fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("invalid_body", rejection.body_text())
}

pub(crate) fn invalid_query(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request("invalid_query", rejection.body_text())
}

#[derive(Debug, Serialize)]
pub struct BinEnvelope<T> {
    pub bin: T,
}

#[derive(Debug, Serialize)]
pub struct BinWriteResponse {
    pub message: &'static str,
    pub bin: Bin,
}

pub async fn list_bins(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<BinListing>> {
    let Query(params) = params.map_err(invalid_query)?;
    let query = params.to_query();
    let listing = listing::list_bins(state.bins.as_ref(), &query).await?;
    Ok(Json(listing))
}

pub async fn get_bin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BinEnvelope<BinDetail>>> {
    let detail = bins::bin_detail(state.bins.as_ref(), state.notifications.as_ref(), &id).await?;
    Ok(Json(BinEnvelope { bin: detail }))
}

pub async fn nearby_bins(
    State(state): State<AppState>,
    params: Result<Query<NearbyParams>, QueryRejection>,
) -> ApiResult<Json<NearbyResult>> {
    let Query(params) = params.map_err(invalid_query)?;
    let query = params.validate()?;
    let result = proximity::find_nearby(state.bins.as_ref(), &query).await?;
    state
        .metrics
        .nearby_candidates
        .observe(result.scanned as f64);
    Ok(Json(result))
}

pub async fn create_bin(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateBinRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BinWriteResponse>)> {
    let Json(request) = payload.map_err(invalid_body)?;
    let bin = bins::create_bin(state.bins.as_ref(), &auth, &request).await?;
    Ok((
        StatusCode::CREATED,
        Json(BinWriteResponse {
            message: "Trash bin created successfully",
            bin,
        }),
    ))
}

pub async fn update_bin(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<BinPatch>, JsonRejection>,
) -> ApiResult<Json<BinWriteResponse>> {
    let Json(patch) = payload.map_err(invalid_body)?;
    let bin = bins::update_bin(state.bins.as_ref(), &auth, &id, &patch).await?;
    Ok(Json(BinWriteResponse {
        message: "Trash bin updated successfully",
        bin,
    }))
}
