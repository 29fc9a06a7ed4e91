use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use common_http_errors::ApiResult;
use serde::Serialize;

use crate::app::AppState;
use crate::bin_handlers::invalid_body;
use crate::error::CoreError;
use crate::ingest::TelemetryReport;
use crate::model::Bin;

#[derive(Debug, Serialize)]
pub struct SensorResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> SensorResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }
}

/// `data` carries the upserted row as a one-element list, the shape sensor
/// firmware already parses.
pub async fn sensor_update(
    State(state): State<AppState>,
    payload: Result<Json<TelemetryReport>, JsonRejection>,
) -> ApiResult<Json<SensorResponse<Vec<Bin>>>> {
    let Json(report) = payload.map_err(invalid_body)?;
    let receipt = state.pipeline.ingest(&report).await?;
    Ok(Json(SensorResponse {
        success: true,
        message: Some("Sensor data updated successfully"),
        data: vec![receipt.bin],
    }))
}

pub async fn sensor_bins(State(state): State<AppState>) -> ApiResult<Json<SensorResponse<Vec<Bin>>>> {
    let bins = state.bins.all_bins().await.map_err(CoreError::from)?;
    Ok(Json(SensorResponse::ok(bins)))
}

pub async fn sensor_bin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SensorResponse<Bin>>> {
    let bin = state
        .bins
        .fetch_bin(&id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(CoreError::bin_not_found)?;
    Ok(Json(SensorResponse::ok(bin)))
}
