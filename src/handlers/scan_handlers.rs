use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ScanCreate, ScanLogResponse, ScanResponse, ScanResultResponse, ScanStatus},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ScanListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    status: Option<ScanStatus>,
}

fn default_limit() -> i64 {
    100
}

/// POST /api/scans - create a scan and start it in the background
pub async fn create_scan(
    State(app_state): State<AppState>,
    Json(payload): Json<ScanCreate>,
) -> Result<Json<ScanResponse>, ApiError> {
    let scan = app_state.scan_service.create_scan(payload).await?;
    Ok(Json(scan.into()))
}

/// GET /api/scans - list scans, newest first
pub async fn list_scans(
    State(app_state): State<AppState>,
    Query(params): Query<ScanListQuery>,
) -> Result<Json<Vec<ScanResponse>>, ApiError> {
    let scans = app_state
        .scan_service
        .list_scans(params.limit, params.offset, params.status)
        .await?;
    Ok(Json(scans.into_iter().map(ScanResponse::from).collect()))
}

/// GET /api/scans/:id
pub async fn get_scan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanResponse>, ApiError> {
    let scan = app_state
        .scan_service
        .get_scan(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Scan not found"))?;
    Ok(Json(scan.into()))
}

/// DELETE /api/scans/:id - remove a scan together with its results and logs
pub async fn delete_scan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    app_state.scan_service.delete_scan(&id).await?;
    Ok(Json(json!({"message": "Scan deleted successfully"})))
}

/// POST /api/scans/:id/cancel
pub async fn cancel_scan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    app_state.scan_service.cancel_scan(&id).await?;
    Ok(Json(json!({"message": "Scan cancelled"})))
}

/// GET /api/scans/:id/results - normalized per-host rows
pub async fn get_scan_results(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScanResultResponse>>, ApiError> {
    let results = app_state.scan_service.get_scan_results(&id).await?;
    Ok(Json(
        results.into_iter().map(ScanResultResponse::from).collect(),
    ))
}

/// GET /api/scans/:id/logs - execution log lines in insertion order
pub async fn get_scan_logs(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScanLogResponse>>, ApiError> {
    let logs = app_state.scan_service.get_scan_logs(&id).await?;
    Ok(Json(logs.into_iter().map(ScanLogResponse::from).collect()))
}
