use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Json},
};
use uuid::Uuid;

use crate::{error::ApiError, services::report_service::JsonReport, AppState};

/// GET /api/reports/:scan_id/json - full machine-readable report
pub async fn get_json_report(
    State(app_state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Json<JsonReport>, ApiError> {
    let report = app_state.report_service.json_report(&scan_id).await?;
    Ok(Json(report))
}

/// GET /api/reports/:scan_id/html - styled report for the browser
pub async fn get_html_report(
    State(app_state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let html = app_state.report_service.html_report(&scan_id).await?;
    Ok(Html(html))
}

/// GET /api/reports/:scan_id/csv - spreadsheet export, one row per port
pub async fn get_csv_report(
    State(app_state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = app_state.report_service.csv_report(&scan_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=scan_{}.csv", scan_id),
            ),
        ],
        csv,
    ))
}
