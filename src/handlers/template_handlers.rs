use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ScanTemplate, ScanTemplateCreate, BUILTIN_TEMPLATES},
    AppState,
};

/// GET /api/templates - user-defined templates stored in the database
pub async fn list_templates(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<ScanTemplate>>, ApiError> {
    let templates = app_state.template_repo.list().await?;
    Ok(Json(templates))
}

/// GET /api/templates/builtin - the builtin catalog, keyed by scan type
pub async fn get_builtin_templates() -> Json<Value> {
    let mut catalog = Map::new();
    for (key, template) in BUILTIN_TEMPLATES {
        catalog.insert(
            (*key).to_string(),
            json!({
                "name": template.name,
                "arguments": template.arguments,
                "description": template.description,
            }),
        );
    }
    Json(Value::Object(catalog))
}

/// GET /api/templates/:id
pub async fn get_template(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanTemplate>, ApiError> {
    let template = app_state
        .template_repo
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template not found"))?;
    Ok(Json(template))
}

/// POST /api/templates
pub async fn create_template(
    State(app_state): State<AppState>,
    Json(payload): Json<ScanTemplateCreate>,
) -> Result<Json<ScanTemplate>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Template name cannot be empty"));
    }
    let template = app_state.template_repo.create(&payload).await?;
    Ok(Json(template))
}

/// DELETE /api/templates/:id
pub async fn delete_template(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    app_state.template_repo.delete(&id).await?;
    Ok(Json(json!({"message": "Template deleted successfully"})))
}
