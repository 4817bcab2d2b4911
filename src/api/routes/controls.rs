use axum::{extract::Path, Json};
use log::error;
use serde::Deserialize;

use crate::api::routes::{error_response, ApiError, SuccessResponse};
use crate::controls::{ControlPatch, NewControl, SecurityControl};
use crate::database::Database;

/// Request body for PUT /api/controls/reorder
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(rename = "orderedIds")]
    pub ordered_ids: Vec<i64>,
}

/// GET /api/controls
/// Controls in display order (sort_order ascending).
pub async fn get_controls() -> Result<Json<Vec<SecurityControl>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let controls = SecurityControl::list(&conn).map_err(|e| {
        error!("Failed to list controls: {}", e);
        error_response(e)
    })?;

    Ok(Json(controls))
}

/// POST /api/controls
pub async fn create_control(
    Json(request): Json<NewControl>,
) -> Result<Json<SecurityControl>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let control = SecurityControl::create(&conn, request).map_err(|e| {
        error!("Failed to create control: {}", e);
        error_response(e)
    })?;

    Ok(Json(control))
}

/// PUT /api/controls/{id}
pub async fn update_control(
    Path(id): Path<i64>,
    Json(request): Json<ControlPatch>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    SecurityControl::update(&conn, id, request).map_err(|e| {
        error!("Failed to update control {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}

/// DELETE /api/controls/{id}
/// Cascades to the control's sub-controls and every implementation row.
pub async fn delete_control(Path(id): Path<i64>) -> Result<Json<SuccessResponse>, ApiError> {
    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    SecurityControl::delete(&mut conn, id).map_err(|e| {
        error!("Failed to delete control {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}

/// PUT /api/controls/reorder
/// The body must list every control id exactly once; each control's
/// sort_order becomes its position in the list.
pub async fn reorder_controls(
    Json(request): Json<ReorderRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    SecurityControl::reorder(&mut conn, &request.ordered_ids).map_err(|e| {
        error!("Failed to reorder controls: {}", e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}
