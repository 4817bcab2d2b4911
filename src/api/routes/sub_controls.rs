use axum::{extract::Path, Json};
use log::error;

use crate::api::routes::{error_response, ApiError, SuccessResponse};
use crate::controls::{NewSubControl, SubControl, SubControlPatch};
use crate::database::Database;

/// GET /api/sub-controls
pub async fn get_sub_controls() -> Result<Json<Vec<SubControl>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let sub_controls = SubControl::list(&conn).map_err(|e| {
        error!("Failed to list sub-controls: {}", e);
        error_response(e)
    })?;

    Ok(Json(sub_controls))
}

/// GET /api/sub-controls/control/{control_id}
/// Sub-controls of one owning control, in insertion order.
pub async fn get_sub_controls_by_control(
    Path(control_id): Path<i64>,
) -> Result<Json<Vec<SubControl>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let sub_controls = SubControl::list_by_control(&conn, control_id).map_err(|e| {
        error!("Failed to list sub-controls for control {}: {}", control_id, e);
        error_response(e)
    })?;

    Ok(Json(sub_controls))
}

/// POST /api/sub-controls
pub async fn create_sub_control(
    Json(request): Json<NewSubControl>,
) -> Result<Json<SubControl>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let sub_control = SubControl::create(&conn, request).map_err(|e| {
        error!("Failed to create sub-control: {}", e);
        error_response(e)
    })?;

    Ok(Json(sub_control))
}

/// PUT /api/sub-controls/{id}
pub async fn update_sub_control(
    Path(id): Path<i64>,
    Json(request): Json<SubControlPatch>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    SubControl::update(&conn, id, request).map_err(|e| {
        error!("Failed to update sub-control {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}

/// DELETE /api/sub-controls/{id}
/// Cascades to the sub-control's implementation rows.
pub async fn delete_sub_control(Path(id): Path<i64>) -> Result<Json<SuccessResponse>, ApiError> {
    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    SubControl::delete(&mut conn, id).map_err(|e| {
        error!("Failed to delete sub-control {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}
