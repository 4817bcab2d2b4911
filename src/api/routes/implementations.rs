use axum::{extract::Path, Json};
use log::error;
use serde::Deserialize;

use crate::api::routes::{error_response, ApiError, SuccessResponse};
use crate::database::Database;
use crate::implementations::{
    self, ControlImplementation, Status, SubControlImplementation,
};

/// Request body for both implementation-status updates. The status arrives
/// as a string so a malformed value maps to a validation failure rather
/// than a generic body-rejection.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    pub notes: Option<String>,
}

/// GET /api/implementations
pub async fn get_implementations() -> Result<Json<Vec<ControlImplementation>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let implementations = ControlImplementation::list(&conn).map_err(|e| {
        error!("Failed to list implementations: {}", e);
        error_response(e)
    })?;

    Ok(Json(implementations))
}

/// PUT /api/implementations/{item_id}/{control_id}
/// Upserts the stored status of a control for an item. Requesting green
/// while the pair's sub-controls are not all green fails with 412.
pub async fn update_implementation(
    Path((item_id, control_id)): Path<(i64, i64)>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let status = Status::from_str(&request.status).map_err(error_response)?;

    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    implementations::set_control_status(
        &mut conn,
        item_id,
        control_id,
        status,
        request.notes.as_deref(),
    )
    .map_err(|e| {
        error!(
            "Failed to set status for item {} control {}: {}",
            item_id, control_id, e
        );
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}

/// GET /api/sub-control-implementations
pub async fn get_sub_control_implementations(
) -> Result<Json<Vec<SubControlImplementation>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let implementations = SubControlImplementation::list(&conn).map_err(|e| {
        error!("Failed to list sub-control implementations: {}", e);
        error_response(e)
    })?;

    Ok(Json(implementations))
}

/// PUT /api/sub-control-implementations/{item_id}/{sub_control_id}
/// Upserts the sub-control's status, then downgrades the owning control to
/// yellow if it was green and the pair is no longer all-green.
pub async fn update_sub_control_implementation(
    Path((item_id, sub_control_id)): Path<(i64, i64)>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let status = Status::from_str(&request.status).map_err(error_response)?;

    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    implementations::set_sub_control_status(
        &mut conn,
        item_id,
        sub_control_id,
        status,
        request.notes.as_deref(),
    )
    .map_err(|e| {
        error!(
            "Failed to set status for item {} sub-control {}: {}",
            item_id, sub_control_id, e
        );
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}
