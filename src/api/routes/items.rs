use axum::{extract::Path, Json};
use log::error;

use crate::api::routes::{error_response, ApiError, SuccessResponse};
use crate::database::Database;
use crate::items::{Item, ItemPatch, NewItem};

/// GET /api/items
pub async fn get_items() -> Result<Json<Vec<Item>>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let items = Item::list(&conn).map_err(|e| {
        error!("Failed to list items: {}", e);
        error_response(e)
    })?;

    Ok(Json(items))
}

/// POST /api/items
/// Returns the created item including its assigned id and timestamps.
pub async fn create_item(Json(request): Json<NewItem>) -> Result<Json<Item>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let item = Item::create(&conn, request).map_err(|e| {
        error!("Failed to create item: {}", e);
        error_response(e)
    })?;

    Ok(Json(item))
}

/// PUT /api/items/{id}
/// Partial update; absent fields keep their stored value.
pub async fn update_item(
    Path(id): Path<i64>,
    Json(request): Json<ItemPatch>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    Item::update(&conn, id, request).map_err(|e| {
        error!("Failed to update item {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}

/// DELETE /api/items/{id}
/// Cascades to the item's implementation rows.
pub async fn delete_item(Path(id): Path<i64>) -> Result<Json<SuccessResponse>, ApiError> {
    let mut conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    Item::delete(&mut conn, id).map_err(|e| {
        error!("Failed to delete item {}: {}", id, e);
        error_response(e)
    })?;

    Ok(SuccessResponse::ok())
}
