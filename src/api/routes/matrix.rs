use axum::Json;
use log::error;

use crate::api::routes::{error_response, ApiError};
use crate::database::Database;
use crate::matrix::{self, Matrix};

/// GET /api/matrix
/// The full environments x controls grid. Pairs with no stored row report
/// red / "Not implemented".
pub async fn get_matrix() -> Result<Json<Matrix>, ApiError> {
    let conn = Database::get_connection().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        error_response(e)
    })?;

    let matrix = matrix::get_matrix(&conn).map_err(|e| {
        error!("Failed to build matrix: {}", e);
        error_response(e)
    })?;

    Ok(Json(matrix))
}
