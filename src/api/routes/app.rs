use axum::Json;
use serde::Serialize;

use crate::database::Database;
use crate::schema::SCHEMA_VERSION;

/// Response structure for app information
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub schema_version: String,
}

/// GET /api/app-info
///
/// Returns application version and schema information
pub async fn get_app_info() -> Json<AppInfo> {
    let schema_version = Database::get_connection()
        .and_then(|conn| Database::stored_schema_version(&conn))
        .map(|v| v.to_string())
        .unwrap_or_else(|_| SCHEMA_VERSION.to_string());

    Json(AppInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version,
    })
}
