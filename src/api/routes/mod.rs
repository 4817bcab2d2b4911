pub mod app;
pub mod controls;
pub mod implementations;
pub mod items;
pub mod matrix;
pub mod sub_controls;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::error::SecTrackError;

/// Error body returned by every API handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body returned by update/delete handlers, matching the REST contract's
/// `{"success": true}` responses.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<SuccessResponse> {
        Json(SuccessResponse { success: true })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps the error taxonomy onto HTTP: missing references are 404, bad
/// input is 400, an illegal green transition is 412, everything else
/// (storage, pool, I/O) is 500.
pub fn error_response(err: SecTrackError) -> ApiError {
    let status = match &err {
        SecTrackError::NotFound(_) => StatusCode::NOT_FOUND,
        SecTrackError::Validation(_) => StatusCode::BAD_REQUEST,
        SecTrackError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy_maps_to_http_statuses() {
        let (status, _) = error_response(SecTrackError::NotFound("x".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_response(SecTrackError::Validation("x".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(SecTrackError::PreconditionFailed("x".to_string()));
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);

        let (status, _) = error_response(SecTrackError::Error("x".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
