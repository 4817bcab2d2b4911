pub mod routes;

// Re-export route handlers for convenience
pub use routes::app;
pub use routes::controls;
pub use routes::implementations;
pub use routes::items;
pub use routes::matrix;
pub use routes::sub_controls;

pub use routes::{error_response, ApiError, ErrorResponse, SuccessResponse};
