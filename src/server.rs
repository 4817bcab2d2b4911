use axum::{
    http::StatusCode,
    response::Html,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::api;
use crate::error::SecTrackError;

pub struct WebServer {
    host: String,
    port: u16,
}

impl WebServer {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    pub async fn start(&self) -> Result<(), SecTrackError> {
        let app = self.create_router();

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| SecTrackError::Error(format!("Invalid address: {}", e)))?;

        println!("sectrack server starting on http://{}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SecTrackError::Error(format!("Failed to bind to {}: {}", addr, e)))?;

        let shutdown_signal = shutdown_signal();

        log::info!("Server ready to handle requests");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal.await;
                log::info!("Shutdown signal received, stopping server");
                println!("\nShutdown signal received - stopping server gracefully...");
            })
            .await
            .map_err(|e| SecTrackError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            // Health check
            .route("/health", get(health_check))
            // App info
            .route("/api/app-info", get(api::app::get_app_info))
            // Item (environment) endpoints
            .route("/api/items", get(api::items::get_items))
            .route("/api/items", post(api::items::create_item))
            .route("/api/items/{id}", put(api::items::update_item))
            .route("/api/items/{id}", delete(api::items::delete_item))
            // Control endpoints
            .route("/api/controls", get(api::controls::get_controls))
            .route("/api/controls", post(api::controls::create_control))
            .route("/api/controls/reorder", put(api::controls::reorder_controls))
            .route("/api/controls/{id}", put(api::controls::update_control))
            .route("/api/controls/{id}", delete(api::controls::delete_control))
            // Sub-control endpoints
            .route("/api/sub-controls", get(api::sub_controls::get_sub_controls))
            .route("/api/sub-controls", post(api::sub_controls::create_sub_control))
            .route(
                "/api/sub-controls/control/{control_id}",
                get(api::sub_controls::get_sub_controls_by_control),
            )
            .route("/api/sub-controls/{id}", put(api::sub_controls::update_sub_control))
            .route(
                "/api/sub-controls/{id}",
                delete(api::sub_controls::delete_sub_control),
            )
            // Implementation status endpoints
            .route(
                "/api/implementations",
                get(api::implementations::get_implementations),
            )
            .route(
                "/api/implementations/{item_id}/{control_id}",
                put(api::implementations::update_implementation),
            )
            .route(
                "/api/sub-control-implementations",
                get(api::implementations::get_sub_control_implementations),
            )
            .route(
                "/api/sub-control-implementations/{item_id}/{sub_control_id}",
                put(api::implementations::update_sub_control_implementation),
            )
            // Matrix view
            .route("/api/matrix", get(api::matrix::get_matrix))
    }
}

async fn health_check() -> Result<(StatusCode, Html<String>), StatusCode> {
    Ok((
        StatusCode::OK,
        Html("<h1>sectrack</h1><p>Server is running</p>".to_string()),
    ))
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}
