//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to the hub. It provides
//! the router construction and server startup functionality.

use std::sync::Arc;

use crate::error::ServerError;
use crate::hub::Hub;

pub mod http;
pub mod ws;

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

/// Binds `port` and serves the HTTP/WebSocket router until the process exits.
pub async fn start_server(port: u16, state: AppState) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{addr}");
    let app = http::create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
