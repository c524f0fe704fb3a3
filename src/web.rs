use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{self, AppState};
use crate::{BeachcastError, Result};

pub async fn run(port: u16, state: AppState) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new().nest("/api", api::router(state)).layer(cors);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BeachcastError::general(format!("failed to bind {addr}: {e}")))?;
    tracing::info!("Read API running at http://localhost:{port}");
    axum::serve(listener, app)
        .await
        .map_err(|e| BeachcastError::general(format!("server error: {e}")))?;
    Ok(())
}
