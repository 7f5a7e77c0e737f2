//! HTTP front end.

pub mod error;
pub mod handlers;
pub mod router;

use crate::state::AppState;
use firegpt_core::AppResult;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind `host:port` and serve until the process is stopped.
pub async fn run(state: Arc<AppState>, host: &str, port: u16) -> AppResult<()> {
    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    let app = router::router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
