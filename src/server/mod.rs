//! Demo SSE server built on axum.

mod routes;
mod ticker;

pub use routes::{router, AppState};
pub use ticker::Ticker;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;

/// Serve until the shutdown coordinator in `state` fires.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.signaled().await })
        .await?;
    Ok(())
}
