pub mod delivery;
pub mod routes;
pub mod state;

use anyhow::Result;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use delivery::{spawn_delivery_listener, DeliveryClient};

pub fn create_router(state: AppState) -> Router {
    routes::mailbox_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("intentfi mailbox listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
