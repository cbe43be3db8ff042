pub mod health;
pub mod submit;

use axum::Router;

use crate::state::AppState;

pub fn mailbox_router() -> Router<AppState> {
    Router::new()
        .merge(submit::router())
        .merge(health::router())
}
