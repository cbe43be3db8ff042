use std::sync::Arc;

use intentfi_gateway::Gateway;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Address this agent signs its envelopes with
    pub address: String,
}
