pub mod config;
pub mod fallback;
pub mod format;
pub mod intent;
pub mod pending;
pub mod responder;

pub use config::*;
pub use fallback::FallbackResponder;
pub use intent::{classify, Intent, TeamRef};
pub use pending::PendingConversations;
pub use responder::{Responder, StatsResponder};
