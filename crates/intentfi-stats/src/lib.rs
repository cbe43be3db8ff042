//! Client for the sports statistics provider: typed fetchers plus the team
//! and season resolution chains built on top of them.

pub mod client;
pub mod error;
pub mod resolve;
pub mod types;

pub use client::{StatsClient, DEFAULT_TIMEOUT_SECS};
pub use error::StatsError;
pub use resolve::{LookupStep, SeasonHit, SeasonResolver, TeamResolver};
pub use types::{Competitor, MatchRecord, Season, StatValue, Statistic};
