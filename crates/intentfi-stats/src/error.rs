use thiserror::Error;

/// Failure of a single provider query. Rendered verbatim inside user replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("Erreur API: {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
    #[error("Réponse illisible: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status(status.as_u16());
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
