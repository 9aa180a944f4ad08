use std::path::PathBuf;

/// Reasons a single move request is turned down. Reported only to the
/// connection that sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("Move before handshake")]
    NotAttached,

    #[error("Coordinates are not finite integers")]
    InvalidCoordinates,

    #[error("Outdated state")]
    StaleState,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("This cell is not empty")]
    CellOccupied,
}

/// Errors raised by the durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no game with id {0}")]
    NotFound(u64),

    #[error("store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors raised while attaching to a session.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("No game with such id")]
    SessionNotFound(u64),

    #[error("{count} games share the id {id}")]
    AmbiguousSession { id: u64, count: usize },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("stored game {id} is corrupt: {source}")]
    CorruptRecord {
        id: u64,
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Text shown to a client. Integrity and infrastructure problems are
    /// not described beyond a generic failure.
    pub fn client_reason(&self) -> String {
        match self {
            CacheError::SessionNotFound(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_rejection_display() {
        assert_eq!(MoveRejection::StaleState.to_string(), "Outdated state");
        assert_eq!(
            MoveRejection::CellOccupied.to_string(),
            "This cell is not empty"
        );
    }

    #[test]
    fn test_ambiguous_session_is_hidden_from_clients() {
        let err = CacheError::AmbiguousSession { id: 7, count: 2 };
        assert_eq!(err.to_string(), "2 games share the id 7");
        assert_eq!(err.client_reason(), "Internal server error");
    }

    #[test]
    fn test_not_found_reaches_clients() {
        let err = CacheError::SessionNotFound(3);
        assert_eq!(err.client_reason(), "No game with such id");
    }
}
