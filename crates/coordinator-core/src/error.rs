//! Error types for the coordinator core

use thiserror::Error;

/// Result type for coordinator operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while coordinating a session
///
/// Most of these never leave the controller: transport and voice failures are
/// logged and folded into the retry/suppress rules. They are surfaced from
/// the public API only where the caller has a decision to make.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The party string could not be turned into a pairing
    #[error("Invalid pairing '{party_id}': {reason}")]
    InvalidPairing { party_id: String, reason: String },

    /// A transport request was rejected before it was sent
    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    /// The voice provider rejected a request
    #[error("Voice error during {operation}: {message}")]
    Voice { operation: String, message: String },

    /// Operation is not valid in the current session state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The session already finished through an explicit leave
    #[error("Session has ended")]
    SessionEnded,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Persisted state could not be read or written
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SessionError {
    /// Create a transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a voice error
    pub fn voice(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Voice {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a pairing error
    pub fn pairing(party_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPairing {
            party_id: party_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether a later attempt of the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Transport { .. } | SessionError::Voice { .. } | SessionError::Io(_)
        )
    }
}
