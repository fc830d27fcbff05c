//! Error types for CMP round execution

use crate::PartyId;
use thiserror::Error;

/// Result type alias for round operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a session
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A peer message could not be accepted by the current round
    #[error("Malformed message in round {round} from {from}: {reason}")]
    MalformedMessage {
        round: u16,
        from: PartyId,
        reason: String,
    },

    /// The sender already contributed to this round
    #[error("Duplicate message in round {round} from {from}")]
    DuplicateSender { round: u16, from: PartyId },

    /// The random source failed; the session must be abandoned
    #[error("Randomness failure: {0}")]
    RandomnessFailure(String),

    /// A sampling step could not produce valid material within its retry budget
    #[error("Arithmetic invariant violated: {0}")]
    ArithmeticInvariantViolation(String),

    /// A revealed opening does not reproduce the committed hash
    #[error("Commitment mismatch in round {round} from {from}")]
    CommitmentMismatch { round: u16, from: PartyId },

    /// `finalize` was requested before every expected sender reported
    #[error("Round {round} is missing messages from {missing:?}")]
    MissingMessages { round: u16, missing: Vec<PartyId> },

    /// The session already produced its output
    #[error("Session already finished")]
    SessionFinished,

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    pub(crate) fn malformed(round: u16, from: &PartyId, reason: impl Into<String>) -> Self {
        Error::MalformedMessage {
            round,
            from: from.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the session can keep running after this error.
    ///
    /// Rejected messages leave the round untouched; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage { .. } | Error::DuplicateSender { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rand_core::Error> for Error {
    fn from(e: rand_core::Error) -> Self {
        Error::RandomnessFailure(e.to_string())
    }
}
