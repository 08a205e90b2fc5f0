//! Session-facing error taxonomy.
//!
//! Store failures are converted here; nothing from the transport reaches the
//! rendering layer unclassified.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, in terms the user can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Missing identity, missing selection or invalid input. Not retried.
    #[error("{0}")]
    PreconditionFailed(String),

    /// The conditional claim matched no free row. Terminal for this attempt.
    #[error("Someone already claimed this star, pick another one.")]
    AlreadyClaimed,

    /// Transient store failure. The same operation may be retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Search found nothing. An empty result, not a failure state.
    #[error("{0}")]
    NotFound(String),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// Line to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Error::StoreUnavailable(_) => {
                "Something went wrong while talking to the universe. Try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<starbazaar_store::Error> for Error {
    fn from(e: starbazaar_store::Error) -> Self {
        match e {
            starbazaar_store::Error::NotFound(what) => Error::NotFound(what),
            starbazaar_store::Error::InvalidInput(why) => Error::PreconditionFailed(why),
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}
