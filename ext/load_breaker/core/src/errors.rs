//! Error types for circuit breaker operations

use std::error::Error;
use std::fmt;

/// Errors that can occur during circuit breaker operations
///
/// Every variant is raised synchronously and leaves the breaker untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError {
    /// The requested operation is not valid in the breaker's current state
    InvalidState {
        breaker: String,
        operation: &'static str,
        state: &'static str,
    },
}

impl BreakerError {
    pub(crate) fn invalid_state(
        breaker: &str,
        operation: &'static str,
        state: &'static str,
    ) -> Self {
        BreakerError::InvalidState {
            breaker: breaker.to_string(),
            operation,
            state,
        }
    }

    /// Name of the operation that was rejected
    pub fn operation(&self) -> &'static str {
        match self {
            BreakerError::InvalidState { operation, .. } => operation,
        }
    }

    /// State the breaker was in when the operation was rejected
    pub fn state(&self) -> &'static str {
        match self {
            BreakerError::InvalidState { state, .. } => state,
        }
    }
}

impl fmt::Display for BreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::InvalidState {
                breaker,
                operation,
                state,
            } => {
                write!(
                    f,
                    "Breaker '{}' cannot {} while {}",
                    breaker,
                    operation,
                    state.to_lowercase()
                )
            }
        }
    }
}

impl Error for BreakerError {}
