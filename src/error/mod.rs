//! Error types for the gateway
//!
//! Setup-time problems are reported as [`RegistrationError`] so the caller
//! decides whether to abort; serving problems surface as [`GatewayError`].

use crate::filter::FilterPhase;
use thiserror::Error;

/// A filter or route that cannot be registered
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Filter handed to the wrong registration call for its phase
    #[error("filter '{name}' has phase {actual}, expected {expected}")]
    WrongPhase {
        name: String,
        expected: FilterPhase,
        actual: FilterPhase,
    },

    /// Route method other than GET or POST
    #[error("unsupported method '{method}' for route '{pattern}'")]
    UnsupportedMethod { pattern: String, method: String },

    /// Route pattern that is not an absolute path
    #[error("invalid route pattern '{0}': must start with '/'")]
    InvalidPattern(String),

    /// Route pattern registered more than once
    #[error("route pattern '{0}' is already registered")]
    DuplicatePattern(String),
}

/// Errors raised while the gateway is serving
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Listener failed while accepting or serving connections
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),
}
