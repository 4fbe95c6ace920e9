//! Error types for the traffic simulator
//!
//! Nothing in the simulated domain is fatal: clamping never rejects input and
//! empty averages degrade to `None`. These variants cover the few places where
//! a caller hands us something we cannot work with.

use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Main error type for simulator operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An explicit sample set was empty
    #[error("sample set must contain at least one location")]
    EmptySampleSet,

    /// Periodic updates need a running tokio runtime
    #[error("periodic updates require a tokio runtime")]
    NoRuntime,

    /// A route endpoint query was blank
    #[error("location query must not be blank")]
    EmptyLocationQuery,
}

impl SimulatorError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
