//! demandflow error types

/// demandflow error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    // Protocol errors
    /// Demand must be strictly positive. Never clamped: a zero request is a caller bug.
    #[error("invalid demand: requested {requested}, demand must be positive")]
    InvalidDemand { requested: u64 },

    // Stream errors
    #[error("source error: {0}")]
    Source(String),

    /// The source or a subscriber callback panicked, or the runtime aborted
    /// the emission task.
    #[error("emission aborted: {0}")]
    Aborted(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FlowError {
    /// Build a [`FlowError::Source`] from anything displayable.
    pub fn source(cause: impl std::fmt::Display) -> Self {
        FlowError::Source(cause.to_string())
    }

    /// Whether this error signals misuse of the demand protocol by the caller
    /// rather than a failure of the stream itself.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, FlowError::InvalidDemand { .. })
    }
}

/// Result type alias for demandflow operations
pub type Result<T> = std::result::Result<T, FlowError>;
