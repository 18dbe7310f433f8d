//! Runtime error types.

/// Errors raised while moving values across the C boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// A C string held a code unit sequence that is not valid text.
    #[error("invalid string at code unit {position}")]
    InvalidString { position: usize },

    /// A non-empty array arrived without a buffer.
    #[error("array of {count} elements has a null buffer")]
    NullArray { count: usize },

    /// An array buffer could not be allocated.
    #[error("cannot allocate {count} elements of {size} bytes")]
    Allocation { count: usize, size: usize },
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
