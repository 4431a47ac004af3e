//! Crate-wide error type.
//!
//! Every fallible operation in the core returns [`Result<T>`], an alias over
//! [`CoreError`]. Variants cover bad arguments, out-of-range access, allocator
//! exhaustion, illegal state transitions, sink I/O failure, serialization failure,
//! missing coordinates, and a pipeline stop that overran its budget.

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("memory error: {0}")]
    MemoryError(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::IoError(e.to_string())
    }
}

impl From<std::fmt::Error> for CoreError {
    fn from(e: std::fmt::Error) -> Self {
        CoreError::SerializationError(e.to_string())
    }
}

impl From<zip::result::ZipError> for CoreError {
    fn from(e: zip::result::ZipError) -> Self {
        CoreError::IoError(format!("zip: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let e = CoreError::InvalidArgument("bad coord".to_string());
        assert_eq!(e.to_string(), "invalid argument: bad coord");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let core: CoreError = io.into();
        assert!(matches!(core, CoreError::IoError(_)));
    }
}
