//! Error types for AX100 driver operations

use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, AxonError>;

/// Errors that can occur during driver operations
///
/// Every driver-layer operation reports failure through this taxonomy.
/// Nothing panics; the only tolerated silent paths are `free_buffer` and
/// context teardown, which are defined as idempotent no-ops on invalid
/// input.
#[derive(Debug, Error)]
pub enum AxonError {
    /// Caller passed a zero-sized, out-of-range, or otherwise malformed argument
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong with the argument
        reason: String,
    },

    /// Operation attempted with no open device context
    #[error("Driver not initialized")]
    NotInitialized,

    /// Device memory arena exhausted or too fragmented for the request
    #[error("No device memory: requested {requested} bytes, {available} free")]
    NoMemory {
        /// Bytes requested (after alignment rounding)
        requested: u64,
        /// Free bytes remaining in the arena
        available: u64,
    },

    /// Readiness not observed within the poll budget
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Wall-clock bound that was exhausted, in milliseconds
        duration_ms: u64,
    },

    /// Device still busy when completion was expected
    #[error("Device busy")]
    Busy,

    /// Device reported an error, or a host-side device access failed
    #[error("Device error: {reason}")]
    DeviceError {
        /// Reason for failure
        reason: String,
    },

    /// Operation or data path the device cannot execute
    #[error("Unsupported: {reason}")]
    Unsupported {
        /// What is not supported
        reason: String,
    },
}

impl AxonError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Create a no-memory error
    pub const fn no_memory(requested: u64, available: u64) -> Self {
        Self::NoMemory {
            requested,
            available,
        }
    }

    /// Create a timeout error
    pub const fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a device error
    pub fn device_error(reason: impl Into<String>) -> Self {
        Self::DeviceError {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported {
            reason: reason.into(),
        }
    }
}
