//! Error types for motelog-core.
//!
//! # Recovery strategies
//!
//! | Error | Handled by | Effect |
//! |-------|------------|--------|
//! | [`Error::NoDevicesFound`] | process startup | reported, non-zero exit |
//! | [`Error::ConnectionFailed`] / [`Error::Timeout`] | device session | fixed-delay retry, never fatal to the fleet |
//! | [`Error::WriteFailed`] / [`Error::SubscribeFailed`] while active | device session | treated as a disconnect, session terminates and retries |
//! | [`Error::Storage`] | device session | fatal to that device's session only |
//! | [`Error::Cancelled`] | caller | orderly shutdown, not a failure |
//!
//! Decode problems are not represented here: they are
//! [`motelog_types::ParseError`] values, logged at the session boundary
//! and never propagated.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while discovering, connecting to, or logging
/// from sensor motes.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error
/// variants in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available on this host.
    #[error("no Bluetooth adapter available")]
    AdapterUnavailable,

    /// Discovery completed without finding any matching device.
    #[error("no devices found matching {filter:?} in a {window:?} scan")]
    NoDevicesFound {
        /// The advertised-name substring filter that was applied.
        filter: String,
        /// The scan window that elapsed.
        window: Duration,
    },

    /// Operation attempted while not connected to the device.
    #[error("not connected to device")]
    NotConnected,

    /// Required characteristic not found on the connected device.
    #[error("characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
    },

    /// Connection attempt failed.
    #[error("connection to {device} failed: {reason}")]
    ConnectionFailed {
        /// The device that could not be reached.
        device: String,
        /// Why the attempt failed.
        reason: String,
    },

    /// Write to a characteristic failed.
    #[error("write to characteristic {uuid} failed: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// Why the write failed.
        reason: String,
    },

    /// Subscribing to a characteristic failed.
    #[error("subscribe to characteristic {uuid} failed: {reason}")]
    SubscribeFailed {
        /// The characteristic UUID.
        uuid: String,
        /// Why the subscription failed.
        reason: String,
    },

    /// Operation timed out.
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to create, write, or flush a log file.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a connection failure for a device.
    pub fn connection_failed(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a storage error with file context.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using motelog-core's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        let err = Error::NoDevicesFound {
            filter: "LAB".to_string(),
            window: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("LAB"));

        let err = Error::timeout("connect", Duration::from_secs(10));
        assert!(err.to_string().contains("connect"));
        assert!(err.to_string().contains("10s"));

        let err = Error::connection_failed("AA:BB", "out of range");
        assert!(err.to_string().contains("AA:BB"));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn storage_error_keeps_path_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::storage("/data/log.csv", io);
        assert!(err.to_string().contains("/data/log.csv"));
        assert!(err.to_string().contains("denied"));
    }
}
