//! Parse errors for the telemetry message grammar.

use thiserror::Error;

/// Errors produced while decoding a telemetry message.
///
/// Decoding is best-effort: these errors accompany a partial record and
/// are reported for logging, never raised to abort the caller.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A block carried the wrong number of comma-separated values.
    #[error("{segment} segment: expected {expected} values, got {actual}")]
    WrongValueCount {
        /// Which segment failed ("accel", "gyro", "battery", "temperature").
        segment: &'static str,
        /// Number of values the grammar requires.
        expected: usize,
        /// Number of values actually present.
        actual: usize,
    },

    /// A value failed to parse as a decimal float.
    #[error("{segment} segment: invalid number {text:?}")]
    InvalidNumber {
        /// Which segment failed.
        segment: &'static str,
        /// The offending text.
        text: String,
    },

    /// A block's opening marker was present but its paired marker was not.
    #[error("{segment} block: missing {marker:?} marker")]
    MissingMarker {
        /// Which block failed ("motion", "power").
        segment: &'static str,
        /// The marker that was expected.
        marker: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ParseError::WrongValueCount {
            segment: "accel",
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "accel segment: expected 3 values, got 2");

        let err = ParseError::InvalidNumber {
            segment: "battery",
            text: "3.x".to_string(),
        };
        assert!(err.to_string().contains("3.x"));

        let err = ParseError::MissingMarker {
            segment: "motion",
            marker: ";G:",
        };
        assert!(err.to_string().contains(";G:"));
    }
}
