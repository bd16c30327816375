//! Best-effort decoding of complete telemetry messages.
//!
//! A message may carry a motion block (`A:x,y,z;G:x,y,z`), a power block
//! (`V:v;T:o,a`), both, or neither, in any order. The two blocks are
//! parsed independently: a malformed motion block never suppresses a
//! well-formed power block in the same message, and vice versa.
//!
//! Decoding never fails the caller. Parse problems are collected into
//! [`Decoded::errors`] for the caller to log; the affected block is left
//! absent in the result.

use crate::error::ParseError;
use crate::record::{MotionSample, PowerSample};

/// Marker opening the acceleration values of a motion block.
const ACCEL_MARKER: &str = "A:";
/// Marker separating acceleration from angular rate.
const GYRO_MARKER: &str = ";G:";
/// Marker opening the battery voltage of a power block.
const VOLTAGE_MARKER: &str = "V:";
/// Marker separating voltage from temperatures.
const TEMP_MARKER: &str = ";T:";

/// Result of decoding one message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    /// Motion block, if present and well-formed.
    pub motion: Option<MotionSample>,
    /// Power block, if present and well-formed.
    pub power: Option<PowerSample>,
    /// Parse problems encountered; empty for a fully clean message.
    pub errors: Vec<ParseError>,
}

/// Decode a complete message into its telemetry blocks.
///
/// # Examples
///
/// ```
/// let decoded = motelog_types::decode("A:1,2,3;G:4,5,6");
/// let motion = decoded.motion.unwrap();
/// assert_eq!(motion.accel, [1.0, 2.0, 3.0]);
/// assert_eq!(motion.gyro, [4.0, 5.0, 6.0]);
/// assert!(decoded.power.is_none());
/// assert!(decoded.errors.is_empty());
/// ```
pub fn decode(message: &str) -> Decoded {
    let mut decoded = Decoded::default();

    match parse_motion(message) {
        Ok(motion) => decoded.motion = motion,
        Err(e) => decoded.errors.push(e),
    }
    match parse_power(message) {
        Ok(power) => decoded.power = power,
        Err(e) => decoded.errors.push(e),
    }

    decoded
}

/// Parse the motion block, if its opening marker is present.
///
/// The block is atomic: a failure in either the acceleration or angular
/// rate values leaves the whole sample absent.
fn parse_motion(message: &str) -> Result<Option<MotionSample>, ParseError> {
    let Some(start) = message.find(ACCEL_MARKER) else {
        return Ok(None);
    };
    let rest = &message[start + ACCEL_MARKER.len()..];
    let Some(gyro_at) = rest.find(GYRO_MARKER) else {
        return Err(ParseError::MissingMarker {
            segment: "motion",
            marker: GYRO_MARKER,
        });
    };

    let accel = parse_floats::<3>(&rest[..gyro_at], "accel")?;
    let gyro = parse_floats::<3>(&rest[gyro_at + GYRO_MARKER.len()..], "gyro")?;
    Ok(Some(MotionSample { accel, gyro }))
}

/// Parse the power block, if its opening marker is present.
fn parse_power(message: &str) -> Result<Option<PowerSample>, ParseError> {
    let Some(start) = message.find(VOLTAGE_MARKER) else {
        return Ok(None);
    };
    let rest = &message[start + VOLTAGE_MARKER.len()..];
    let Some(temp_at) = rest.find(TEMP_MARKER) else {
        return Err(ParseError::MissingMarker {
            segment: "power",
            marker: TEMP_MARKER,
        });
    };

    let [battery_volts] = parse_floats::<1>(&rest[..temp_at], "battery")?;
    let temperatures = parse_floats::<2>(&rest[temp_at + TEMP_MARKER.len()..], "temperature")?;
    Ok(Some(PowerSample {
        battery_volts,
        temperatures,
    }))
}

/// Parse exactly `N` comma-separated floats from the head of `input`.
///
/// Reading stops at the first character that cannot belong to a float
/// list, so a block followed by unrelated text (or another block) parses
/// cleanly.
fn parse_floats<const N: usize>(
    input: &str,
    segment: &'static str,
) -> Result<[f64; N], ParseError> {
    let end = input
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E' | ',')))
        .unwrap_or(input.len());
    let parts: Vec<&str> = input[..end].split(',').collect();

    if parts.len() != N {
        return Err(ParseError::WrongValueCount {
            segment,
            expected: N,
            actual: parts.len(),
        });
    }

    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part.trim().parse().map_err(|_| ParseError::InvalidNumber {
            segment,
            text: (*part).to_string(),
        })?;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_only() {
        let decoded = decode("A:1,2,3;G:4,5,6");
        assert_eq!(
            decoded.motion,
            Some(MotionSample {
                accel: [1.0, 2.0, 3.0],
                gyro: [4.0, 5.0, 6.0],
            })
        );
        assert!(decoded.power.is_none());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn power_only() {
        let decoded = decode("V:3.7;T:20,21");
        assert_eq!(
            decoded.power,
            Some(PowerSample {
                battery_volts: 3.7,
                temperatures: [20.0, 21.0],
            })
        );
        assert!(decoded.motion.is_none());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn both_blocks_in_one_message() {
        let decoded = decode("A:1,2,3;G:4,5,6;V:3.7;T:20,21");
        assert!(decoded.motion.is_some());
        assert!(decoded.power.is_some());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn power_before_motion() {
        let decoded = decode("V:3.7;T:20,21;A:1,2,3;G:4,5,6");
        assert!(decoded.motion.is_some());
        assert!(decoded.power.is_some());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn wrong_accel_count_blanks_motion() {
        let decoded = decode("A:1,2;G:4,5,6");
        assert!(decoded.motion.is_none());
        assert_eq!(
            decoded.errors,
            vec![ParseError::WrongValueCount {
                segment: "accel",
                expected: 3,
                actual: 2,
            }]
        );
    }

    #[test]
    fn malformed_motion_does_not_suppress_power() {
        let decoded = decode("A:1,2;G:4,5,6;V:3.7;T:20,21");
        assert!(decoded.motion.is_none());
        assert_eq!(
            decoded.power,
            Some(PowerSample {
                battery_volts: 3.7,
                temperatures: [20.0, 21.0],
            })
        );
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn malformed_power_does_not_suppress_motion() {
        let decoded = decode("A:1,2,3;G:4,5,6;V:bad;T:20,21");
        assert!(decoded.motion.is_some());
        assert!(decoded.power.is_none());
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn negative_and_fractional_values() {
        let decoded = decode("A:-0.12,0.98,-9.81;G:0.5,-0.5,0");
        let motion = decoded.motion.unwrap();
        assert_eq!(motion.accel, [-0.12, 0.98, -9.81]);
        assert_eq!(motion.gyro, [0.5, -0.5, 0.0]);
    }

    #[test]
    fn accel_marker_without_gyro_marker() {
        let decoded = decode("A:1,2,3");
        assert!(decoded.motion.is_none());
        assert_eq!(
            decoded.errors,
            vec![ParseError::MissingMarker {
                segment: "motion",
                marker: ";G:",
            }]
        );
    }

    #[test]
    fn empty_message_is_blank_and_clean() {
        let decoded = decode("");
        assert!(decoded.motion.is_none());
        assert!(decoded.power.is_none());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn garbage_without_markers_is_blank_and_clean() {
        let decoded = decode("hello world");
        assert!(decoded.motion.is_none());
        assert!(decoded.power.is_none());
        assert!(decoded.errors.is_empty());
    }
}
