//! Decoded telemetry records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::identity::DeviceIdentity;

/// One accelerometer and gyroscope sample.
///
/// The motion block of a message parses atomically: either all six axes
/// are present or the whole sample is absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// 3-axis acceleration.
    pub accel: [f64; 3],
    /// 3-axis angular rate.
    pub gyro: [f64; 3],
}

/// One battery voltage and temperature sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    /// Battery voltage in volts.
    pub battery_volts: f64,
    /// Object and ambient temperature channels, in that order.
    pub temperatures: [f64; 2],
}

/// A decoded telemetry message from one mote.
///
/// Records are ephemeral: they are built when a complete message arrives
/// and handed straight to the log writer. Blocks the message did not carry,
/// or that failed to parse, are `None` and are persisted as blank cells —
/// never as fabricated values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// The originating device.
    pub device: DeviceIdentity,
    /// Wall-clock time at which the message was completed.
    pub timestamp: DateTime<Local>,
    /// Acceleration and angular rate, if the message carried them.
    pub motion: Option<MotionSample>,
    /// Battery voltage and temperatures, if the message carried them.
    pub power: Option<PowerSample>,
}

impl TelemetryRecord {
    /// A record with no decoded fields, stamped `timestamp`.
    pub fn empty(device: DeviceIdentity, timestamp: DateTime<Local>) -> Self {
        Self {
            device,
            timestamp,
            motion: None,
            power: None,
        }
    }
}
