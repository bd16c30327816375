//! Platform-agnostic types for motelog sensor motes.
//!
//! This crate holds the data model shared by every motelog component:
//! device identities, decoded telemetry records, and the best-effort
//! message decoder for the mote wire grammar. It performs no I/O and has
//! no async machinery, so it can be used from any context.
//!
//! # Wire grammar
//!
//! Motes stream text messages separated by a delimiter character. Each
//! message may carry up to two blocks, in any order:
//!
//! - Motion: `A:x,y,z;G:x,y,z` — 3-axis acceleration and angular rate
//! - Power: `V:v;T:o,a` — battery voltage and two temperature channels
//!
//! Blocks the message does not carry, or that fail to parse, are simply
//! absent from the resulting record. See [`decode()`] for details.

pub mod decode;
pub mod error;
pub mod identity;
pub mod record;

pub use decode::{Decoded, decode};
pub use error::ParseError;
pub use identity::DeviceIdentity;
pub use record::{MotionSample, PowerSample, TelemetryRecord};
