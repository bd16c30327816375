//! Connection lifecycle and telemetry logging for BLE sensor motes.
//!
//! This crate is the core of motelog: it discovers sensor motes over
//! Bluetooth Low Energy, holds one logical connection per device with
//! automatic reconnection, splits the notification byte stream into
//! discrete messages, decodes them into typed records, and persists each
//! record to per-device CSV files rotated on an hour boundary.
//!
//! # Features
//!
//! - **Device discovery**: scan for motes, dedupe by address, filter by
//!   advertised name
//! - **Device sessions**: one state machine per mote
//!   (`Disconnected -> Connecting -> Active -> Terminating`), fixed-delay
//!   retry, cancellation-safe teardown
//! - **Delimiter framing**: lossless splitting of the notification stream
//!   into messages
//! - **Rotating CSV logs**: per-device files, header-then-rows, flushed
//!   per row, rotated hourly
//! - **Fleet supervision**: concurrent sessions under an optional
//!   connection cap, with optional periodic full-fleet rescans
//! - **Testability**: every component runs against the scriptable
//!   [`mock::MockTransport`] instead of real hardware
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use motelog_core::ble::BleTransport;
//! use motelog_core::fleet::{FleetConfig, FleetController};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let config = FleetConfig {
//!         name_filter: "LAB_NODE".to_string(),
//!         ..Default::default()
//!     };
//!     let fleet = FleetController::new(transport, config);
//!
//!     let shutdown = CancellationToken::new();
//!     fleet.run(shutdown).await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod error;
pub mod events;
pub mod fleet;
pub mod framer;
pub mod link;
pub mod mock;
pub mod rotator;
pub mod session;
pub mod transport;

pub use ble::BleTransport;
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use fleet::{FleetConfig, FleetController};
pub use framer::MessageFramer;
pub use link::LinkConfig;
pub use rotator::{CSV_HEADER, DEFAULT_ROTATION_PERIOD, RotatingCsvWriter};
pub use session::{DeviceSession, SessionConfig, SessionState};
pub use transport::{Advertisement, Connection, NotificationHandler, Transport};
