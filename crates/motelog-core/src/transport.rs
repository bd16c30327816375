//! Transport abstraction over the wireless link.
//!
//! The rest of the crate never touches the BLE stack directly: sessions
//! and the fleet controller are generic over [`Transport`], so they run
//! unchanged against the real [`crate::ble::BleTransport`] or the
//! scriptable [`crate::mock::MockTransport`] used in tests.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use motelog_types::DeviceIdentity;

use crate::error::Result;

/// A device advertisement observed during discovery.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// The advertising device.
    pub identity: DeviceIdentity,
    /// Signal strength at the time of the advertisement, if reported.
    pub rssi: Option<i16>,
}

/// Handler invoked for each notification payload from a device.
///
/// Handlers must be cheap and non-blocking; they run on the transport's
/// notification task.
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// The discovery and connection half of the wireless transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by [`Transport::connect`].
    type Conn: Connection;

    /// Scan for advertising devices for the given window.
    ///
    /// Returns every advertisement observed; deduplication and name
    /// filtering are the caller's concern.
    async fn discover(&self, window: Duration) -> Result<Vec<Advertisement>>;

    /// Connect to a device, failing if the attempt exceeds `timeout`.
    async fn connect(&self, identity: &DeviceIdentity, timeout: Duration) -> Result<Self::Conn>;
}

/// One live connection to a device.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Write a command payload to a characteristic.
    async fn write_command(&self, characteristic: Uuid, payload: &[u8]) -> Result<()>;

    /// Subscribe to notifications on a characteristic.
    ///
    /// The handler is invoked once per notification, in arrival order.
    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()>;

    /// Unsubscribe from notifications on a characteristic.
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;

    /// Whether the link is still up, as far as the transport knows.
    async fn is_connected(&self) -> bool;

    /// Close the connection and release its resources.
    async fn disconnect(&self) -> Result<()>;
}
