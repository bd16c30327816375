//! Scriptable in-memory transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without any radio hardware:
//! tests script the advertisements it returns, make connect attempts fail
//! a set number of times, push notification payloads through live
//! subscriptions, and inspect every command a session wrote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use motelog_types::DeviceIdentity;

use crate::error::{Error, Result};
use crate::transport::{Advertisement, Connection, NotificationHandler, Transport};

/// A scriptable transport for exercising sessions and fleets in tests.
#[derive(Default)]
pub struct MockTransport {
    advertisements: Mutex<Vec<Advertisement>>,
    /// Remaining connect attempts that fail, per device address.
    connect_failures: Mutex<HashMap<String, u32>>,
    /// Every connection ever handed out, in creation order.
    connections: Mutex<Vec<MockConnection>>,
    connect_attempts: AtomicU32,
}

impl MockTransport {
    /// Create an empty transport with no advertising devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a device into subsequent discovery results.
    pub fn add_device(&self, identity: DeviceIdentity, rssi: Option<i16>) {
        self.advertisements
            .lock()
            .unwrap()
            .push(Advertisement { identity, rssi });
    }

    /// Make the next `count` connect attempts to `address` fail.
    pub fn fail_connects(&self, address: &str, count: u32) {
        self.connect_failures
            .lock()
            .unwrap()
            .insert(address.to_string(), count);
    }

    /// Total connect attempts made, including failed ones.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Every connection handed out so far, in creation order.
    pub fn connections(&self) -> Vec<MockConnection> {
        self.connections.lock().unwrap().clone()
    }

    /// The most recent connection handed out, if any.
    pub fn last_connection(&self) -> Option<MockConnection> {
        self.connections.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Conn = MockConnection;

    async fn discover(&self, _window: Duration) -> Result<Vec<Advertisement>> {
        Ok(self.advertisements.lock().unwrap().clone())
    }

    async fn connect(&self, identity: &DeviceIdentity, _timeout: Duration) -> Result<Self::Conn> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        {
            let mut failures = self.connect_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&identity.address)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(Error::connection_failed(
                    identity.address.clone(),
                    "scripted connect failure",
                ));
            }
        }

        let conn = MockConnection::new(identity.clone());
        self.connections.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}

struct ConnectionState {
    device: DeviceIdentity,
    connected: AtomicBool,
    fail_writes: AtomicBool,
    written: Mutex<Vec<(Uuid, Vec<u8>)>>,
    handlers: Mutex<Vec<(Uuid, NotificationHandler)>>,
}

/// One scripted connection handed out by [`MockTransport`].
///
/// Clones share state, so a test can keep a handle while the session
/// under test owns another.
#[derive(Clone)]
pub struct MockConnection {
    inner: Arc<ConnectionState>,
}

impl MockConnection {
    fn new(device: DeviceIdentity) -> Self {
        Self {
            inner: Arc::new(ConnectionState {
                device,
                connected: AtomicBool::new(true),
                fail_writes: AtomicBool::new(false),
                written: Mutex::new(Vec::new()),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The device this connection was opened to.
    pub fn device(&self) -> &DeviceIdentity {
        &self.inner.device
    }

    /// Every `(characteristic, payload)` written so far, in order.
    pub fn written_commands(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.inner.written.lock().unwrap().clone()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.handlers.lock().unwrap().len()
    }

    /// Deliver a notification payload to every matching subscription.
    pub fn push_notification(&self, characteristic: Uuid, payload: &[u8]) {
        let handlers = self.inner.handlers.lock().unwrap();
        for (uuid, handler) in handlers.iter() {
            if *uuid == characteristic {
                handler(payload);
            }
        }
    }

    /// Simulate a transport-level link drop.
    pub fn drop_link(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn write_command(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::WriteFailed {
                uuid: characteristic.to_string(),
                reason: "scripted write failure".to_string(),
            });
        }
        self.inner
            .written
            .lock()
            .unwrap()
            .push((characteristic, payload.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        self.inner
            .handlers
            .lock()
            .unwrap()
            .push((characteristic, handler));
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        self.inner
            .handlers
            .lock()
            .unwrap()
            .retain(|(uuid, _)| *uuid != characteristic);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF", "LAB_NODE_01")
    }

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let transport = MockTransport::new();
        transport.fail_connects(&identity().address, 2);

        let timeout = Duration::from_secs(1);
        assert!(transport.connect(&identity(), timeout).await.is_err());
        assert!(transport.connect(&identity(), timeout).await.is_err());
        assert!(transport.connect(&identity(), timeout).await.is_ok());
        assert_eq!(transport.connect_attempts(), 3);
        assert_eq!(transport.connections().len(), 1);
    }

    #[tokio::test]
    async fn notifications_reach_subscribed_handlers() {
        let transport = MockTransport::new();
        let conn = transport
            .connect(&identity(), Duration::from_secs(1))
            .await
            .unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let characteristic = crate::link::NUS_TX;
        conn.subscribe(
            characteristic,
            Box::new(move |bytes| sink.lock().unwrap().push(bytes.to_vec())),
        )
        .await
        .unwrap();

        conn.push_notification(characteristic, b"hello");
        conn.push_notification(crate::link::NUS_RX, b"ignored");
        assert_eq!(received.lock().unwrap().as_slice(), &[b"hello".to_vec()]);

        conn.unsubscribe(characteristic).await.unwrap();
        assert_eq!(conn.subscription_count(), 0);
    }

    #[tokio::test]
    async fn writes_fail_after_link_drop() {
        let transport = MockTransport::new();
        let conn = transport
            .connect(&identity(), Duration::from_secs(1))
            .await
            .unwrap();

        conn.drop_link();
        assert!(!conn.is_connected().await);
        assert!(
            conn.write_command(crate::link::NUS_RX, b"I")
                .await
                .is_err()
        );
    }
}
