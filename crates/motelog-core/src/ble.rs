//! btleplug implementation of the transport traits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};
use uuid::Uuid;

use motelog_types::DeviceIdentity;

use crate::error::{Error, Result};
use crate::transport::{Advertisement, Connection, NotificationHandler, Transport};

/// Timeout for characteristic write operations.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for service discovery after connection.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest rescan performed when a connect target is not already cached.
const CONNECT_RESCAN_CAP: Duration = Duration::from_secs(5);

/// Real Bluetooth Low Energy transport.
pub struct BleTransport {
    adapter: Adapter,
}

impl BleTransport {
    /// Create a transport on the first available Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::AdapterUnavailable)?;
        Ok(Self { adapter })
    }

    /// Search the adapter's known peripherals for one matching `identity`.
    async fn find_peripheral(&self, identity: &DeviceIdentity) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            if let Ok(Some(properties)) = peripheral.properties().await {
                let address =
                    create_identifier(&properties.address.to_string(), &peripheral.id());
                if address.eq_ignore_ascii_case(&identity.address) {
                    return Ok(Some(peripheral));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Conn = BleConnection;

    async fn discover(&self, window: Duration) -> Result<Vec<Advertisement>> {
        info!("starting BLE scan for {:?}", window);
        self.adapter.start_scan(ScanFilter::default()).await?;
        sleep(window).await;
        self.adapter.stop_scan().await?;

        let mut advertisements = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            match peripheral.properties().await {
                Ok(Some(properties)) => {
                    let address =
                        create_identifier(&properties.address.to_string(), &peripheral.id());
                    let name = properties.local_name.clone().unwrap_or_default();
                    advertisements.push(Advertisement {
                        identity: DeviceIdentity::new(address, name),
                        rssi: properties.rssi,
                    });
                }
                Ok(None) => {}
                Err(e) => debug!("error reading peripheral properties: {}", e),
            }
        }

        info!("scan complete, {} peripheral(s) seen", advertisements.len());
        Ok(advertisements)
    }

    async fn connect(
        &self,
        identity: &DeviceIdentity,
        connect_timeout: Duration,
    ) -> Result<Self::Conn> {
        // The peripheral is usually cached from the discovery scan.
        // Advertisements can be missed on timing, so rescan briefly if not.
        let peripheral = match self.find_peripheral(identity).await? {
            Some(peripheral) => peripheral,
            None => {
                debug!(device = %identity, "peripheral not cached, rescanning");
                self.adapter.start_scan(ScanFilter::default()).await?;
                sleep(connect_timeout.min(CONNECT_RESCAN_CAP)).await;
                self.adapter.stop_scan().await?;
                self.find_peripheral(identity).await?.ok_or_else(|| {
                    Error::connection_failed(&identity.address, "device not in range")
                })?
            }
        };

        timeout(connect_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout(format!("connect to {identity}"), connect_timeout))?
            .map_err(|e| Error::connection_failed(&identity.address, e))?;
        info!(device = %identity, "connected");

        timeout(DISCOVERY_TIMEOUT, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", DISCOVERY_TIMEOUT))??;

        // Cache characteristics by UUID so later lookups are O(1).
        let mut characteristics = HashMap::new();
        for service in peripheral.services() {
            debug!(service = %service.uuid, "discovered service");
            for characteristic in &service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic.clone());
            }
        }
        debug!(
            device = %identity,
            count = characteristics.len(),
            "cached characteristics"
        );

        Ok(BleConnection {
            peripheral,
            characteristics,
            notification_tasks: Mutex::new(Vec::new()),
        })
    }
}

/// One live BLE connection.
///
/// Notification forwarder tasks spawned by [`Connection::subscribe`] are
/// tracked and aborted when the connection is closed.
pub struct BleConnection {
    peripheral: Peripheral,
    /// Characteristics by UUID, cached at service discovery.
    characteristics: HashMap<Uuid, Characteristic>,
    /// Spawned notification forwarders, aborted on disconnect.
    notification_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl BleConnection {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }
}

#[async_trait]
impl Connection for BleConnection {
    async fn write_command(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let target = self.characteristic(characteristic)?;
        timeout(
            WRITE_TIMEOUT,
            self.peripheral.write(target, payload, WriteType::WithResponse),
        )
        .await
        .map_err(|_| Error::timeout(format!("write characteristic {characteristic}"), WRITE_TIMEOUT))?
        .map_err(|e| Error::WriteFailed {
            uuid: characteristic.to_string(),
            reason: e.to_string(),
        })
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let target = self.characteristic(characteristic)?;
        self.peripheral
            .subscribe(target)
            .await
            .map_err(|e| Error::SubscribeFailed {
                uuid: characteristic.to_string(),
                reason: e.to_string(),
            })?;

        let mut stream = self.peripheral.notifications().await?;
        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == characteristic {
                    handler(&notification.value);
                }
            }
        });
        self.notification_tasks.lock().await.push(task);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        let target = self.characteristic(characteristic)?;
        self.peripheral.unsubscribe(target).await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        {
            let mut tasks = self.notification_tasks.lock().await;
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

/// Format a peripheral ID as a plain string.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{id:?}")
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Pick the stable identifier for a peripheral.
///
/// On macOS the advertised address reads as all zeros, so the platform's
/// peripheral ID is used instead; elsewhere the Bluetooth address wins.
fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
