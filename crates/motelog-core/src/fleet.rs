//! Fleet discovery and session supervision.
//!
//! The [`FleetController`] is the sole authority creating and cancelling
//! device sessions. It discovers candidate motes, deduplicates them by
//! address, filters by advertised name, enforces an optional connection
//! cap, and keeps one session task running per selected device. In
//! periodic mode the whole fleet is stopped, re-discovered, and restarted
//! on a fixed interval — a full swap, not an incremental diff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use motelog_types::DeviceIdentity;

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SessionEvent};
use crate::session::{DeviceSession, SessionConfig};
use crate::transport::Transport;

/// Configuration for the fleet controller.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Substring an advertised name must contain to be selected. The
    /// empty string matches every named device; unnamed advertisements
    /// are always ignored.
    pub name_filter: String,
    /// Discovery scan window.
    pub scan_window: Duration,
    /// Maximum number of concurrently supervised sessions. Devices beyond
    /// the cap are skipped, not queued.
    pub max_connections: Option<usize>,
    /// When set, the whole fleet is stopped, re-discovered, and restarted
    /// on this interval.
    pub rescan_interval: Option<Duration>,
    /// Per-session options.
    pub session: SessionConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            name_filter: String::new(),
            scan_window: Duration::from_secs(5),
            max_connections: None,
            rescan_interval: None,
            session: SessionConfig::default(),
        }
    }
}

/// A running session task and the token that cancels it.
struct SupervisedSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Discovers motes and supervises one [`DeviceSession`] per device.
pub struct FleetController<T: Transport> {
    transport: Arc<T>,
    config: FleetConfig,
    events: EventDispatcher,
    /// Sessions keyed by device address. Written by both the supervision
    /// path and shutdown, hence the mutex.
    sessions: Mutex<HashMap<String, SupervisedSession>>,
}

impl<T: Transport> FleetController<T> {
    /// Create a controller over `transport`.
    pub fn new(transport: Arc<T>, config: FleetConfig) -> Self {
        Self {
            transport,
            config,
            events: EventDispatcher::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The dispatcher carrying discovery and session events.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Run one discovery pass: scan, dedupe by address, keep devices whose
    /// advertised name contains the configured substring.
    pub async fn discover(&self) -> Result<Vec<DeviceIdentity>> {
        info!(
            window = ?self.config.scan_window,
            filter = %self.config.name_filter,
            "scanning for devices"
        );
        let advertisements = self.transport.discover(self.config.scan_window).await?;

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for advert in advertisements {
            if advert.identity.name.is_empty()
                || !advert.identity.name.contains(&self.config.name_filter)
            {
                continue;
            }
            if !seen.insert(advert.identity.address.clone()) {
                continue;
            }
            info!(device = %advert.identity, rssi = ?advert.rssi, "discovered device");
            self.events.send(SessionEvent::Discovered {
                device: advert.identity.clone(),
                rssi: advert.rssi,
            });
            found.push(advert.identity);
        }

        info!("discovery complete: {} matching device(s)", found.len());
        Ok(found)
    }

    /// Start a session for every identity not already supervised,
    /// honoring the connection cap. Devices beyond the cap are skipped
    /// and will only be picked up by a later pass once a slot frees.
    pub async fn supervise(&self, identities: Vec<DeviceIdentity>) {
        let mut sessions = self.sessions.lock().await;
        // free the slots of sessions that have stopped on their own
        sessions.retain(|_, s| !s.handle.is_finished());

        for identity in identities {
            if sessions.contains_key(&identity.address) {
                debug!(device = %identity, "already supervised");
                continue;
            }
            if let Some(cap) = self.config.max_connections
                && sessions.len() >= cap
            {
                warn!(device = %identity, cap, "connection cap reached, skipping device");
                self.events
                    .send(SessionEvent::SessionSkipped { device: identity });
                continue;
            }

            let cancel = CancellationToken::new();
            let session = DeviceSession::new(
                identity.clone(),
                Arc::clone(&self.transport),
                self.config.session.clone(),
                self.events.clone(),
                cancel.clone(),
            );
            info!(device = %identity, "starting session");
            let handle = tokio::spawn(session.run());
            sessions.insert(identity.address.clone(), SupervisedSession { cancel, handle });
        }
    }

    /// Cancel every session and wait for each to finish its teardown.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, SupervisedSession)> =
            self.sessions.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        info!("stopping {} session(s)", drained.len());
        for (_, session) in &drained {
            session.cancel.cancel();
        }
        for (address, session) in drained {
            if let Err(e) = session.handle.await {
                warn!(%address, error = %e, "session task panicked");
            }
        }
        info!("all sessions stopped");
    }

    /// Number of currently supervised (still running) sessions.
    pub async fn session_count(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| !s.handle.is_finished());
        sessions.len()
    }

    /// Discover and supervise until `shutdown` is cancelled.
    ///
    /// Fails if the initial discovery finds no matching device. With a
    /// rescan interval configured, the fleet is periodically stopped,
    /// re-discovered, and restarted as a whole; a rescan that finds
    /// nothing leaves the fleet idle until the next interval rather than
    /// failing.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let devices = self.discover().await?;
        if devices.is_empty() {
            return Err(Error::NoDevicesFound {
                filter: self.config.name_filter.clone(),
                window: self.config.scan_window,
            });
        }
        self.supervise(devices).await;

        loop {
            match self.config.rescan_interval {
                Some(interval) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(interval) => {
                            info!("rescan interval elapsed, swapping fleet");
                            self.stop_all().await;
                            match self.discover().await {
                                Ok(devices) if devices.is_empty() => {
                                    warn!("rescan found no devices, retrying at next interval");
                                }
                                Ok(devices) => self.supervise(devices).await,
                                Err(e) => {
                                    warn!(error = %e, "rescan failed, retrying at next interval");
                                }
                            }
                        }
                    }
                }
                None => {
                    shutdown.cancelled().await;
                    break;
                }
            }
        }

        self.stop_all().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_config_defaults() {
        let config = FleetConfig::default();
        assert!(config.name_filter.is_empty());
        assert_eq!(config.scan_window, Duration::from_secs(5));
        assert!(config.max_connections.is_none());
        assert!(config.rescan_interval.is_none());
    }
}
