//! Session event system.
//!
//! Sessions and the fleet controller emit [`SessionEvent`] values through
//! a broadcast channel. Events mirror the structured log output and give
//! embedders (and tests) a programmatic view of discovery, state
//! transitions, and per-device failures.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use motelog_types::DeviceIdentity;

use crate::session::SessionState;

/// Events emitted while supervising a fleet of motes.
///
/// All events are serializable for logging and IPC. This enum is marked
/// `#[non_exhaustive]` to allow adding new event types in future versions
/// without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// Device was discovered during scanning.
    Discovered {
        device: DeviceIdentity,
        rssi: Option<i16>,
    },
    /// A session moved to a new lifecycle state.
    StateChanged {
        device: DeviceIdentity,
        state: SessionState,
    },
    /// A connect attempt failed; the session will retry.
    ConnectFailed { device: DeviceIdentity, attempt: u32 },
    /// A message field failed to decode and was left blank.
    DecodeFailed { device: DeviceIdentity, detail: String },
    /// Writing to the device's log file failed; the session stops.
    StorageFailed { device: DeviceIdentity, detail: String },
    /// A discovered device was skipped because the connection cap is
    /// reached.
    SessionSkipped { device: DeviceIdentity },
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher fanning events out to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event. Delivery failures (no receivers) are ignored.
    pub fn send(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();

        let device = DeviceIdentity::new("AA:BB", "node");
        dispatcher.send(SessionEvent::StateChanged {
            device: device.clone(),
            state: SessionState::Connecting,
        });

        match rx.recv().await.unwrap() {
            SessionEvent::StateChanged { device: d, state } => {
                assert_eq!(d, device);
                assert_eq!(state, SessionState::Connecting);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn send_without_receivers_is_ok() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.send(SessionEvent::SessionSkipped {
            device: DeviceIdentity::new("AA:BB", "node"),
        });
        assert_eq!(dispatcher.receiver_count(), 0);
    }
}
