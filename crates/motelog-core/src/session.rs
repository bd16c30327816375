//! Device session state machine.
//!
//! A [`DeviceSession`] owns the whole connection lifecycle for one mote:
//!
//! ```text
//! Disconnected -> Connecting -> Active -> Terminating -> Disconnected
//!       ^                                                     |
//!       +-------------------- retry ------------------------- +
//! ```
//!
//! Connect failures and timeouts feed a fixed-delay retry loop that runs
//! until the fleet controller cancels the session. While active, every
//! notification flows through the framer, decoder, and log writer
//! strictly in arrival order. Teardown is best-effort: each step logs its
//! failure and moves on, and no error escapes the session task.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use motelog_types::{DeviceIdentity, TelemetryRecord, decode};

use crate::error::Result;
use crate::events::{EventDispatcher, SessionEvent};
use crate::framer::MessageFramer;
use crate::link::LinkConfig;
use crate::rotator::{DEFAULT_ROTATION_PERIOD, RotatingCsvWriter};
use crate::transport::{Connection, Transport};

/// Lifecycle state of one device session.
///
/// The state is owned exclusively by the session task; other components
/// observe it through [`SessionEvent::StateChanged`] events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection; idle or waiting out the retry delay.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected, initialized, and streaming telemetry.
    Active,
    /// Tearing the connection down, best-effort.
    Terminating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Terminating => write!(f, "terminating"),
        }
    }
}

/// Options governing one device session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for a single connect attempt. Exceeding it is treated the
    /// same as a connect failure.
    pub connect_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    pub retry_delay: Duration,
    /// Interval of the connection liveness poll while active.
    pub liveness_interval: Duration,
    /// Rotation period for the device's log files.
    pub rotation_period: Duration,
    /// Directory receiving per-device log subdirectories.
    pub log_dir: PathBuf,
    /// Wire constants for the mote link.
    pub link: LinkConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            liveness_interval: Duration::from_secs(1),
            rotation_period: DEFAULT_ROTATION_PERIOD,
            log_dir: PathBuf::from("sensor_data"),
            link: LinkConfig::default(),
        }
    }
}

/// Why an active connection ended.
enum ActiveOutcome {
    /// External cancellation; the session stops for good.
    Cancelled,
    /// Storage failed; the session stops rather than drop data silently.
    StorageFatal,
    /// The link dropped or an operation failed; the session retries.
    ConnectionLost,
}

/// Owns one connect / stream / teardown cycle for one physical mote,
/// retrying after failures until cancelled.
pub struct DeviceSession<T: Transport> {
    identity: DeviceIdentity,
    transport: Arc<T>,
    config: SessionConfig,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl<T: Transport> DeviceSession<T> {
    /// Create a session for `identity`. The session does nothing until
    /// [`run`](Self::run) is awaited (normally inside a spawned task).
    pub fn new(
        identity: DeviceIdentity,
        transport: Arc<T>,
        config: SessionConfig,
        events: EventDispatcher,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity,
            transport,
            config,
            events,
            cancel,
        }
    }

    /// The token that cancels this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session until it is cancelled or its storage fails.
    ///
    /// Never returns an error: every failure is converted into a state
    /// transition and logged.
    pub async fn run(self) {
        let mut state = SessionState::Disconnected;
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.set_state(&mut state, SessionState::Connecting);
            attempt += 1;
            let conn = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self
                    .transport
                    .connect(&self.identity, self.config.connect_timeout) => match result
                {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(device = %self.identity, attempt, error = %e, "connect attempt failed");
                        self.events.send(SessionEvent::ConnectFailed {
                            device: self.identity.clone(),
                            attempt,
                        });
                        self.set_state(&mut state, SessionState::Disconnected);
                        if self.wait_retry_delay().await.is_err() {
                            break;
                        }
                        continue;
                    }
                },
            };
            attempt = 0;

            match self.stream_from(conn, &mut state).await {
                ActiveOutcome::Cancelled | ActiveOutcome::StorageFatal => break,
                ActiveOutcome::ConnectionLost => {
                    self.set_state(&mut state, SessionState::Disconnected);
                    if self.wait_retry_delay().await.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(&mut state, SessionState::Disconnected);
        info!(device = %self.identity, "session finished");
    }

    /// Sleep out the retry delay; `Err(Cancelled)` means cancellation
    /// fired mid-wait and the next connect attempt must be skipped.
    async fn wait_retry_delay(&self) -> Result<()> {
        debug!(
            device = %self.identity,
            delay = ?self.config.retry_delay,
            "waiting before reconnect"
        );
        tokio::select! {
            _ = self.cancel.cancelled() => Err(crate::error::Error::Cancelled),
            _ = sleep(self.config.retry_delay) => Ok(()),
        }
    }

    /// Initialize a fresh connection and pump its telemetry until it ends.
    async fn stream_from(&self, conn: T::Conn, state: &mut SessionState) -> ActiveOutcome {
        let link = &self.config.link;

        // Host-to-device init command, exactly once per successful connect.
        if let Err(e) = conn.write_command(link.rx, &[link.init_command]).await {
            warn!(device = %self.identity, error = %e, "initialization command failed");
            self.teardown(&conn, state).await;
            return ActiveOutcome::ConnectionLost;
        }
        info!(
            device = %self.identity,
            command = %(link.init_command as char),
            "sent initialization command"
        );

        // Notifications are forwarded into a channel and consumed by this
        // task only, which keeps per-device processing strictly sequential.
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let handler = Box::new(move |bytes: &[u8]| {
            let _ = tx.send(bytes.to_vec());
        });
        if let Err(e) = conn.subscribe(link.tx, handler).await {
            warn!(device = %self.identity, error = %e, "subscribe failed");
            self.teardown(&conn, state).await;
            return ActiveOutcome::ConnectionLost;
        }

        let mut framer = MessageFramer::new(link.delimiter);
        let mut rotator = RotatingCsvWriter::new(
            self.config.log_dir.clone(),
            self.identity.clone(),
            self.config.rotation_period,
        );
        self.set_state(state, SessionState::Active);

        let mut liveness = interval(self.config.liveness_interval);
        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(device = %self.identity, "session cancelled");
                    break ActiveOutcome::Cancelled;
                }
                chunk = rx.recv() => match chunk {
                    Some(bytes) => {
                        if let Err(e) = self.ingest(&mut framer, &mut rotator, &bytes) {
                            error!(device = %self.identity, error = %e, "storage failure, stopping session");
                            self.events.send(SessionEvent::StorageFailed {
                                device: self.identity.clone(),
                                detail: e.to_string(),
                            });
                            break ActiveOutcome::StorageFatal;
                        }
                    }
                    None => {
                        info!(device = %self.identity, "notification channel closed");
                        break ActiveOutcome::ConnectionLost;
                    }
                },
                _ = liveness.tick() => {
                    if !conn.is_connected().await {
                        info!(device = %self.identity, "transport reports disconnect");
                        break ActiveOutcome::ConnectionLost;
                    }
                }
            }
        };

        self.teardown(&conn, state).await;
        outcome
    }

    /// Run one chunk of raw notification bytes through the pipeline:
    /// framer, decoder, log writer. Only storage errors propagate.
    fn ingest(
        &self,
        framer: &mut MessageFramer,
        rotator: &mut RotatingCsvWriter,
        bytes: &[u8],
    ) -> Result<()> {
        for message in framer.feed(bytes) {
            let timestamp = Local::now();
            debug!(device = %self.identity, %message, "complete message");

            let decoded = decode(&message);
            for parse_error in &decoded.errors {
                warn!(
                    device = %self.identity,
                    error = %parse_error,
                    %message,
                    "decode failure, field left blank"
                );
                self.events.send(SessionEvent::DecodeFailed {
                    device: self.identity.clone(),
                    detail: parse_error.to_string(),
                });
            }

            let record = TelemetryRecord {
                device: self.identity.clone(),
                timestamp,
                motion: decoded.motion,
                power: decoded.power,
            };
            rotator.write(&record)?;
        }
        trace!(device = %self.identity, pending = framer.pending(), "chunk processed");
        Ok(())
    }

    /// Best-effort teardown: terminate command, unsubscribe, disconnect.
    /// Failures are logged and never propagate past this boundary. The
    /// framer and log writer are dropped by the caller, which discards the
    /// receive buffer and closes the log file.
    async fn teardown(&self, conn: &T::Conn, state: &mut SessionState) {
        self.set_state(state, SessionState::Terminating);
        let link = &self.config.link;

        if let Err(e) = conn.write_command(link.rx, &[link.terminate_command]).await {
            debug!(device = %self.identity, error = %e, "terminate command not delivered");
        }
        if let Err(e) = conn.unsubscribe(link.tx).await {
            debug!(device = %self.identity, error = %e, "unsubscribe failed");
        }
        if let Err(e) = conn.disconnect().await {
            debug!(device = %self.identity, error = %e, "disconnect failed");
        }
    }

    fn set_state(&self, current: &mut SessionState, next: SessionState) {
        if *current == next {
            return;
        }
        *current = next;
        info!(device = %self.identity, state = %next, "session state");
        self.events.send(SessionEvent::StateChanged {
            device: self.identity.clone(),
            state: next,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.liveness_interval, Duration::from_secs(1));
        assert_eq!(config.rotation_period, Duration::from_secs(3600));
    }

    #[test]
    fn session_state_display() {
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::Terminating.to_string(), "terminating");
    }
}
