//! Wire-level constants for the mote link.
//!
//! Motes expose a Nordic UART Service (NUS): the host writes single-byte
//! commands to the RX characteristic and receives telemetry notifications
//! on the TX characteristic. The exact command bytes are firmware-defined;
//! the values here are defaults and every one of them can be overridden
//! through [`LinkConfig`].

use uuid::{Uuid, uuid};

/// Nordic UART Service (NUS) UUID advertised by the motes.
pub const NUS_SERVICE: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");

/// NUS RX characteristic: host-to-device commands.
pub const NUS_RX: Uuid = uuid!("6e400002-b5a3-f393-e0a9-e50e24dcca9e");

/// NUS TX characteristic: device-to-host telemetry notifications.
pub const NUS_TX: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

/// Default single-byte command that starts telemetry streaming.
pub const DEFAULT_INIT_COMMAND: u8 = b'I';

/// Default single-byte command that stops telemetry streaming.
pub const DEFAULT_TERMINATE_COMMAND: u8 = b'T';

/// Default message delimiter in the notification stream.
pub const DEFAULT_DELIMITER: char = '_';

/// Resolved wire constants for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Service UUID used to identify the telemetry service.
    pub service: Uuid,
    /// Characteristic receiving host-to-device commands.
    pub rx: Uuid,
    /// Characteristic delivering device-to-host notifications.
    pub tx: Uuid,
    /// Command byte written once after connecting.
    pub init_command: u8,
    /// Command byte written on teardown, best-effort.
    pub terminate_command: u8,
    /// Character separating messages in the notification stream.
    pub delimiter: char,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service: NUS_SERVICE,
            rx: NUS_RX,
            tx: NUS_TX,
            init_command: DEFAULT_INIT_COMMAND,
            terminate_command: DEFAULT_TERMINATE_COMMAND,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_nordic_uart() {
        let link = LinkConfig::default();
        assert_eq!(link.service, NUS_SERVICE);
        assert_eq!(link.rx, NUS_RX);
        assert_eq!(link.tx, NUS_TX);
        assert_eq!(link.init_command, b'I');
        assert_eq!(link.terminate_command, b'T');
        assert_eq!(link.delimiter, '_');
    }
}
