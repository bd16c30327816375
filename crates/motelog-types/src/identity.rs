//! Device identity handling.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a physical sensor mote.
///
/// The address is the stable per-device key: the Bluetooth MAC address on
/// Linux and Windows, or the peripheral UUID assigned by the platform on
/// macOS (where advertised addresses read as all zeros). The name is the
/// advertised local name and is not guaranteed to be unique across motes.
///
/// Identities are created by discovery and immutable afterwards. All
/// per-device state (buffers, log files, sessions) is keyed by `address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Stable opaque address (MAC address or platform UUID).
    pub address: String,
    /// Advertised device name. May be empty if the device did not
    /// advertise one.
    pub name: String,
}

impl DeviceIdentity {
    /// Create a new identity.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// The device name with filesystem-hostile characters replaced by `_`.
    pub fn sanitized_name(&self) -> String {
        sanitize(&self.name)
    }

    /// Key used for on-disk paths.
    ///
    /// Combines the sanitized name with the sanitized address, so two
    /// motes that advertise the same name never collide on disk.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", sanitize(&self.name), sanitize(&self.address))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_name_replaces_separators() {
        let id = DeviceIdentity::new("AA:BB:CC:DD:EE:FF", "LAB SENSOR 01");
        assert_eq!(id.sanitized_name(), "LAB_SENSOR_01");
    }

    #[test]
    fn storage_key_discriminates_by_address() {
        let a = DeviceIdentity::new("AA:BB:CC:DD:EE:01", "NODE");
        let b = DeviceIdentity::new("AA:BB:CC:DD:EE:02", "NODE");
        assert_ne!(a.storage_key(), b.storage_key());
        assert_eq!(a.storage_key(), "NODE_AA_BB_CC_DD_EE_01");
    }

    #[test]
    fn display_with_and_without_name() {
        let named = DeviceIdentity::new("AA:BB", "Node 1");
        assert_eq!(named.to_string(), "Node 1 (AA:BB)");

        let unnamed = DeviceIdentity::new("AA:BB", "");
        assert_eq!(unnamed.to_string(), "AA:BB");
    }
}
