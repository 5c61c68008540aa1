//! Shared types used across the Tellstick workspace.

use std::fmt;

/// Location of a USB device on the host, stable for the lifetime of one
/// enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Backend-specific bus identifier (a number on Linux, a location ID
    /// string on macOS).
    pub bus: String,
    /// Device address on the bus.
    pub address: u8,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:03}", self.bus, self.address)
    }
}

/// One device reported by USB enumeration.
///
/// Candidates are produced lazily by
/// [`UsbContext::devices`](crate::transport::UsbContext::devices); the
/// caller decides which one to open with an ordinary iterator predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub id: DeviceId,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Product string descriptor, if the device reports one.
    pub product: Option<String>,
    /// Serial number string descriptor, if the device reports one.
    pub serial: Option<String>,
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:04x}:{:04x} {} (serial {})",
            self.id,
            self.vendor_id,
            self.product_id,
            self.product.as_deref().unwrap_or("<unknown>"),
            self.serial.as_deref().unwrap_or("<none>"),
        )
    }
}

/// Setup stage of a USB control transfer.
///
/// Bit 7 of `request_type` selects the direction: set for device-to-host
/// (IN), clear for host-to-device (OUT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    /// Whether this is a device-to-host transfer.
    pub fn is_in(&self) -> bool {
        self.request_type & 0x80 != 0
    }
}

/// Lifecycle state of a device session.
///
/// `Closed` is terminal: a closed session never becomes ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Enumerating, opening, and claiming the device.
    Opening,
    /// Resetting the chip and programming latency, purge, and baud rate.
    Configuring,
    Ready,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Opening => "opening",
            SessionState::Configuring => "configuring",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_display() {
        let id = DeviceId {
            bus: "1".into(),
            address: 7,
        };
        assert_eq!(id.to_string(), "1:007");
    }

    #[test]
    fn candidate_display_with_missing_strings() {
        let c = DeviceCandidate {
            id: DeviceId {
                bus: "3".into(),
                address: 12,
            },
            vendor_id: 0x1781,
            product_id: 0x0c31,
            product: None,
            serial: None,
        };
        assert_eq!(c.to_string(), "3:012 1781:0c31 <unknown> (serial <none>)");
    }

    #[test]
    fn control_setup_direction() {
        let out = ControlSetup {
            request_type: 0x40,
            request: 0,
            value: 0,
            index: 1,
        };
        let inb = ControlSetup {
            request_type: 0xC0,
            ..out
        };
        assert!(!out.is_in());
        assert!(inb.is_in());
    }

    #[test]
    fn session_state_default_and_display() {
        assert_eq!(SessionState::default(), SessionState::Uninitialized);
        assert_eq!(SessionState::Ready.to_string(), "ready");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
