//! HID report types shared by both transports.
//!
//! Reports travel the queues already serialized: a `(report id, payload)`
//! pair that is immutable once enqueued. The typed structs below exist for
//! the producer side and are flattened with `ssmarshal` on construction.

use core::fmt;

use heapless::Vec;
use serde::Serialize;

/// Report id of the keyboard collection in the report map.
pub const KEYBOARD_REPORT_ID: u8 = 1;
/// Report id of the pointer collection in the report map.
pub const POINTER_REPORT_ID: u8 = 2;

/// Largest serialized report payload (keyboard, 8 bytes).
pub const MAX_REPORT_LEN: usize = 8;

/// Keyboard input report: modifier bitmask, reserved byte, six key slots.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; 6],
}

/// Pointer input report: button bitmask, relative deltas, trailing reserved
/// byte. Deltas are clamped to [-127, 127] by the producer.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PointerReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
    pub reserved: u8,
}

impl PointerReport {
    /// True when the report carries no buttons and no motion. The reserved
    /// byte does not participate.
    pub fn is_zero(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

/// A serialized input report as it sits in the transport queues.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputReport {
    pub report_id: u8,
    pub payload: Vec<u8, MAX_REPORT_LEN>,
}

impl InputReport {
    pub fn keyboard(report: KeyboardReport) -> Result<Self, HidError> {
        Self::serialize(KEYBOARD_REPORT_ID, &report)
    }

    pub fn pointer(report: PointerReport) -> Result<Self, HidError> {
        Self::serialize(POINTER_REPORT_ID, &report)
    }

    fn serialize<T: Serialize>(report_id: u8, report: &T) -> Result<Self, HidError> {
        let mut buf = [0u8; MAX_REPORT_LEN];
        let n = ssmarshal::serialize(&mut buf, report).map_err(|_| HidError::ReportSerialize)?;
        let mut payload = Vec::new();
        payload
            .extend_from_slice(&buf[..n])
            .map_err(|_| HidError::BufferOverflow)?;
        Ok(Self { report_id, payload })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidError {
    ReportSerialize,
    BufferOverflow,
    QueueFull,
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidError::ReportSerialize => write!(f, "report serialization failed"),
            HidError::BufferOverflow => write!(f, "report buffer overflow"),
            HidError::QueueFull => write!(f, "input report queue full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_report_wire_layout() {
        let report = KeyboardReport {
            modifier: 0x02,
            reserved: 0,
            keycodes: [0x04, 0, 0, 0, 0, 0],
        };
        let input = InputReport::keyboard(report).unwrap();
        assert_eq!(input.report_id, KEYBOARD_REPORT_ID);
        assert_eq!(input.payload.as_slice(), &[0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn pointer_report_wire_layout() {
        let report = PointerReport {
            buttons: 0b101,
            x: -5,
            y: 127,
            wheel: -1,
            reserved: 0,
        };
        let input = InputReport::pointer(report).unwrap();
        assert_eq!(input.report_id, POINTER_REPORT_ID);
        assert_eq!(input.payload.as_slice(), &[0x05, 0xFB, 0x7F, 0xFF, 0x00]);
    }

    #[test]
    fn pointer_zero_check_ignores_reserved() {
        let mut report = PointerReport::default();
        report.reserved = 0xAA;
        assert!(report.is_zero());
        report.wheel = 1;
        assert!(!report.is_zero());
    }
}
