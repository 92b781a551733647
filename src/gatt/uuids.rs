//! Bluetooth SIG assigned numbers used by the HID peripheral.

use core::fmt;

/// 16-bit Bluetooth UUID, expandable over the SIG base UUID
/// `0000XXXX-0000-1000-8000-00805F9B34FB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Uuid(u16);

impl Uuid {
    pub const fn new_16(uuid: u16) -> Self {
        Self(uuid)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Full 128-bit form over the base UUID, little-endian byte order as it
    /// appears on the air.
    pub const fn as_u128_bytes(&self) -> [u8; 16] {
        [
            0xFB,
            0x34,
            0x9B,
            0x5F,
            0x80,
            0x00,
            0x00,
            0x80,
            0x00,
            0x10,
            0x00,
            0x00,
            (self.0 & 0xFF) as u8,
            (self.0 >> 8) as u8,
            0x00,
            0x00,
        ]
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0000{:04x}-0000-1000-8000-00805f9b34fb", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Uuid {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0000{=u16:04x}-0000-1000-8000-00805f9b34fb", self.0)
    }
}

/// Service uuids served by the peripheral
///
/// Full reference: https://www.bluetooth.com/specifications/assigned-numbers/
/// UUID details: https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/uuids/service_uuids.yaml
#[derive(Clone, Copy)]
pub enum ServiceUuid {
    DeviceInformation = 0x180a,
    BatteryService = 0x180f,
    HidService = 0x1812,
}

/// Characteristic uuids used by the peripheral
///
/// refernece: https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/uuids/characteristic_uuids.yaml
pub enum CharacteristicUuid {
    BatteryLevel = 0x2a19,
    ModelNumber = 0x2a24,
    SerialNumber = 0x2a25,
    ManufacturerName = 0x2a29,
    PnpId = 0x2a50,
    // Characteristics of HID
    HidInfo = 0x2a4a,
    ReportMap = 0x2a4b,
    HidControlPoint = 0x2a4c,
    HidReport = 0x2a4d,
    ProtocolMode = 0x2a4e,
}

pub enum DescriptorUuid {
    ClientCharacteristicConfiguration = 0x2902,
    ReportReference = 0x2908,
}

impl ServiceUuid {
    pub const fn uuid(self) -> Uuid {
        Uuid::new_16(self as u16)
    }
}

impl CharacteristicUuid {
    pub const fn uuid(self) -> Uuid {
        Uuid::new_16(self as u16)
    }
}

impl DescriptorUuid {
    pub const fn uuid(self) -> Uuid {
        Uuid::new_16(self as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_uuid_expansion() {
        let uuid = ServiceUuid::HidService.uuid();
        let bytes = uuid.as_u128_bytes();
        assert_eq!(bytes[12], 0x12);
        assert_eq!(bytes[13], 0x18);
        assert_eq!(&bytes[..12], &[0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00]);
    }

    #[test]
    fn display_form() {
        assert_eq!(
            ServiceUuid::BatteryService.uuid().to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
    }
}
