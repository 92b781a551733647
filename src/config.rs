//! Tunable configuration for the peripheral engine.

use embassy_time::Duration;

use crate::classic::host::{QosSettings, SdpSettings};
use crate::connection::Device;
use crate::descriptor;
use crate::state::TransportKind;

/// Top-level config for the HID peripheral.
///
/// Everything has a workable default; embedders typically override
/// `identity` and, when a previous host is known, `reconnect`.
pub struct PeripheralConfig {
    /// Name shown to scanning hosts (BLE scan response, classic SDP).
    pub device_name: &'static str,
    /// Strings served by the device information service.
    pub identity: DeviceIdentity,
    /// Vendor/product identity served as the PnP ID characteristic.
    pub pnp: PnpId,
    /// HID report map served on both transports.
    pub report_map: &'static [u8],
    pub ble: BleConfig,
    pub classic: ClassicConfig,
    /// Host to return to after activation, if any.
    pub reconnect: Option<LastConnection>,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            device_name: "hidlink",
            identity: DeviceIdentity::default(),
            pnp: PnpId::default(),
            report_map: &descriptor::REPORT_MAP,
            ble: BleConfig::default(),
            classic: ClassicConfig::default(),
            reconnect: None,
        }
    }
}

/// Device information service strings. Values longer than 20 bytes are
/// clamped where they are served.
#[derive(Clone, Copy, Debug)]
pub struct DeviceIdentity {
    /// Manufacturer
    pub manufacturer: &'static str,
    /// Model number
    pub model: &'static str,
    /// Serial number
    pub serial_number: &'static str,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            manufacturer: "hidlink",
            model: "hidlink combo",
            serial_number: "00000001",
        }
    }
}

/// Structured PnP ID, serialized to the 7-byte characteristic value.
#[derive(Clone, Copy, Debug)]
pub struct PnpId {
    /// 0x01: Bluetooth SIG assigned vendor id
    pub vendor_id_source: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_version: u16,
}

impl PnpId {
    pub fn to_bytes(&self) -> [u8; 7] {
        let vid = self.vendor_id.to_le_bytes();
        let pid = self.product_id.to_le_bytes();
        let version = self.product_version.to_le_bytes();
        [
            self.vendor_id_source,
            vid[0],
            vid[1],
            pid[0],
            pid[1],
            version[0],
            version[1],
        ]
    }
}

impl Default for PnpId {
    fn default() -> Self {
        Self {
            vendor_id_source: 0x01,
            vendor_id: 0xFDDB,
            product_id: 0x0000,
            product_version: 0x0000,
        }
    }
}

/// BLE transport tunables.
#[derive(Clone, Copy, Debug)]
pub struct BleConfig {
    /// How long an advertising session runs before stopping itself.
    pub advertise_timeout: Duration,
    /// Bound on each GATT service registration and on advertising start.
    pub registration_timeout: Duration,
    /// Notification pump tick.
    pub report_interval: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            advertise_timeout: Duration::from_secs(60),
            registration_timeout: Duration::from_secs(10),
            report_interval: Duration::from_millis(15),
        }
    }
}

/// Classic transport tunables.
#[derive(Clone, Debug)]
pub struct ClassicConfig {
    pub sdp: SdpSettings,
    pub qos_in: QosSettings,
    pub qos_out: QosSettings,
    /// How long a discovery session runs before stopping itself.
    pub scan_timeout: Duration,
    /// Bound on an outgoing connection attempt, profile setup included.
    pub connect_timeout: Duration,
    /// Interrupt-channel pump tick.
    pub report_interval: Duration,
    /// Wait inserted before profile re-registration on connect. Some
    /// platform stacks refuse a back-to-back re-registration; around 5
    /// seconds papers over that. Zero by default.
    pub profile_setup_delay: Duration,
}

impl Default for ClassicConfig {
    fn default() -> Self {
        Self {
            sdp: SdpSettings::default(),
            qos_in: QosSettings::guaranteed_input(),
            qos_out: QosSettings::best_effort_output(),
            scan_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(30),
            report_interval: Duration::from_millis(20),
            profile_setup_delay: Duration::from_secs(0),
        }
    }
}

/// The host to reconnect to after activation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LastConnection {
    pub transport: TransportKind,
    pub device: Device,
}
