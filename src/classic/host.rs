//! Platform abstraction for the classic Bluetooth HID device profile.

use crate::connection::Device;
use crate::descriptor;
use crate::host::HostError;
use crate::state::{BondState, LinkState};

/// Device subclass advertised over SDP: keyboard + pointing device combo.
pub const SUBCLASS_COMBO: u8 = 0xC0;

/// Sentinel for QoS fields the platform should pick itself.
pub const QOS_DONT_CARE: u32 = u32::MAX;

/// SDP record content for the HID device application.
#[derive(Clone, Copy, Debug)]
pub struct SdpSettings {
    pub name: &'static str,
    pub description: &'static str,
    pub provider: &'static str,
    pub subclass: u8,
    /// HID report descriptor announced in the record.
    pub descriptors: &'static [u8],
}

impl Default for SdpSettings {
    fn default() -> Self {
        Self {
            name: "hidlink",
            description: "wireless keyboard and pointer",
            provider: "hidlink",
            subclass: SUBCLASS_COMBO,
            descriptors: &descriptor::REPORT_MAP,
        }
    }
}

/// L2CAP service types, HID profile numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QosServiceType {
    NoTraffic = 0x00,
    BestEffort = 0x01,
    Guaranteed = 0x02,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QosSettings {
    pub service_type: QosServiceType,
    pub token_rate: u32,
    pub token_bucket_size: u32,
    pub peak_bandwidth: u32,
    pub latency: u32,
    pub delay_variation: u32,
}

impl QosSettings {
    /// Interrupt channel towards the host: latency left to the controller.
    pub const fn guaranteed_input() -> Self {
        Self {
            service_type: QosServiceType::Guaranteed,
            token_rate: 0,
            token_bucket_size: 0,
            peak_bandwidth: 0,
            latency: QOS_DONT_CARE,
            delay_variation: QOS_DONT_CARE,
        }
    }

    /// Host-to-device traffic is sparse; best effort is plenty.
    pub const fn best_effort_output() -> Self {
        Self {
            service_type: QosServiceType::BestEffort,
            token_rate: 800,
            token_bucket_size: 9,
            peak_bandwidth: 0,
            latency: 11250,
            delay_variation: 11250,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClassicHostEvent {
    ConnectionStateChanged {
        device: Device,
        state: LinkState,
    },
    BondStateChanged {
        device: Device,
        bond: BondState,
    },
    DeviceDiscovered {
        device: Device,
    },
    /// Host pulled a report over the control channel.
    GetReport {
        device: Device,
        report_type: u8,
        report_id: u8,
        buffer_size: usize,
    },
    /// Host unplugged the virtual cable; the link is gone for good.
    VirtualCableUnplug {
        device: Device,
    },
}

pub trait ClassicHost {
    /// Acquire the adapter and the HID device profile proxy.
    async fn open(&mut self) -> Result<(), HostError>;

    /// Register the SDP record and QoS for the HID app. Resolves when the
    /// platform confirms the registration.
    async fn register_app(
        &mut self,
        sdp: &SdpSettings,
        qos_in: &QosSettings,
        qos_out: &QosSettings,
    ) -> Result<(), HostError>;

    fn unregister_app(&mut self);

    /// True when the platform accepted the connection request; the outcome
    /// arrives later as a `ConnectionStateChanged` event.
    fn connect(&mut self, device: &Device) -> bool;

    fn disconnect(&mut self, device: &Device) -> bool;

    /// Push an input report over the interrupt channel, best-effort.
    fn send_report(&mut self, device: &Device, report_id: u8, payload: &[u8]) -> bool;

    /// Answer a `GetReport` on the control channel.
    fn reply_report(
        &mut self,
        device: &Device,
        report_type: u8,
        report_id: u8,
        payload: &[u8],
    ) -> bool;

    async fn start_scan(&mut self) -> Result<(), HostError>;

    async fn stop_scan(&mut self) -> Result<(), HostError>;

    async fn next_event(&mut self) -> ClassicHostEvent;
}
