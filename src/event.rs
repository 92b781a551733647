//! Events published by the transports and the facade.
//!
//! Transports push [`ConnectionEvent`]s to the facade over an internal
//! channel; the facade republishes them on the public broadcast channel.
//! Advertising and discovery streams are published straight from their
//! transports.

use crate::connection::Device;
use crate::host::HostError;
use crate::state::TransportKind;

/// Connection lifecycle, unified across transports.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    Connecting {
        transport: TransportKind,
        device: Device,
    },
    Connected {
        transport: TransportKind,
        device: Device,
    },
    Disconnected {
        transport: TransportKind,
        device: Device,
    },
    /// A connection attempt failed. The facade clears its connecting pointer
    /// on this event so the caller can retry.
    ConnectionError {
        transport: TransportKind,
        device: Device,
        reason: &'static str,
    },
}

impl ConnectionEvent {
    pub fn transport(&self) -> TransportKind {
        match self {
            ConnectionEvent::Connecting { transport, .. }
            | ConnectionEvent::Connected { transport, .. }
            | ConnectionEvent::Disconnected { transport, .. }
            | ConnectionEvent::ConnectionError { transport, .. } => *transport,
        }
    }

    pub fn device(&self) -> &Device {
        match self {
            ConnectionEvent::Connecting { device, .. }
            | ConnectionEvent::Connected { device, .. }
            | ConnectionEvent::Disconnected { device, .. }
            | ConnectionEvent::ConnectionError { device, .. } => device,
        }
    }
}

/// Advertising session lifecycle (BLE transport).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingEvent {
    Started,
    Stopped,
    Failed(HostError),
}

/// Device discovery stream (classic transport).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryEvent {
    Started,
    DeviceDetected(Device),
    Finished,
}
