use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Transport currently holding the connection:
/// - 0: none
/// - 1: BLE
/// - 2: Classic
pub(crate) static ACTIVE_TRANSPORT: AtomicU8 = AtomicU8::new(0);
/// Whether the BLE transport is currently advertising
pub(crate) static BLE_ADVERTISING: AtomicBool = AtomicBool::new(false);
/// Whether the classic transport is currently discovering devices
pub(crate) static CLASSIC_SCANNING: AtomicBool = AtomicBool::new(false);

/// The two radio transports a host can reach us over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportKind {
    Ble,
    Classic,
}

impl From<TransportKind> for u8 {
    fn from(value: TransportKind) -> Self {
        match value {
            TransportKind::Ble => 1,
            TransportKind::Classic => 2,
        }
    }
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Ble => "BLE",
            TransportKind::Classic => "Classic",
        }
    }
}

/// Per-transport connection phase.
///
/// `Seeking` covers both BLE advertising and classic device discovery; the
/// `Connecting -> Connected` edge goes through the bonding handshake when the
/// peer is not bonded yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Idle,
    Seeking,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Seeking => "seeking",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

/// Link state as reported by the platform stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Disconnecting => "disconnecting",
        }
    }
}

/// Bond state as reported by the platform stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

impl BondState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BondState::None => "none",
            BondState::Bonding => "bonding",
            BondState::Bonded => "bonded",
        }
    }
}

/// Transport the current connection lives on, if any.
pub fn active_transport() -> Option<TransportKind> {
    match ACTIVE_TRANSPORT.load(Ordering::Acquire) {
        1 => Some(TransportKind::Ble),
        2 => Some(TransportKind::Classic),
        _ => None,
    }
}

pub(crate) fn set_active_transport(transport: Option<TransportKind>) {
    ACTIVE_TRANSPORT.store(transport.map(u8::from).unwrap_or(0), Ordering::Release);
}

/// Whether the BLE transport is currently advertising.
pub fn is_advertising() -> bool {
    BLE_ADVERTISING.load(Ordering::Acquire)
}

/// Whether the classic transport is currently discovering devices.
pub fn is_scanning() -> bool {
    CLASSIC_SCANNING.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_round_trip() {
        assert_eq!(u8::from(TransportKind::Ble), 1);
        assert_eq!(u8::from(TransportKind::Classic), 2);
    }

    #[test]
    fn state_labels() {
        assert_eq!(ConnectionState::Idle.as_str(), "idle");
        assert_eq!(ConnectionState::Seeking.as_str(), "seeking");
        assert_eq!(ConnectionState::Disconnecting.as_str(), "disconnecting");
        assert_eq!(BondState::Bonded.as_str(), "bonded");
        assert_eq!(LinkState::Connecting.as_str(), "connecting");
    }
}
