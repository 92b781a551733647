//! Device identity and per-transport connection bookkeeping.

use core::fmt;

use heapless::{index_map::FnvIndexMap, String};

use crate::state::ConnectionState;

/// Capacity of the per-transport connected-device map.
pub const MAX_CONNECTED_DEVICES: usize = 4;
pub const MAX_DEVICE_NAME_LEN: usize = 24;

/// Bluetooth device address, the stable identity of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Address(pub [u8; 6]);

impl Address {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Address {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}:{=u8:02X}",
            self.0[0],
            self.0[1],
            self.0[2],
            self.0[3],
            self.0[4],
            self.0[5]
        )
    }
}

/// A peer device as seen by a transport. Cheap to clone, carried in events.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Device {
    pub address: Address,
    pub name: Option<String<MAX_DEVICE_NAME_LEN>>,
}

impl Device {
    pub fn new(address: Address) -> Self {
        Self { address, name: None }
    }

    /// Overlong names are truncated at a character boundary.
    pub fn with_name(address: Address, name: &str) -> Self {
        let mut truncated = String::new();
        for c in name.chars() {
            if truncated.push(c).is_err() {
                break;
            }
        }
        Self {
            address,
            name: Some(truncated),
        }
    }
}

/// Connection bookkeeping for one transport: the connected-device map plus
/// single connecting/disconnecting slots. Owned and mutated only by the
/// transport's run loop; a device entry lives until it disconnects or the
/// transport deactivates.
pub(crate) struct ConnectionTracker {
    connected: FnvIndexMap<Address, Device, MAX_CONNECTED_DEVICES>,
    connecting: Option<Device>,
    disconnecting: Option<Device>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            connected: FnvIndexMap::new(),
            connecting: None,
            disconnecting: None,
        }
    }

    pub fn begin_connecting(&mut self, device: Device) {
        self.connecting = Some(device);
    }

    pub fn connecting(&self) -> Option<&Device> {
        self.connecting.as_ref()
    }

    pub fn clear_connecting(&mut self) -> Option<Device> {
        self.connecting.take()
    }

    pub fn is_connecting(&self, address: &Address) -> bool {
        self.connecting.as_ref().is_some_and(|d| d.address == *address)
    }

    /// Move a device into the connected map, clearing the connecting slot
    /// when it refers to the same peer. Returns false when the device was
    /// already connected (or the map is full), in which case no connection
    /// event should be fired.
    pub fn finalize(&mut self, device: Device) -> bool {
        if self.is_connecting(&device.address) {
            self.connecting = None;
        }
        match self.connected.insert(device.address, device) {
            Ok(previous) => previous.is_none(),
            Err(_) => false,
        }
    }

    /// Park a connected device in the disconnecting slot until the platform
    /// confirms the link is down.
    pub fn begin_disconnecting(&mut self, address: &Address) -> Option<Device> {
        let device = self.connected.remove(address)?;
        self.disconnecting = Some(device.clone());
        Some(device)
    }

    /// Drop a device from whichever slot holds it. Returns the device when
    /// the transport actually tracked it, i.e. when a disconnected event
    /// should be fired.
    pub fn remove(&mut self, address: &Address) -> Option<Device> {
        if let Some(device) = self.connected.remove(address) {
            return Some(device);
        }
        if self.disconnecting.as_ref().is_some_and(|d| d.address == *address) {
            return self.disconnecting.take();
        }
        if self.is_connecting(address) {
            return self.connecting.take();
        }
        None
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.connected.contains_key(address)
    }

    pub fn connected_devices(&self) -> impl Iterator<Item = &Device> {
        self.connected.values()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    /// Connected plus connecting devices; per transport this never exceeds 1
    /// while seeking stops on connect.
    pub fn active_count(&self) -> usize {
        self.connected.len() + usize::from(self.connecting.is_some())
    }

    pub fn clear(&mut self) {
        self.connected.clear();
        self.connecting = None;
        self.disconnecting = None;
    }

    pub fn state(&self, seeking: bool) -> ConnectionState {
        if self.disconnecting.is_some() {
            ConnectionState::Disconnecting
        } else if self.connecting.is_some() {
            ConnectionState::Connecting
        } else if !self.connected.is_empty() {
            ConnectionState::Connected
        } else if seeking {
            ConnectionState::Seeking
        } else {
            ConnectionState::Idle
        }
    }

    pub fn state_of(&self, address: &Address) -> ConnectionState {
        if self.connected.contains_key(address) {
            ConnectionState::Connected
        } else if self.is_connecting(address) {
            ConnectionState::Connecting
        } else if self.disconnecting.as_ref().is_some_and(|d| d.address == *address) {
            ConnectionState::Disconnecting
        } else {
            ConnectionState::Idle
        }
    }
}
