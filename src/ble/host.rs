//! Platform abstraction for the BLE stack.
//!
//! The transport drives everything through [`BleHost`]; a platform crate
//! implements it over the native adapter and GATT server. Requests and state
//! changes surface as [`BleHostEvent`]s pulled from `next_event`.

use heapless::Vec;

use crate::connection::Device;
use crate::gatt::uuids::Uuid;
use crate::gatt::{AttHandle, CharacteristicDef, CharacteristicHandles, GattStatus, RequestId, MAX_ATTRIBUTE_VALUE};
use crate::host::HostError;
use crate::state::{BondState, LinkState};

/// Platform token for a staged service.
pub type ServiceHandle = u16;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleHostEvent {
    ConnectionStateChanged {
        device: Device,
        state: LinkState,
    },
    BondStateChanged {
        device: Device,
        bond: BondState,
    },
    CharacteristicReadRequest {
        device: Device,
        request: RequestId,
        handle: AttHandle,
        offset: usize,
    },
    CharacteristicWriteRequest {
        device: Device,
        request: RequestId,
        handle: AttHandle,
        value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
        response_needed: bool,
    },
    DescriptorReadRequest {
        device: Device,
        request: RequestId,
        handle: AttHandle,
        offset: usize,
    },
    DescriptorWriteRequest {
        device: Device,
        request: RequestId,
        handle: AttHandle,
        value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
        response_needed: bool,
    },
}

pub trait BleHost {
    /// Whether the adapter can advertise at all. Checked before `open`.
    fn advertising_supported(&self) -> bool;

    /// Bring up the adapter and GATT server.
    async fn open(&mut self) -> Result<(), HostError>;

    /// Stage an empty service. Attributes are added before registration.
    fn create_service(&mut self, uuid: Uuid) -> Result<ServiceHandle, HostError>;

    /// Add one characteristic with its descriptors to a staged service.
    /// Platform stacks are known to fail this spuriously under load; callers
    /// retry a few times before giving up.
    fn add_characteristic(
        &mut self,
        service: ServiceHandle,
        def: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, HostError>;

    /// Commit a staged service. Resolves when the platform confirms it.
    async fn register_service(&mut self, service: ServiceHandle) -> Result<(), HostError>;

    async fn start_advertising(
        &mut self,
        adv_data: &[u8],
        scan_response: &[u8],
    ) -> Result<(), HostError>;

    async fn stop_advertising(&mut self) -> Result<(), HostError>;

    /// Best-effort notification; false means the packet was not queued.
    fn notify(&mut self, device: &Device, value_handle: AttHandle, payload: &[u8]) -> bool;

    /// Answer a read or write request.
    fn send_response(
        &mut self,
        device: &Device,
        request: RequestId,
        status: GattStatus,
        offset: usize,
        payload: &[u8],
    ) -> Result<(), HostError>;

    /// Tear down one connection. Completion arrives as a
    /// `ConnectionStateChanged(Disconnected)` event.
    fn cancel_connection(&mut self, device: &Device) -> Result<(), HostError>;

    /// Release the adapter.
    fn close(&mut self);

    async fn next_event(&mut self) -> BleHostEvent;
}
