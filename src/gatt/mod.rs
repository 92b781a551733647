//! GATT attribute model and service handlers.
//!
//! Services are declared as plain data ([`ServiceDef`]) by their handlers,
//! staged into the platform stack by the BLE transport, and addressed
//! afterwards through the 16-bit handles the stack allocated. Request
//! dispatch walks the handlers first-match-wins; whatever no handler claims
//! is answered from the attribute registry's last known value.

pub mod battery_service;
pub mod device_info;
pub mod hid_service;
pub mod uuids;

use heapless::Vec;

use uuids::{DescriptorUuid, Uuid};

/// ATT handle allocated by the platform stack.
pub type AttHandle = u16;
/// Token identifying a pending request, echoed back in the response.
pub type RequestId = u32;

pub const MAX_CHARACTERISTICS: usize = 8;
pub const MAX_DESCRIPTORS: usize = 2;
/// Longest stored attribute value. Device info strings are clamped to this;
/// the report map is served from its own const, never from attribute storage.
pub const MAX_ATTRIBUTE_VALUE: usize = 20;
/// Longest read reply payload (the full report map fits).
pub const MAX_READ_PAYLOAD: usize = 128;

/// Status byte for responses; zero is GATT success.
pub type GattStatus = u8;
pub const GATT_SUCCESS: GattStatus = 0;
pub const GATT_FAILURE: GattStatus = 0x01;

/// CCCD value with the notifications bit set; report and battery CCCDs are
/// preset to this so sluggish hosts get notifications without subscribing.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Characteristic property bitmask, GATT bit assignments.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Properties(u8);

impl Properties {
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn read(self) -> Self {
        Self(self.0 | Self::READ)
    }

    pub const fn write(self) -> Self {
        Self(self.0 | Self::WRITE)
    }

    pub const fn write_without_response(self) -> Self {
        Self(self.0 | Self::WRITE_WITHOUT_RESPONSE)
    }

    pub const fn notify(self) -> Self {
        Self(self.0 | Self::NOTIFY)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }
}

/// Report class encoded in a Report Reference descriptor, derived from the
/// owning characteristic's property bitmask. Never stored anywhere.
pub fn report_type_of(properties: Properties) -> u8 {
    if properties.contains(Properties::NOTIFY) {
        0x01 // input
    } else if properties.contains(Properties::WRITE_WITHOUT_RESPONSE) {
        0x02 // output
    } else {
        0x03 // feature
    }
}

#[derive(Clone, Debug)]
pub struct DescriptorDef {
    pub uuid: Uuid,
    pub initial_value: Vec<u8, 2>,
}

impl DescriptorDef {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            initial_value: Vec::new(),
        }
    }

    pub fn cccd() -> Self {
        Self::new(DescriptorUuid::ClientCharacteristicConfiguration.uuid())
            .with_value(&ENABLE_NOTIFICATION_VALUE)
    }

    pub fn report_reference() -> Self {
        // Value is derived at read time, nothing to store.
        Self::new(DescriptorUuid::ReportReference.uuid())
    }

    pub fn with_value(mut self, value: &[u8]) -> Self {
        self.initial_value.clear();
        let n = value.len().min(self.initial_value.capacity());
        // Fits by construction
        self.initial_value.extend_from_slice(&value[..n]).ok();
        self
    }
}

#[derive(Clone, Debug)]
pub struct CharacteristicDef {
    pub uuid: Uuid,
    pub properties: Properties,
    pub initial_value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
    pub descriptors: Vec<DescriptorDef, MAX_DESCRIPTORS>,
}

impl CharacteristicDef {
    pub fn new(uuid: Uuid, properties: Properties) -> Self {
        Self {
            uuid,
            properties,
            initial_value: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Initial value, clamped to [`MAX_ATTRIBUTE_VALUE`] bytes.
    pub fn with_value(mut self, value: &[u8]) -> Self {
        self.initial_value.clear();
        let n = value.len().min(MAX_ATTRIBUTE_VALUE);
        self.initial_value.extend_from_slice(&value[..n]).ok();
        self
    }

    pub fn with_descriptor(mut self, descriptor: DescriptorDef) -> Self {
        self.descriptors.push(descriptor).ok();
        self
    }
}

#[derive(Clone, Debug)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDef, MAX_CHARACTERISTICS>,
}

impl ServiceDef {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, def: CharacteristicDef) -> Self {
        self.characteristics.push(def).ok();
        self
    }
}

/// Handles the platform allocated for one characteristic; descriptor handles
/// are parallel to the def's descriptor order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandles {
    pub value_handle: AttHandle,
    pub descriptor_handles: Vec<AttHandle, MAX_DESCRIPTORS>,
}

/// Reply to a read request. The transport sends it back with the request's
/// offset already applied by the handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadReply {
    pub status: GattStatus,
    pub value: Vec<u8, MAX_READ_PAYLOAD>,
}

impl ReadReply {
    pub fn success(value: &[u8]) -> Self {
        let mut reply = Self {
            status: GATT_SUCCESS,
            value: Vec::new(),
        };
        let n = value.len().min(MAX_READ_PAYLOAD);
        reply.value.extend_from_slice(&value[..n]).ok();
        reply
    }
}

/// Acknowledgement of a handled write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteReply {
    pub status: GattStatus,
}

impl WriteReply {
    pub fn success() -> Self {
        Self {
            status: GATT_SUCCESS,
        }
    }
}

/// One GATT service: declares its attributes, then answers the requests and
/// pump polls routed to it. Handlers are walked in registration order and
/// the first `Some` wins; `None` passes the request along.
pub trait GattServiceHandler {
    /// The service to register, or none for a pure observer.
    fn setup(&mut self) -> Option<ServiceDef>;

    /// Receive the platform handles, in `setup()` characteristic order.
    fn bind(&mut self, handles: &[CharacteristicHandles]);

    fn on_characteristic_read(&mut self, handle: AttHandle, offset: usize) -> Option<ReadReply>;

    fn on_characteristic_write(&mut self, handle: AttHandle, value: &[u8]) -> Option<WriteReply>;

    fn on_descriptor_read(&mut self, handle: AttHandle, offset: usize) -> Option<ReadReply>;

    fn on_descriptor_write(&mut self, handle: AttHandle, value: &[u8]) -> Option<WriteReply>;

    /// Queue an input report, if this handler owns an input pipeline.
    fn add_input_report(&mut self, report_id: u8, payload: &[u8]) {
        let _ = (report_id, payload);
    }

    /// Pop at most one queued report, paired with the characteristic handle
    /// to notify. Called once per pump tick.
    fn poll_input_report(&mut self) -> Option<(AttHandle, Vec<u8, { crate::hid::MAX_REPORT_LEN }>)> {
        None
    }
}

struct RegisteredAttribute {
    handle: AttHandle,
    value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
}

/// Fallback store behind the handlers: the last known value of every
/// registered attribute. Serves reads nobody claims and absorbs writes
/// nobody claims.
pub(crate) struct AttributeRegistry {
    attributes: Vec<RegisteredAttribute, 24>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    pub fn record(&mut self, handle: AttHandle, initial_value: &[u8]) {
        let mut value = Vec::new();
        let n = initial_value.len().min(MAX_ATTRIBUTE_VALUE);
        value.extend_from_slice(&initial_value[..n]).ok();
        if self.attributes.push(RegisteredAttribute { handle, value }).is_err() {
            warn!("attribute registry full, handle {} not tracked", handle);
        }
    }

    pub fn value_of(&self, handle: AttHandle) -> Option<&[u8]> {
        self.attributes
            .iter()
            .find(|attribute| attribute.handle == handle)
            .map(|attribute| attribute.value.as_slice())
    }

    /// Replace the stored value. Returns false for an unknown handle.
    pub fn store(&mut self, handle: AttHandle, value: &[u8]) -> bool {
        let Some(attribute) = self
            .attributes
            .iter_mut()
            .find(|attribute| attribute.handle == handle)
        else {
            return false;
        };
        attribute.value.clear();
        let n = value.len().min(MAX_ATTRIBUTE_VALUE);
        attribute.value.extend_from_slice(&value[..n]).ok();
        true
    }
}
