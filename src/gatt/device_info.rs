//! Device information service (0x180A).
//!
//! Serves the identity strings and PnP ID from [`PeripheralConfig`]. Strings
//! longer than [`DEVICE_INFO_MAX_LENGTH`] bytes are clamped at setup.

use heapless::Vec;

use crate::config::{DeviceIdentity, PnpId};

use super::uuids::{CharacteristicUuid, ServiceUuid};
use super::{
    AttHandle, CharacteristicDef, CharacteristicHandles, GattServiceHandler, Properties,
    ReadReply, ServiceDef, WriteReply,
};

pub const DEVICE_INFO_MAX_LENGTH: usize = 20;

fn clamped(value: &[u8]) -> Vec<u8, DEVICE_INFO_MAX_LENGTH> {
    let mut out = Vec::new();
    let n = value.len().min(DEVICE_INFO_MAX_LENGTH);
    out.extend_from_slice(&value[..n]).ok();
    out
}

pub(crate) struct DeviceInfoService {
    manufacturer: Vec<u8, DEVICE_INFO_MAX_LENGTH>,
    model: Vec<u8, DEVICE_INFO_MAX_LENGTH>,
    serial_number: Vec<u8, DEVICE_INFO_MAX_LENGTH>,
    pnp: [u8; 7],
    // Handles in setup order: manufacturer, model, serial, pnp
    handles: [AttHandle; 4],
}

impl DeviceInfoService {
    pub(crate) fn new(identity: &DeviceIdentity, pnp: &PnpId) -> Self {
        Self {
            manufacturer: clamped(identity.manufacturer.as_bytes()),
            model: clamped(identity.model.as_bytes()),
            serial_number: clamped(identity.serial_number.as_bytes()),
            pnp: pnp.to_bytes(),
            handles: [0; 4],
        }
    }
}

impl GattServiceHandler for DeviceInfoService {
    fn setup(&mut self) -> Option<ServiceDef> {
        let read = Properties::new().read();
        Some(
            ServiceDef::new(ServiceUuid::DeviceInformation.uuid())
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::ManufacturerName.uuid(), read)
                        .with_value(&self.manufacturer),
                )
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::ModelNumber.uuid(), read)
                        .with_value(&self.model),
                )
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::SerialNumber.uuid(), read)
                        .with_value(&self.serial_number),
                )
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::PnpId.uuid(), read)
                        .with_value(&self.pnp),
                ),
        )
    }

    fn bind(&mut self, handles: &[CharacteristicHandles]) {
        for (slot, characteristic) in self.handles.iter_mut().zip(handles) {
            *slot = characteristic.value_handle;
        }
    }

    fn on_characteristic_read(&mut self, handle: AttHandle, _offset: usize) -> Option<ReadReply> {
        let [manufacturer, model, serial, pnp] = self.handles;
        if handle == manufacturer {
            Some(ReadReply::success(&self.manufacturer))
        } else if handle == model {
            Some(ReadReply::success(&self.model))
        } else if handle == serial {
            Some(ReadReply::success(&self.serial_number))
        } else if handle == pnp {
            Some(ReadReply::success(&self.pnp))
        } else {
            None
        }
    }

    fn on_characteristic_write(&mut self, _handle: AttHandle, _value: &[u8]) -> Option<WriteReply> {
        None
    }

    fn on_descriptor_read(&mut self, _handle: AttHandle, _offset: usize) -> Option<ReadReply> {
        None
    }

    fn on_descriptor_write(&mut self, _handle: AttHandle, _value: &[u8]) -> Option<WriteReply> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_service(identity: DeviceIdentity) -> DeviceInfoService {
        let mut service = DeviceInfoService::new(&identity, &PnpId::default());
        let def = service.setup().unwrap();
        assert_eq!(def.characteristics.len(), 4);
        let handles: std::vec::Vec<CharacteristicHandles> = (20..24)
            .map(|handle| CharacteristicHandles {
                value_handle: handle,
                descriptor_handles: Vec::new(),
            })
            .collect();
        service.bind(&handles);
        service
    }

    #[test]
    fn serves_identity_strings() {
        let mut service = bound_service(DeviceIdentity::default());
        let reply = service.on_characteristic_read(20, 0).unwrap();
        assert_eq!(reply.value.as_slice(), b"hidlink");
        let reply = service.on_characteristic_read(22, 0).unwrap();
        assert_eq!(reply.value.as_slice(), b"00000001");
    }

    #[test]
    fn pnp_id_layout() {
        let mut service = bound_service(DeviceIdentity::default());
        let reply = service.on_characteristic_read(23, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &[0x01, 0xDB, 0xFD, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn long_strings_clamp_to_twenty_bytes() {
        let identity = DeviceIdentity {
            manufacturer: "a manufacturer name well past the limit",
            ..DeviceIdentity::default()
        };
        let mut service = bound_service(identity);
        let reply = service.on_characteristic_read(20, 0).unwrap();
        assert_eq!(reply.value.len(), DEVICE_INFO_MAX_LENGTH);
        assert_eq!(reply.value.as_slice(), b"a manufacturer name ");
    }
}
