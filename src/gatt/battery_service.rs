//! Battery service (0x180F).
//!
//! Reports a fixed 100% level. The host platform owns the real battery
//! gauge; surfacing a constant keeps HID hosts that insist on the service
//! happy without plumbing power telemetry through the stack.

use heapless::Vec;

use super::uuids::{CharacteristicUuid, ServiceUuid};
use super::{
    AttHandle, CharacteristicDef, CharacteristicHandles, DescriptorDef, GattServiceHandler,
    Properties, ReadReply, ServiceDef, WriteReply, ENABLE_NOTIFICATION_VALUE,
};

pub const BATTERY_LEVEL: u8 = 0x64;

pub(crate) struct BatteryService {
    level_handle: AttHandle,
    cccd_handle: AttHandle,
    cccd: Vec<u8, 2>,
}

impl BatteryService {
    pub(crate) fn new() -> Self {
        let mut cccd = Vec::new();
        cccd.extend_from_slice(&ENABLE_NOTIFICATION_VALUE).ok();
        Self {
            level_handle: 0,
            cccd_handle: 0,
            cccd,
        }
    }
}

impl GattServiceHandler for BatteryService {
    fn setup(&mut self) -> Option<ServiceDef> {
        Some(
            ServiceDef::new(ServiceUuid::BatteryService.uuid()).with_characteristic(
                CharacteristicDef::new(
                    CharacteristicUuid::BatteryLevel.uuid(),
                    Properties::new().read().notify(),
                )
                .with_value(&[BATTERY_LEVEL])
                .with_descriptor(DescriptorDef::cccd()),
            ),
        )
    }

    fn bind(&mut self, handles: &[CharacteristicHandles]) {
        if let Some(level) = handles.first() {
            self.level_handle = level.value_handle;
            if let Some(&cccd) = level.descriptor_handles.first() {
                self.cccd_handle = cccd;
            }
        }
    }

    fn on_characteristic_read(&mut self, handle: AttHandle, _offset: usize) -> Option<ReadReply> {
        if handle == self.level_handle {
            Some(ReadReply::success(&[BATTERY_LEVEL]))
        } else {
            None
        }
    }

    fn on_characteristic_write(&mut self, _handle: AttHandle, _value: &[u8]) -> Option<WriteReply> {
        None
    }

    fn on_descriptor_read(&mut self, handle: AttHandle, _offset: usize) -> Option<ReadReply> {
        if handle == self.cccd_handle {
            Some(ReadReply::success(&self.cccd))
        } else {
            None
        }
    }

    fn on_descriptor_write(&mut self, handle: AttHandle, value: &[u8]) -> Option<WriteReply> {
        if handle == self.cccd_handle {
            self.cccd.clear();
            let n = value.len().min(self.cccd.capacity());
            self.cccd.extend_from_slice(&value[..n]).ok();
            Some(WriteReply::success())
        } else {
            None
        }
    }
}
