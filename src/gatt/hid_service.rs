//! HID service (0x1812), HID over GATT profile.
//!
//! Declares the full characteristic set of a boot-capable composite device:
//! HID info, report map, protocol mode, control point, two input reports
//! and one output report. The handler itself answers only HID info and
//! report map reads plus its own descriptors; protocol mode, control point
//! and output writes are absorbed by the attribute registry so hosts that
//! poke them never see an error.

use heapless::{Deque, Vec};

use crate::hid::{KEYBOARD_REPORT_ID, MAX_REPORT_LEN, POINTER_REPORT_ID};

use super::uuids::{CharacteristicUuid, ServiceUuid};
use super::{
    report_type_of, AttHandle, CharacteristicDef, CharacteristicHandles, DescriptorDef,
    GattServiceHandler, Properties, ReadReply, ServiceDef, WriteReply,
};

/// bcdHID 1.11, no country code, remote wake + normally connectable.
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, 0x03];
/// Report protocol mode.
pub const PROTOCOL_MODE_REPORT: u8 = 0x01;

const INPUT_QUEUE_LEN: usize = 8;

/// One report characteristic: its wire id, declared properties and the
/// handles the stack gave it.
struct ReportSlot {
    report_id: u8,
    properties: Properties,
    value_handle: AttHandle,
    cccd_handle: Option<AttHandle>,
    reference_handle: Option<AttHandle>,
    cccd: Vec<u8, 2>,
}

impl ReportSlot {
    fn new(report_id: u8, properties: Properties) -> Self {
        let mut cccd = Vec::new();
        cccd.extend_from_slice(&super::ENABLE_NOTIFICATION_VALUE).ok();
        Self {
            report_id,
            properties,
            value_handle: 0,
            cccd_handle: None,
            reference_handle: None,
            cccd,
        }
    }
}

pub(crate) struct HidService {
    report_map: &'static [u8],
    hid_info_handle: AttHandle,
    report_map_handle: AttHandle,
    // Keyboard input, pointer input, output
    slots: [ReportSlot; 3],
    queue: Deque<(AttHandle, Vec<u8, MAX_REPORT_LEN>), INPUT_QUEUE_LEN>,
}

impl HidService {
    pub(crate) fn new(report_map: &'static [u8]) -> Self {
        let input = Properties::new().read().notify();
        let output = Properties::new().read().write().write_without_response();
        Self {
            report_map,
            hid_info_handle: 0,
            report_map_handle: 0,
            slots: [
                ReportSlot::new(KEYBOARD_REPORT_ID, input),
                ReportSlot::new(POINTER_REPORT_ID, input),
                ReportSlot::new(0, output),
            ],
            queue: Deque::new(),
        }
    }

    /// Handle an input report will be notified on, by wire report id.
    pub(crate) fn input_handle(&self, report_id: u8) -> Option<AttHandle> {
        self.slots
            .iter()
            .find(|slot| {
                slot.report_id == report_id && slot.properties.contains(Properties::NOTIFY)
            })
            .map(|slot| slot.value_handle)
    }
}

impl GattServiceHandler for HidService {
    fn setup(&mut self) -> Option<ServiceDef> {
        let input = Properties::new().read().notify();
        let output = Properties::new().read().write().write_without_response();
        Some(
            ServiceDef::new(ServiceUuid::HidService.uuid())
                .with_characteristic(
                    CharacteristicDef::new(
                        CharacteristicUuid::HidInfo.uuid(),
                        Properties::new().read(),
                    )
                    .with_value(&HID_INFORMATION),
                )
                .with_characteristic(CharacteristicDef::new(
                    CharacteristicUuid::ReportMap.uuid(),
                    Properties::new().read(),
                ))
                .with_characteristic(
                    CharacteristicDef::new(
                        CharacteristicUuid::ProtocolMode.uuid(),
                        Properties::new().read().write_without_response(),
                    )
                    .with_value(&[PROTOCOL_MODE_REPORT]),
                )
                .with_characteristic(CharacteristicDef::new(
                    CharacteristicUuid::HidControlPoint.uuid(),
                    Properties::new().write_without_response(),
                ))
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::HidReport.uuid(), input)
                        .with_value(&[0; 8])
                        .with_descriptor(DescriptorDef::cccd())
                        .with_descriptor(DescriptorDef::report_reference()),
                )
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::HidReport.uuid(), input)
                        .with_value(&[0; 5])
                        .with_descriptor(DescriptorDef::cccd())
                        .with_descriptor(DescriptorDef::report_reference()),
                )
                .with_characteristic(
                    CharacteristicDef::new(CharacteristicUuid::HidReport.uuid(), output)
                        .with_value(&[0x00])
                        .with_descriptor(DescriptorDef::report_reference()),
                ),
        )
    }

    fn bind(&mut self, handles: &[CharacteristicHandles]) {
        // Setup order: info, map, protocol mode, control point, then reports
        if let Some(info) = handles.first() {
            self.hid_info_handle = info.value_handle;
        }
        if let Some(map) = handles.get(1) {
            self.report_map_handle = map.value_handle;
        }
        for (slot, characteristic) in self.slots.iter_mut().zip(handles.iter().skip(4)) {
            slot.value_handle = characteristic.value_handle;
            if slot.properties.contains(Properties::NOTIFY) {
                slot.cccd_handle = characteristic.descriptor_handles.first().copied();
                slot.reference_handle = characteristic.descriptor_handles.get(1).copied();
            } else {
                slot.cccd_handle = None;
                slot.reference_handle = characteristic.descriptor_handles.first().copied();
            }
        }
    }

    fn on_characteristic_read(&mut self, handle: AttHandle, offset: usize) -> Option<ReadReply> {
        if handle == self.hid_info_handle {
            Some(ReadReply::success(&HID_INFORMATION))
        } else if handle == self.report_map_handle {
            // Long reads come in as offset continuations; past the end is an
            // empty success, not an error.
            if offset >= self.report_map.len() {
                Some(ReadReply::success(&[]))
            } else {
                Some(ReadReply::success(&self.report_map[offset..]))
            }
        } else {
            None
        }
    }

    fn on_characteristic_write(&mut self, _handle: AttHandle, _value: &[u8]) -> Option<WriteReply> {
        None
    }

    fn on_descriptor_read(&mut self, handle: AttHandle, _offset: usize) -> Option<ReadReply> {
        for slot in &self.slots {
            if slot.cccd_handle == Some(handle) {
                return Some(ReadReply::success(&slot.cccd));
            }
            if slot.reference_handle == Some(handle) {
                return Some(ReadReply::success(&[
                    slot.report_id,
                    report_type_of(slot.properties),
                ]));
            }
        }
        None
    }

    fn on_descriptor_write(&mut self, handle: AttHandle, value: &[u8]) -> Option<WriteReply> {
        for slot in self.slots.iter_mut() {
            if slot.cccd_handle == Some(handle) {
                slot.cccd.clear();
                let n = value.len().min(slot.cccd.capacity());
                slot.cccd.extend_from_slice(&value[..n]).ok();
                return Some(WriteReply::success());
            }
        }
        None
    }

    fn add_input_report(&mut self, report_id: u8, payload: &[u8]) {
        let Some(handle) = self.input_handle(report_id) else {
            warn!("no input characteristic for report id {}", report_id);
            return;
        };
        let mut value = Vec::new();
        let n = payload.len().min(MAX_REPORT_LEN);
        value.extend_from_slice(&payload[..n]).ok();
        if self.queue.push_back((handle, value)).is_err() {
            warn!("input report queue full, dropping report id {}", report_id);
        }
    }

    fn poll_input_report(&mut self) -> Option<(AttHandle, Vec<u8, MAX_REPORT_LEN>)> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::REPORT_MAP;

    fn bound_service() -> HidService {
        let mut service = HidService::new(&REPORT_MAP);
        let def = service.setup().unwrap();
        let mut handles = std::vec::Vec::new();
        let mut next = 30u16;
        for characteristic in &def.characteristics {
            let mut entry = CharacteristicHandles::default();
            entry.value_handle = next;
            next += 1;
            for _ in &characteristic.descriptors {
                entry.descriptor_handles.push(next).unwrap();
                next += 1;
            }
            handles.push(entry);
        }
        service.bind(&handles);
        service
    }

    #[test]
    fn declares_seven_characteristics() {
        let mut service = HidService::new(&REPORT_MAP);
        let def = service.setup().unwrap();
        assert_eq!(def.characteristics.len(), 7);
        assert_eq!(
            def.characteristics[0].uuid,
            CharacteristicUuid::HidInfo.uuid()
        );
        assert_eq!(
            def.characteristics[2].uuid,
            CharacteristicUuid::ProtocolMode.uuid()
        );
        assert_eq!(def.characteristics[2].initial_value.as_slice(), &[0x01]);
        // Inputs carry CCCD + reference, output only the reference
        assert_eq!(def.characteristics[4].descriptors.len(), 2);
        assert_eq!(def.characteristics[6].descriptors.len(), 1);
    }

    #[test]
    fn hid_info_read() {
        let mut service = bound_service();
        let reply = service.on_characteristic_read(30, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &HID_INFORMATION);
    }

    #[test]
    fn report_map_chunked_reads() {
        let mut service = bound_service();
        let reply = service.on_characteristic_read(31, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &REPORT_MAP[..]);
        let reply = service.on_characteristic_read(31, 100).unwrap();
        assert_eq!(reply.value.as_slice(), &REPORT_MAP[100..]);
        let reply = service.on_characteristic_read(31, REPORT_MAP.len() + 4).unwrap();
        assert!(reply.value.is_empty());
    }

    #[test]
    fn report_references_derive_from_properties() {
        let mut service = bound_service();
        // Handles: 30 info, 31 map, 32 mode, 33 control, 34 kbd (+35 cccd,
        // +36 ref), 37 ptr (+38 cccd, +39 ref), 40 out (+41 ref)
        let reply = service.on_descriptor_read(36, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &[KEYBOARD_REPORT_ID, 0x01]);
        let reply = service.on_descriptor_read(39, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &[POINTER_REPORT_ID, 0x01]);
        let reply = service.on_descriptor_read(41, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &[0x00, 0x02]);
    }

    #[test]
    fn cccd_writes_stick() {
        let mut service = bound_service();
        service.on_descriptor_write(35, &[0x00, 0x00]).unwrap();
        let reply = service.on_descriptor_read(35, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &[0x00, 0x00]);
        // Pointer CCCD untouched
        let reply = service.on_descriptor_read(38, 0).unwrap();
        assert_eq!(reply.value.as_slice(), &super::super::ENABLE_NOTIFICATION_VALUE);
    }

    #[test]
    fn input_queue_is_fifo_per_handle() {
        let mut service = bound_service();
        service.add_input_report(KEYBOARD_REPORT_ID, &[0, 0, 4, 0, 0, 0, 0, 0]);
        service.add_input_report(POINTER_REPORT_ID, &[0, 5, 0, 0, 0]);
        let (handle, payload) = service.poll_input_report().unwrap();
        assert_eq!(handle, 34);
        assert_eq!(payload.as_slice(), &[0, 0, 4, 0, 0, 0, 0, 0]);
        let (handle, payload) = service.poll_input_report().unwrap();
        assert_eq!(handle, 37);
        assert_eq!(payload.as_slice(), &[0, 5, 0, 0, 0]);
        assert!(service.poll_input_report().is_none());
    }

    #[test]
    fn unknown_report_id_is_dropped() {
        let mut service = bound_service();
        service.add_input_report(9, &[0xFF]);
        assert!(service.poll_input_report().is_none());
    }
}
