//! Mock host implementations for tests and downstream development.
//!
//! Both mocks are driven by a const-initializable state value the test owns:
//! script platform behavior by pushing events into it, then assert against
//! the ordered call journal afterwards. `cancel_connection` and `disconnect`
//! synthesize the matching `Disconnected` event the way real stacks do, so
//! handoff scripts do not have to.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use futures::future::pending;
use heapless::Vec;

use crate::ble::host::{BleHost, BleHostEvent, ServiceHandle};
use crate::classic::host::{ClassicHost, ClassicHostEvent, QosSettings, SdpSettings};
use crate::connection::{Address, Device};
use crate::gatt::uuids::Uuid;
use crate::gatt::{
    AttHandle, CharacteristicDef, CharacteristicHandles, GattStatus, RequestId, MAX_READ_PAYLOAD,
};
use crate::host::HostError;
use crate::state::LinkState;
use crate::RawMutex;

const EVENT_QUEUE: usize = 16;
const JOURNAL_LEN: usize = 64;
const ALLOCATION_LEN: usize = 16;

/// One platform call as the BLE mock saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BleCall {
    Open,
    CreateService(Uuid),
    AddCharacteristic(Uuid),
    RegisterService(ServiceHandle),
    StartAdvertising {
        adv: Vec<u8, 31>,
        scan: Vec<u8, 31>,
    },
    StopAdvertising,
    Notify {
        device: Address,
        handle: AttHandle,
        payload: Vec<u8, 8>,
    },
    SendResponse {
        request: RequestId,
        status: GattStatus,
        offset: usize,
        payload: Vec<u8, MAX_READ_PAYLOAD>,
    },
    CancelConnection(Address),
    Close,
}

struct MockBleInner {
    journal: Vec<BleCall, JOURNAL_LEN>,
    allocations: Vec<(Uuid, CharacteristicHandles), ALLOCATION_LEN>,
    next_service: ServiceHandle,
    next_handle: AttHandle,
    advertising_supported: bool,
    open_error: Option<HostError>,
    add_characteristic_failures: usize,
    hang_register_service: bool,
    start_advertising_error: Option<HostError>,
    stop_advertising_error: Option<HostError>,
    cancel_connection_error: Option<HostError>,
    notify_ok: bool,
}

/// Shared state behind a [`MockBleHost`]. Const-initializable so tests can
/// keep it in a local `static`.
pub struct MockBleState {
    events: Channel<RawMutex, BleHostEvent, EVENT_QUEUE>,
    inner: Mutex<RawMutex, RefCell<MockBleInner>>,
}

impl MockBleState {
    pub const fn new() -> Self {
        Self {
            events: Channel::new(),
            inner: Mutex::new(RefCell::new(MockBleInner {
                journal: Vec::new(),
                allocations: Vec::new(),
                next_service: 0,
                next_handle: 0,
                advertising_supported: true,
                open_error: None,
                add_characteristic_failures: 0,
                hang_register_service: false,
                start_advertising_error: None,
                stop_advertising_error: None,
                cancel_connection_error: None,
                notify_ok: true,
            })),
        }
    }

    /// Script a platform event; the host under test sees it on `next_event`.
    pub fn push_event(&self, event: BleHostEvent) {
        if self.events.try_send(event).is_err() {
            panic!("mock BLE event queue full");
        }
    }

    pub fn calls(&self) -> Vec<BleCall, JOURNAL_LEN> {
        self.inner.lock(|inner| inner.borrow().journal.clone())
    }

    /// Drain the journal, returning everything recorded so far.
    pub fn take_calls(&self) -> Vec<BleCall, JOURNAL_LEN> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let calls = inner.journal.clone();
            inner.journal.clear();
            calls
        })
    }

    /// Handles allocated for the nth characteristic with this UUID, in
    /// registration order.
    pub fn characteristic(&self, uuid: Uuid, occurrence: usize) -> Option<CharacteristicHandles> {
        self.inner.lock(|inner| {
            inner
                .borrow()
                .allocations
                .iter()
                .filter(|(allocated, _)| *allocated == uuid)
                .nth(occurrence)
                .map(|(_, handles)| handles.clone())
        })
    }

    pub fn set_advertising_supported(&self, supported: bool) {
        self.inner
            .lock(|inner| inner.borrow_mut().advertising_supported = supported);
    }

    pub fn fail_open(&self, error: HostError) {
        self.inner.lock(|inner| inner.borrow_mut().open_error = Some(error));
    }

    /// The next `failures` add_characteristic calls fail.
    pub fn fail_add_characteristic(&self, failures: usize) {
        self.inner
            .lock(|inner| inner.borrow_mut().add_characteristic_failures = failures);
    }

    /// Make register_service never resolve.
    pub fn hang_register_service(&self) {
        self.inner
            .lock(|inner| inner.borrow_mut().hang_register_service = true);
    }

    pub fn fail_start_advertising(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().start_advertising_error = Some(error));
    }

    pub fn fail_stop_advertising(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().stop_advertising_error = Some(error));
    }

    pub fn fail_cancel_connection(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().cancel_connection_error = Some(error));
    }

    pub fn set_notify_result(&self, ok: bool) {
        self.inner.lock(|inner| inner.borrow_mut().notify_ok = ok);
    }

    fn record(&self, call: BleCall) {
        self.inner.lock(|inner| {
            if inner.borrow_mut().journal.push(call).is_err() {
                panic!("mock BLE journal full");
            }
        });
    }
}

impl Default for MockBleState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockBleHost {
    state: &'static MockBleState,
}

impl MockBleHost {
    pub fn new(state: &'static MockBleState) -> Self {
        Self { state }
    }
}

impl BleHost for MockBleHost {
    fn advertising_supported(&self) -> bool {
        self.state
            .inner
            .lock(|inner| inner.borrow().advertising_supported)
    }

    async fn open(&mut self) -> Result<(), HostError> {
        self.state.record(BleCall::Open);
        match self.state.inner.lock(|inner| inner.borrow_mut().open_error.take()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_service(&mut self, uuid: Uuid) -> Result<ServiceHandle, HostError> {
        self.state.record(BleCall::CreateService(uuid));
        Ok(self.state.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            inner.next_service += 1;
            inner.next_service
        }))
    }

    fn add_characteristic(
        &mut self,
        _service: ServiceHandle,
        def: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, HostError> {
        self.state.record(BleCall::AddCharacteristic(def.uuid));
        self.state.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.add_characteristic_failures > 0 {
                inner.add_characteristic_failures -= 1;
                return Err(HostError::Busy);
            }
            inner.next_handle += 1;
            let mut handles = CharacteristicHandles {
                value_handle: inner.next_handle,
                descriptor_handles: Vec::new(),
            };
            for _ in &def.descriptors {
                inner.next_handle += 1;
                handles.descriptor_handles.push(inner.next_handle).ok();
            }
            if inner.allocations.push((def.uuid, handles.clone())).is_err() {
                return Err(HostError::Failure);
            }
            Ok(handles)
        })
    }

    async fn register_service(&mut self, service: ServiceHandle) -> Result<(), HostError> {
        self.state.record(BleCall::RegisterService(service));
        let hang = self
            .state
            .inner
            .lock(|inner| inner.borrow().hang_register_service);
        if hang {
            pending::<()>().await;
        }
        Ok(())
    }

    async fn start_advertising(
        &mut self,
        adv_data: &[u8],
        scan_response: &[u8],
    ) -> Result<(), HostError> {
        let mut adv = Vec::new();
        adv.extend_from_slice(adv_data).ok();
        let mut scan = Vec::new();
        scan.extend_from_slice(scan_response).ok();
        self.state.record(BleCall::StartAdvertising { adv, scan });
        match self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().start_advertising_error.take())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn stop_advertising(&mut self) -> Result<(), HostError> {
        self.state.record(BleCall::StopAdvertising);
        match self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().stop_advertising_error.take())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn notify(&mut self, device: &Device, value_handle: AttHandle, payload: &[u8]) -> bool {
        let mut copy = Vec::new();
        copy.extend_from_slice(payload).ok();
        self.state.record(BleCall::Notify {
            device: device.address,
            handle: value_handle,
            payload: copy,
        });
        self.state.inner.lock(|inner| inner.borrow().notify_ok)
    }

    fn send_response(
        &mut self,
        _device: &Device,
        request: RequestId,
        status: GattStatus,
        offset: usize,
        payload: &[u8],
    ) -> Result<(), HostError> {
        let mut copy = Vec::new();
        copy.extend_from_slice(payload).ok();
        self.state.record(BleCall::SendResponse {
            request,
            status,
            offset,
            payload: copy,
        });
        Ok(())
    }

    fn cancel_connection(&mut self, device: &Device) -> Result<(), HostError> {
        self.state.record(BleCall::CancelConnection(device.address));
        if let Some(error) = self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().cancel_connection_error.take())
        {
            return Err(error);
        }
        // Real stacks confirm asynchronously
        self.state.push_event(BleHostEvent::ConnectionStateChanged {
            device: device.clone(),
            state: LinkState::Disconnected,
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state.record(BleCall::Close);
    }

    async fn next_event(&mut self) -> BleHostEvent {
        self.state.events.receive().await
    }
}

/// One platform call as the classic mock saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassicCall {
    Open,
    RegisterApp {
        subclass: u8,
    },
    UnregisterApp,
    Connect(Address),
    Disconnect(Address),
    SendReport {
        device: Address,
        report_id: u8,
        payload: Vec<u8, 8>,
    },
    ReplyReport {
        device: Address,
        report_type: u8,
        report_id: u8,
        payload: Vec<u8, 8>,
    },
    StartScan,
    StopScan,
}

struct MockClassicInner {
    journal: Vec<ClassicCall, JOURNAL_LEN>,
    open_error: Option<HostError>,
    register_app_error: Option<HostError>,
    start_scan_error: Option<HostError>,
    stop_scan_error: Option<HostError>,
    refuse_connect: bool,
    refuse_disconnect: bool,
    send_report_ok: bool,
    reply_report_ok: bool,
}

/// Shared state behind a [`MockClassicHost`].
pub struct MockClassicState {
    events: Channel<RawMutex, ClassicHostEvent, EVENT_QUEUE>,
    inner: Mutex<RawMutex, RefCell<MockClassicInner>>,
}

impl MockClassicState {
    pub const fn new() -> Self {
        Self {
            events: Channel::new(),
            inner: Mutex::new(RefCell::new(MockClassicInner {
                journal: Vec::new(),
                open_error: None,
                register_app_error: None,
                start_scan_error: None,
                stop_scan_error: None,
                refuse_connect: false,
                refuse_disconnect: false,
                send_report_ok: true,
                reply_report_ok: true,
            })),
        }
    }

    pub fn push_event(&self, event: ClassicHostEvent) {
        if self.events.try_send(event).is_err() {
            panic!("mock classic event queue full");
        }
    }

    pub fn calls(&self) -> Vec<ClassicCall, JOURNAL_LEN> {
        self.inner.lock(|inner| inner.borrow().journal.clone())
    }

    pub fn take_calls(&self) -> Vec<ClassicCall, JOURNAL_LEN> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let calls = inner.journal.clone();
            inner.journal.clear();
            calls
        })
    }

    pub fn fail_open(&self, error: HostError) {
        self.inner.lock(|inner| inner.borrow_mut().open_error = Some(error));
    }

    pub fn fail_register_app(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().register_app_error = Some(error));
    }

    pub fn fail_start_scan(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().start_scan_error = Some(error));
    }

    pub fn fail_stop_scan(&self, error: HostError) {
        self.inner
            .lock(|inner| inner.borrow_mut().stop_scan_error = Some(error));
    }

    /// Make the platform refuse connection requests.
    pub fn refuse_connect(&self) {
        self.inner.lock(|inner| inner.borrow_mut().refuse_connect = true);
    }

    pub fn refuse_disconnect(&self) {
        self.inner
            .lock(|inner| inner.borrow_mut().refuse_disconnect = true);
    }

    pub fn set_send_report_result(&self, ok: bool) {
        self.inner.lock(|inner| inner.borrow_mut().send_report_ok = ok);
    }

    pub fn set_reply_report_result(&self, ok: bool) {
        self.inner.lock(|inner| inner.borrow_mut().reply_report_ok = ok);
    }

    fn record(&self, call: ClassicCall) {
        self.inner.lock(|inner| {
            if inner.borrow_mut().journal.push(call).is_err() {
                panic!("mock classic journal full");
            }
        });
    }
}

impl Default for MockClassicState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockClassicHost {
    state: &'static MockClassicState,
}

impl MockClassicHost {
    pub fn new(state: &'static MockClassicState) -> Self {
        Self { state }
    }
}

impl ClassicHost for MockClassicHost {
    async fn open(&mut self) -> Result<(), HostError> {
        self.state.record(ClassicCall::Open);
        match self.state.inner.lock(|inner| inner.borrow_mut().open_error.take()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn register_app(
        &mut self,
        sdp: &SdpSettings,
        _qos_in: &QosSettings,
        _qos_out: &QosSettings,
    ) -> Result<(), HostError> {
        self.state.record(ClassicCall::RegisterApp {
            subclass: sdp.subclass,
        });
        match self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().register_app_error.take())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn unregister_app(&mut self) {
        self.state.record(ClassicCall::UnregisterApp);
    }

    fn connect(&mut self, device: &Device) -> bool {
        self.state.record(ClassicCall::Connect(device.address));
        !self.state.inner.lock(|inner| inner.borrow().refuse_connect)
    }

    fn disconnect(&mut self, device: &Device) -> bool {
        self.state.record(ClassicCall::Disconnect(device.address));
        if self.state.inner.lock(|inner| inner.borrow().refuse_disconnect) {
            return false;
        }
        // Real stacks confirm asynchronously
        self.state
            .push_event(ClassicHostEvent::ConnectionStateChanged {
                device: device.clone(),
                state: LinkState::Disconnected,
            });
        true
    }

    fn send_report(&mut self, device: &Device, report_id: u8, payload: &[u8]) -> bool {
        let mut copy = Vec::new();
        copy.extend_from_slice(payload).ok();
        self.state.record(ClassicCall::SendReport {
            device: device.address,
            report_id,
            payload: copy,
        });
        self.state.inner.lock(|inner| inner.borrow().send_report_ok)
    }

    fn reply_report(
        &mut self,
        device: &Device,
        report_type: u8,
        report_id: u8,
        payload: &[u8],
    ) -> bool {
        let mut copy = Vec::new();
        copy.extend_from_slice(payload).ok();
        self.state.record(ClassicCall::ReplyReport {
            device: device.address,
            report_type,
            report_id,
            payload: copy,
        });
        self.state.inner.lock(|inner| inner.borrow().reply_report_ok)
    }

    async fn start_scan(&mut self) -> Result<(), HostError> {
        self.state.record(ClassicCall::StartScan);
        match self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().start_scan_error.take())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn stop_scan(&mut self) -> Result<(), HostError> {
        self.state.record(ClassicCall::StopScan);
        match self
            .state
            .inner
            .lock(|inner| inner.borrow_mut().stop_scan_error.take())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn next_event(&mut self) -> ClassicHostEvent {
        self.state.events.receive().await
    }
}
