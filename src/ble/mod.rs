//! BLE transport: HID over GATT.
//!
//! Owns the GATT service handlers, the advertising state machine and the
//! per-connection tracking for the LE side. Centrals connect inbound while
//! we advertise; reports flow out as notifications from the pump tick.

pub(crate) mod advertise;
pub mod host;

use core::sync::atomic::Ordering;

use embassy_futures::select::{select, select4, Either, Either4};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use heapless::Vec;

use crate::channel::{
    publish_advertising_event, BLE_COMMAND_CHANNEL, BLE_REPORT_CHANNEL, TRANSPORT_EVENT_CHANNEL,
};
use crate::config::{BleConfig, PeripheralConfig};
use crate::connection::{Address, ConnectionTracker, Device, MAX_CONNECTED_DEVICES};
use crate::event::{AdvertisingEvent, ConnectionEvent};
use crate::gatt::battery_service::BatteryService;
use crate::gatt::device_info::DeviceInfoService;
use crate::gatt::hid_service::HidService;
use crate::gatt::{
    AttributeRegistry, CharacteristicDef, CharacteristicHandles, GattServiceHandler, GattStatus,
    RequestId, ServiceDef, GATT_FAILURE, GATT_SUCCESS, MAX_ATTRIBUTE_VALUE, MAX_CHARACTERISTICS,
};
use crate::host::{HostError, InitError, ServiceError};
use crate::state::{BondState, LinkState, TransportKind, BLE_ADVERTISING};
use host::{BleHost, ServiceHandle};

/// Attempts per characteristic before registration gives up.
const SERVICE_ADD_RETRIES: usize = 3;

/// Commands the facade sends to the BLE transport.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleCommand {
    StartAdvertising,
    StopAdvertising,
    Disconnect(Address),
    Deactivate,
}

pub struct BleTransport<H: BleHost> {
    host: H,
    device_name: &'static str,
    config: BleConfig,
    battery: BatteryService,
    device_info: DeviceInfoService,
    hid: HidService,
    registry: AttributeRegistry,
    tracker: ConnectionTracker,
    bonded: Vec<Address, MAX_CONNECTED_DEVICES>,
    advertising_deadline: Option<Instant>,
}

impl<H: BleHost> BleTransport<H> {
    pub fn new(host: H, config: &PeripheralConfig) -> Self {
        Self {
            host,
            device_name: config.device_name,
            config: config.ble,
            battery: BatteryService::new(),
            device_info: DeviceInfoService::new(&config.identity, &config.pnp),
            hid: HidService::new(config.report_map),
            registry: AttributeRegistry::new(),
            tracker: ConnectionTracker::new(),
            bonded: Vec::new(),
            advertising_deadline: None,
        }
    }

    /// Bring up the adapter and install all GATT services. Registrations are
    /// strictly sequential, each bounded by the registration timeout.
    pub async fn init(&mut self) -> Result<(), InitError> {
        if !self.host.advertising_supported() {
            error!("BLE advertising not supported by this adapter");
            return Err(InitError::AdvertisingUnsupported);
        }
        if let Err(e) = self.host.open().await {
            error!("failed to open BLE host: {}", e);
            return Err(InitError::BluetoothUnavailable);
        }
        let Self {
            host,
            registry,
            battery,
            device_info,
            hid,
            config,
            ..
        } = self;
        let handlers: [&mut dyn GattServiceHandler; 3] = [battery, device_info, hid];
        for handler in handlers {
            let Some(def) = handler.setup() else {
                continue;
            };
            Self::register_service(host, registry, config.registration_timeout, handler, def).await?;
        }
        info!("BLE transport initialized");
        Ok(())
    }

    async fn register_service(
        host: &mut H,
        registry: &mut AttributeRegistry,
        timeout: Duration,
        handler: &mut dyn GattServiceHandler,
        def: ServiceDef,
    ) -> Result<(), InitError> {
        info!("Registering GATT service {}", def.uuid);
        let service = host
            .create_service(def.uuid)
            .map_err(|e| InitError::ServiceRegistration(ServiceError::Create(e)))?;
        let mut handles: Vec<CharacteristicHandles, MAX_CHARACTERISTICS> = Vec::new();
        for characteristic in &def.characteristics {
            let allocated = Self::add_characteristic(host, service, characteristic)?;
            registry.record(allocated.value_handle, &characteristic.initial_value);
            for (descriptor, &handle) in characteristic
                .descriptors
                .iter()
                .zip(&allocated.descriptor_handles)
            {
                registry.record(handle, &descriptor.initial_value);
            }
            handles.push(allocated).ok();
        }
        match with_timeout(timeout, host.register_service(service)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("service {} registration failed: {}", def.uuid, e);
                return Err(ServiceError::Register(e).into());
            }
            Err(_) => {
                error!("service {} registration timed out", def.uuid);
                return Err(ServiceError::RegistrationTimeout.into());
            }
        }
        handler.bind(&handles);
        Ok(())
    }

    fn add_characteristic(
        host: &mut H,
        service: ServiceHandle,
        def: &CharacteristicDef,
    ) -> Result<CharacteristicHandles, InitError> {
        for attempt in 1..=SERVICE_ADD_RETRIES {
            match host.add_characteristic(service, def) {
                Ok(handles) => return Ok(handles),
                Err(e) => warn!(
                    "add characteristic {} attempt {} failed: {}",
                    def.uuid, attempt, e
                ),
            }
        }
        Err(ServiceError::RetriesExhausted.into())
    }

    pub async fn run(&mut self) {
        loop {
            let advertising_deadline = self.advertising_deadline.unwrap_or(Instant::MAX);
            let result = select4(
                BLE_COMMAND_CHANNEL.receive(),
                self.host.next_event(),
                BLE_REPORT_CHANNEL.receive(),
                select(
                    Timer::after(self.config.report_interval),
                    Timer::at(advertising_deadline),
                ),
            )
            .await;
            match result {
                Either4::First(command) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Either4::Second(event) => self.handle_host_event(event).await,
                Either4::Third(report) => {
                    self.hid.add_input_report(report.report_id, &report.payload)
                }
                Either4::Fourth(Either::First(())) => self.pump_reports(),
                Either4::Fourth(Either::Second(())) => {
                    info!("advertising window elapsed");
                    self.stop_advertising().await;
                }
            }
        }
        info!("BLE transport stopped");
    }

    /// Returns true when the transport should shut down.
    async fn handle_command(&mut self, command: BleCommand) -> bool {
        match command {
            BleCommand::StartAdvertising => self.start_advertising().await,
            BleCommand::StopAdvertising => self.stop_advertising().await,
            BleCommand::Disconnect(address) => self.disconnect(address).await,
            BleCommand::Deactivate => {
                self.deactivate().await;
                return true;
            }
        }
        false
    }

    async fn start_advertising(&mut self) {
        if BLE_ADVERTISING.load(Ordering::Acquire) {
            debug!("advertising already active");
            return;
        }
        let payloads = advertise::create_advertisement_data().and_then(|adv| {
            advertise::create_scan_response(self.device_name).map(|scan| (adv, scan))
        });
        let (adv, scan) = match payloads {
            Ok(payloads) => payloads,
            Err(_) => {
                error!("advertising payload too long");
                publish_advertising_event(AdvertisingEvent::Failed(HostError::Failure));
                return;
            }
        };
        match with_timeout(
            self.config.registration_timeout,
            self.host.start_advertising(&adv, &scan),
        )
        .await
        {
            Ok(Ok(())) => {
                BLE_ADVERTISING.store(true, Ordering::Release);
                self.advertising_deadline = Some(Instant::now() + self.config.advertise_timeout);
                info!("BLE advertising started");
                publish_advertising_event(AdvertisingEvent::Started);
            }
            Ok(Err(e)) => {
                warn!("failed to start advertising: {}", e);
                publish_advertising_event(AdvertisingEvent::Failed(e));
            }
            Err(_) => {
                warn!("start advertising timed out");
                publish_advertising_event(AdvertisingEvent::Failed(HostError::Failure));
            }
        }
    }

    /// Idempotent: only the transition from advertising to stopped touches
    /// the platform.
    async fn stop_advertising(&mut self) {
        if !BLE_ADVERTISING.load(Ordering::Acquire) {
            return;
        }
        BLE_ADVERTISING.store(false, Ordering::Release);
        self.advertising_deadline = None;
        match self.host.stop_advertising().await {
            Ok(()) => {}
            Err(HostError::AlreadyStopped) => warn!("advertising was already stopped"),
            Err(e) => warn!("failed to stop advertising: {}", e),
        }
        info!("BLE advertising stopped");
        publish_advertising_event(AdvertisingEvent::Stopped);
    }

    async fn disconnect(&mut self, address: Address) {
        let Some(device) = self.tracker.begin_disconnecting(&address) else {
            debug!("disconnect: {} is not connected", address);
            return;
        };
        if let Err(e) = self.host.cancel_connection(&device) {
            warn!("cancel connection for {} failed: {}", device.address, e);
            self.tracker.remove(&address);
            self.emit(ConnectionEvent::Disconnected {
                transport: TransportKind::Ble,
                device,
            });
        }
    }

    async fn deactivate(&mut self) {
        self.stop_advertising().await;
        let connected: Vec<Device, MAX_CONNECTED_DEVICES> =
            self.tracker.connected_devices().cloned().collect();
        for device in &connected {
            if let Err(e) = self.host.cancel_connection(device) {
                warn!("cancel connection for {} failed: {}", device.address, e);
            }
        }
        self.tracker.clear();
        self.host.close();
    }

    async fn handle_host_event(&mut self, event: host::BleHostEvent) {
        match event {
            host::BleHostEvent::ConnectionStateChanged { device, state } => {
                self.on_connection_state(device, state).await
            }
            host::BleHostEvent::BondStateChanged { device, bond } => {
                self.on_bond_state(device, bond).await
            }
            host::BleHostEvent::CharacteristicReadRequest {
                device,
                request,
                handle,
                offset,
            } => self.on_characteristic_read(device, request, handle, offset),
            host::BleHostEvent::CharacteristicWriteRequest {
                device,
                request,
                handle,
                value,
                response_needed,
            } => self.on_characteristic_write(device, request, handle, value, response_needed),
            host::BleHostEvent::DescriptorReadRequest {
                device,
                request,
                handle,
                offset,
            } => self.on_descriptor_read(device, request, handle, offset),
            host::BleHostEvent::DescriptorWriteRequest {
                device,
                request,
                handle,
                value,
                response_needed,
            } => self.on_descriptor_write(device, request, handle, value, response_needed),
        }
    }

    async fn on_connection_state(&mut self, device: Device, state: LinkState) {
        debug!("link {} -> {}", device.address, state.as_str());
        match state {
            LinkState::Connected => {
                if self.bonded.contains(&device.address) {
                    self.finalize_connection(device).await;
                } else {
                    // Wait for the bond before exposing the connection
                    self.tracker.begin_connecting(device.clone());
                    self.emit(ConnectionEvent::Connecting {
                        transport: TransportKind::Ble,
                        device,
                    });
                }
            }
            LinkState::Disconnected => {
                if let Some(device) = self.tracker.remove(&device.address) {
                    self.emit(ConnectionEvent::Disconnected {
                        transport: TransportKind::Ble,
                        device,
                    });
                    if self.tracker.is_empty() {
                        // Nobody left, become discoverable again
                        self.start_advertising().await;
                    }
                }
            }
            LinkState::Connecting | LinkState::Disconnecting => {}
        }
    }

    async fn on_bond_state(&mut self, device: Device, bond: BondState) {
        debug!("bond {} -> {}", device.address, bond.as_str());
        match bond {
            BondState::Bonded => {
                if !self.bonded.contains(&device.address)
                    && self.bonded.push(device.address).is_err()
                {
                    warn!("bonded device table full");
                }
                if self.tracker.is_connecting(&device.address) {
                    self.finalize_connection(device).await;
                }
            }
            BondState::None => {
                self.bonded.retain(|address| *address != device.address);
            }
            BondState::Bonding => {}
        }
    }

    async fn finalize_connection(&mut self, device: Device) {
        if self.tracker.finalize(device.clone()) {
            info!("BLE device connected: {}", device.address);
            self.stop_advertising().await;
            self.emit(ConnectionEvent::Connected {
                transport: TransportKind::Ble,
                device,
            });
        }
    }

    fn on_characteristic_read(
        &mut self,
        device: Device,
        request: RequestId,
        handle: u16,
        offset: usize,
    ) {
        let mut reply = None;
        for handler in self.handlers() {
            if let Some(r) = handler.on_characteristic_read(handle, offset) {
                reply = Some(r);
                break;
            }
        }
        match reply {
            Some(reply) => self.respond(&device, request, reply.status, offset, &reply.value),
            None => self.fallback_read(device, request, handle, offset),
        }
    }

    fn on_characteristic_write(
        &mut self,
        device: Device,
        request: RequestId,
        handle: u16,
        value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
        response_needed: bool,
    ) {
        let mut reply = None;
        for handler in self.handlers() {
            if let Some(r) = handler.on_characteristic_write(handle, &value) {
                reply = Some(r);
                break;
            }
        }
        let status = match reply {
            Some(reply) => reply.status,
            None => {
                if !self.registry.store(handle, &value) {
                    warn!("write to unknown attribute {}", handle);
                }
                GATT_SUCCESS
            }
        };
        if response_needed {
            self.respond(&device, request, status, 0, &[]);
        }
    }

    fn on_descriptor_read(
        &mut self,
        device: Device,
        request: RequestId,
        handle: u16,
        offset: usize,
    ) {
        let mut reply = None;
        for handler in self.handlers() {
            if let Some(r) = handler.on_descriptor_read(handle, offset) {
                reply = Some(r);
                break;
            }
        }
        match reply {
            Some(reply) => self.respond(&device, request, reply.status, offset, &reply.value),
            None => self.fallback_read(device, request, handle, offset),
        }
    }

    fn on_descriptor_write(
        &mut self,
        device: Device,
        request: RequestId,
        handle: u16,
        value: Vec<u8, MAX_ATTRIBUTE_VALUE>,
        response_needed: bool,
    ) {
        let mut reply = None;
        for handler in self.handlers() {
            if let Some(r) = handler.on_descriptor_write(handle, &value) {
                reply = Some(r);
                break;
            }
        }
        let status = match reply {
            Some(reply) => reply.status,
            None => {
                if !self.registry.store(handle, &value) {
                    warn!("write to unknown descriptor {}", handle);
                }
                GATT_SUCCESS
            }
        };
        if response_needed {
            self.respond(&device, request, status, 0, &[]);
        }
    }

    /// Serve a read nobody claimed from the last known attribute value.
    fn fallback_read(&mut self, device: Device, request: RequestId, handle: u16, offset: usize) {
        let mut value: Vec<u8, MAX_ATTRIBUTE_VALUE> = Vec::new();
        let status = match self.registry.value_of(handle) {
            Some(stored) => {
                if offset < stored.len() {
                    value.extend_from_slice(&stored[offset..]).ok();
                }
                GATT_SUCCESS
            }
            None => {
                warn!("read of unknown attribute {}", handle);
                GATT_FAILURE
            }
        };
        self.respond(&device, request, status, offset, &value);
    }

    fn respond(
        &mut self,
        device: &Device,
        request: RequestId,
        status: GattStatus,
        offset: usize,
        payload: &[u8],
    ) {
        if let Err(e) = self
            .host
            .send_response(device, request, status, offset, payload)
        {
            warn!("response for request {} failed: {}", request, e);
        }
    }

    /// One report per handler per tick, notified to every connected device.
    fn pump_reports(&mut self) {
        let Self {
            host,
            tracker,
            battery,
            device_info,
            hid,
            ..
        } = self;
        let handlers: [&mut dyn GattServiceHandler; 3] = [battery, device_info, hid];
        for handler in handlers {
            if let Some((handle, payload)) = handler.poll_input_report() {
                for device in tracker.connected_devices() {
                    if !host.notify(device, handle, &payload) {
                        warn!("notification to {} dropped", device.address);
                    }
                }
            }
        }
    }

    fn handlers(&mut self) -> [&mut dyn GattServiceHandler; 3] {
        [&mut self.battery, &mut self.device_info, &mut self.hid]
    }

    fn emit(&self, event: ConnectionEvent) {
        if TRANSPORT_EVENT_CHANNEL.try_send(event).is_err() {
            warn!("transport event channel full, event dropped");
        }
    }
}
