//! Classic Bluetooth transport: HID device profile over BR/EDR.
//!
//! Unlike the BLE side the phone is the initiator here: it scans for hosts,
//! connects outbound, and registers the HID app (SDP record + QoS) right
//! before each connection attempt. Reports go out over the interrupt
//! channel from the pump tick.

pub mod host;

use core::sync::atomic::Ordering;

use embassy_futures::select::{select, select4, Either, Either4};
use embassy_time::{Instant, Timer};
use heapless::Vec;

use crate::channel::{
    publish_discovery_event, CLASSIC_COMMAND_CHANNEL, CLASSIC_REPORT_CHANNEL,
    TRANSPORT_EVENT_CHANNEL,
};
use crate::config::{ClassicConfig, PeripheralConfig};
use crate::connection::{Address, ConnectionTracker, Device, MAX_CONNECTED_DEVICES};
use crate::event::{ConnectionEvent, DiscoveryEvent};
use crate::host::InitError;
use crate::state::{BondState, LinkState, TransportKind, CLASSIC_SCANNING};
use host::{ClassicHost, ClassicHostEvent};

/// Nominal input report size replied to `GetReport` pulls.
const GET_REPORT_SIZE: usize = 8;
/// Addresses remembered for per-session discovery dedup.
const DISCOVERY_DEDUP: usize = 16;

/// Commands the facade sends to the classic transport.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClassicCommand {
    StartDiscovery,
    StopDiscovery,
    Connect(Device),
    Disconnect(Address),
    Deactivate,
}

pub struct ClassicTransport<C: ClassicHost> {
    host: C,
    config: ClassicConfig,
    tracker: ConnectionTracker,
    seen: Vec<Address, DISCOVERY_DEDUP>,
    app_registered: bool,
    scan_deadline: Option<Instant>,
    connect_deadline: Option<Instant>,
}

impl<C: ClassicHost> ClassicTransport<C> {
    pub fn new(host: C, config: &PeripheralConfig) -> Self {
        Self {
            host,
            config: config.classic.clone(),
            tracker: ConnectionTracker::new(),
            seen: Vec::new(),
            app_registered: false,
            scan_deadline: None,
            connect_deadline: None,
        }
    }

    pub async fn init(&mut self) -> Result<(), InitError> {
        if let Err(e) = self.host.open().await {
            error!("failed to acquire classic HID profile: {}", e);
            return Err(InitError::ProfileUnavailable);
        }
        info!("classic transport initialized");
        Ok(())
    }

    pub async fn run(&mut self) {
        loop {
            let scan_deadline = self.scan_deadline.unwrap_or(Instant::MAX);
            let connect_deadline = self.connect_deadline.unwrap_or(Instant::MAX);
            let result = select4(
                CLASSIC_COMMAND_CHANNEL.receive(),
                self.host.next_event(),
                Timer::after(self.config.report_interval),
                select(Timer::at(scan_deadline), Timer::at(connect_deadline)),
            )
            .await;
            match result {
                Either4::First(command) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Either4::Second(event) => self.handle_host_event(event).await,
                Either4::Third(()) => self.pump_reports(),
                Either4::Fourth(Either::First(())) => {
                    info!("discovery window elapsed");
                    self.stop_discovery().await;
                }
                Either4::Fourth(Either::Second(())) => self.on_connect_timeout(),
            }
        }
        info!("classic transport stopped");
    }

    /// Returns true when the transport should shut down.
    async fn handle_command(&mut self, command: ClassicCommand) -> bool {
        match command {
            ClassicCommand::StartDiscovery => self.start_discovery().await,
            ClassicCommand::StopDiscovery => self.stop_discovery().await,
            ClassicCommand::Connect(device) => self.connect(device).await,
            ClassicCommand::Disconnect(address) => self.disconnect(address).await,
            ClassicCommand::Deactivate => {
                self.deactivate().await;
                return true;
            }
        }
        false
    }

    async fn start_discovery(&mut self) {
        if CLASSIC_SCANNING.load(Ordering::Acquire) {
            debug!("discovery already running");
            return;
        }
        match self.host.start_scan().await {
            Ok(()) => {
                CLASSIC_SCANNING.store(true, Ordering::Release);
                self.scan_deadline = Some(Instant::now() + self.config.scan_timeout);
                self.seen.clear();
                info!("classic discovery started");
                publish_discovery_event(DiscoveryEvent::Started);
            }
            Err(e) => warn!("failed to start discovery: {}", e),
        }
    }

    /// Idempotent: only the transition from scanning to stopped touches the
    /// platform.
    async fn stop_discovery(&mut self) {
        if !CLASSIC_SCANNING.load(Ordering::Acquire) {
            return;
        }
        CLASSIC_SCANNING.store(false, Ordering::Release);
        self.scan_deadline = None;
        match self.host.stop_scan().await {
            Ok(()) => {}
            Err(crate::host::HostError::AlreadyStopped) => warn!("discovery was already stopped"),
            Err(e) => warn!("failed to stop discovery: {}", e),
        }
        info!("classic discovery stopped");
        publish_discovery_event(DiscoveryEvent::Finished);
    }

    async fn connect(&mut self, device: Device) {
        if self.tracker.contains(&device.address) {
            debug!("{} already connected", device.address);
            return;
        }
        self.stop_discovery().await;
        self.tracker.begin_connecting(device.clone());
        self.emit(ConnectionEvent::Connecting {
            transport: TransportKind::Classic,
            device: device.clone(),
        });
        // Deadline covers the profile setup as well as the link itself
        self.connect_deadline = Some(Instant::now() + self.config.connect_timeout);
        let delay = self.config.profile_setup_delay;
        if delay.as_ticks() > 0 {
            debug!("waiting {} ms before app registration", delay.as_millis());
            Timer::after(delay).await;
        }
        match self
            .host
            .register_app(&self.config.sdp, &self.config.qos_in, &self.config.qos_out)
            .await
        {
            Ok(()) => self.app_registered = true,
            Err(e) => {
                warn!("hid app registration failed: {}", e);
                self.connection_error(device, "app registration failed");
                return;
            }
        }
        info!("connecting to {}", device.address);
        if !self.host.connect(&device) {
            warn!("platform refused connection to {}", device.address);
            self.connection_error(device, "connect refused");
        }
    }

    async fn disconnect(&mut self, address: Address) {
        let Some(device) = self.tracker.begin_disconnecting(&address) else {
            debug!("disconnect: {} is not connected", address);
            return;
        };
        if !self.host.disconnect(&device) {
            warn!("platform refused disconnect of {}", device.address);
            self.tracker.remove(&address);
            self.emit(ConnectionEvent::Disconnected {
                transport: TransportKind::Classic,
                device,
            });
        }
    }

    async fn deactivate(&mut self) {
        self.stop_discovery().await;
        let connected: Vec<Device, MAX_CONNECTED_DEVICES> =
            self.tracker.connected_devices().cloned().collect();
        for device in &connected {
            if !self.host.disconnect(device) {
                warn!("platform refused disconnect of {}", device.address);
            }
        }
        self.tracker.clear();
        self.connect_deadline = None;
        if self.app_registered {
            self.host.unregister_app();
            self.app_registered = false;
        }
    }

    fn on_connect_timeout(&mut self) {
        self.connect_deadline = None;
        if let Some(device) = self.tracker.clear_connecting() {
            warn!("connect to {} timed out", device.address);
            self.emit(ConnectionEvent::ConnectionError {
                transport: TransportKind::Classic,
                device,
                reason: "connect timeout",
            });
        }
    }

    /// A connect attempt failed before the link came up: drop the connecting
    /// slot and deadline, report the error.
    fn connection_error(&mut self, device: Device, reason: &'static str) {
        self.connect_deadline = None;
        self.tracker.clear_connecting();
        self.emit(ConnectionEvent::ConnectionError {
            transport: TransportKind::Classic,
            device,
            reason,
        });
    }

    async fn handle_host_event(&mut self, event: ClassicHostEvent) {
        match event {
            ClassicHostEvent::ConnectionStateChanged { device, state } => {
                self.on_connection_state(device, state).await
            }
            ClassicHostEvent::BondStateChanged { device, bond } => {
                debug!("bond {} -> {}", device.address, bond.as_str());
                if bond == BondState::Bonded && self.tracker.is_connecting(&device.address) {
                    self.finalize_connection(device).await;
                }
            }
            ClassicHostEvent::DeviceDiscovered { device } => self.on_device_discovered(device),
            ClassicHostEvent::GetReport {
                device,
                report_type,
                report_id,
                buffer_size,
            } => {
                debug!(
                    "get_report type {} id {} ({} bytes) from {}",
                    report_type, report_id, buffer_size, device.address
                );
                let zeros = [0u8; GET_REPORT_SIZE];
                if !self.host.reply_report(&device, report_type, report_id, &zeros) {
                    warn!("get_report reply to {} failed", device.address);
                }
            }
            ClassicHostEvent::VirtualCableUnplug { device } => {
                info!("virtual cable unplugged by {}", device.address);
                self.host.disconnect(&device);
                if let Some(device) = self.tracker.remove(&device.address) {
                    self.emit(ConnectionEvent::Disconnected {
                        transport: TransportKind::Classic,
                        device,
                    });
                }
            }
        }
    }

    async fn on_connection_state(&mut self, device: Device, state: LinkState) {
        debug!("link {} -> {}", device.address, state.as_str());
        match state {
            LinkState::Connected => self.finalize_connection(device).await,
            LinkState::Disconnected => {
                let was_connected = self.tracker.contains(&device.address);
                if let Some(device) = self.tracker.remove(&device.address) {
                    self.emit(ConnectionEvent::Disconnected {
                        transport: TransportKind::Classic,
                        device,
                    });
                    // Resume seeking a host, but not when a connect attempt
                    // just fell through
                    if was_connected && self.tracker.is_empty() {
                        self.start_discovery().await;
                    }
                }
            }
            LinkState::Connecting | LinkState::Disconnecting => {}
        }
    }

    async fn finalize_connection(&mut self, device: Device) {
        if self.tracker.finalize(device.clone()) {
            self.connect_deadline = None;
            self.stop_discovery().await;
            info!("classic device connected: {}", device.address);
            self.emit(ConnectionEvent::Connected {
                transport: TransportKind::Classic,
                device,
            });
        }
    }

    fn on_device_discovered(&mut self, device: Device) {
        if self.seen.contains(&device.address) {
            return;
        }
        self.seen.push(device.address).ok();
        debug!("discovered {}", device.address);
        publish_discovery_event(DiscoveryEvent::DeviceDetected(device));
    }

    /// At most one report per tick, sent to every connected device.
    fn pump_reports(&mut self) {
        let Ok(report) = CLASSIC_REPORT_CHANNEL.try_receive() else {
            return;
        };
        let Self { host, tracker, .. } = self;
        for device in tracker.connected_devices() {
            if !host.send_report(device, report.report_id, &report.payload) {
                warn!("report to {} dropped", device.address);
            }
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        if TRANSPORT_EVENT_CHANNEL.try_send(event).is_err() {
            warn!("transport event channel full, event dropped");
        }
    }
}
