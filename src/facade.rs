//! Transport facade: the single owner of the cross-transport view.
//!
//! Consumes the unified event stream from both transports, republishes it
//! for application subscribers, routes input reports to whichever transport
//! holds the active connection, and sequences device switches so that at
//! most one device is connected or connecting across both radios.

use embassy_futures::select::{select4, Either4};
use embassy_time::{Duration, Instant, Timer};

use crate::ble::BleCommand;
use crate::channel::{
    publish_connection_event, BLE_COMMAND_CHANNEL, BLE_REPORT_CHANNEL, CLASSIC_COMMAND_CHANNEL,
    CLASSIC_REPORT_CHANNEL, FACADE_COMMAND_CHANNEL, INPUT_REPORT_CHANNEL, TRANSPORT_EVENT_CHANNEL,
};
use crate::classic::ClassicCommand;
use crate::config::{LastConnection, PeripheralConfig};
use crate::connection::Device;
use crate::event::ConnectionEvent;
use crate::hid::InputReport;
use crate::state::{set_active_transport, TransportKind};

/// Grace period before chasing the remembered connection.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Commands accepted on `FACADE_COMMAND_CHANNEL`, the public control
/// surface of the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FacadeCommand {
    /// Make the BLE side discoverable.
    StartAdvertising,
    StopAdvertising,
    /// Scan for classic hosts.
    StartDiscovery,
    StopDiscovery,
    /// Connect to a classic host, switching away from any active device.
    ConnectTo(Device),
    /// Drop the active connection.
    Disconnect,
    /// Shut the whole engine down.
    Deactivate,
}

pub struct TransportFacade {
    active: Option<TransportKind>,
    connected: Option<Device>,
    connecting: Option<Device>,
    pending_connect: Option<Device>,
    reconnect: Option<LastConnection>,
    reconnect_at: Option<Instant>,
}

impl TransportFacade {
    pub fn new(config: &PeripheralConfig) -> Self {
        Self {
            active: None,
            connected: None,
            connecting: None,
            pending_connect: None,
            reconnect: config.reconnect.clone(),
            reconnect_at: None,
        }
    }

    pub async fn run(&mut self) {
        if self.reconnect.is_some() {
            self.reconnect_at = Some(Instant::now() + RECONNECT_DELAY);
        }
        loop {
            let reconnect_at = self.reconnect_at.unwrap_or(Instant::MAX);
            let result = select4(
                FACADE_COMMAND_CHANNEL.receive(),
                TRANSPORT_EVENT_CHANNEL.receive(),
                INPUT_REPORT_CHANNEL.receive(),
                Timer::at(reconnect_at),
            )
            .await;
            match result {
                Either4::First(command) => {
                    if self.handle_command(command).await {
                        break;
                    }
                }
                Either4::Second(event) => self.handle_event(event).await,
                Either4::Third(report) => self.forward_report(report),
                Either4::Fourth(()) => self.reconnect_to_last().await,
            }
        }
        info!("transport facade stopped");
    }

    /// Returns true when the facade should shut down.
    async fn handle_command(&mut self, command: FacadeCommand) -> bool {
        match command {
            FacadeCommand::StartAdvertising => {
                BLE_COMMAND_CHANNEL.send(BleCommand::StartAdvertising).await
            }
            FacadeCommand::StopAdvertising => {
                BLE_COMMAND_CHANNEL.send(BleCommand::StopAdvertising).await
            }
            FacadeCommand::StartDiscovery => {
                CLASSIC_COMMAND_CHANNEL
                    .send(ClassicCommand::StartDiscovery)
                    .await
            }
            FacadeCommand::StopDiscovery => {
                CLASSIC_COMMAND_CHANNEL
                    .send(ClassicCommand::StopDiscovery)
                    .await
            }
            FacadeCommand::ConnectTo(device) => self.connect_to(device).await,
            FacadeCommand::Disconnect => self.disconnect_active().await,
            FacadeCommand::Deactivate => {
                self.deactivate().await;
                return true;
            }
        }
        false
    }

    async fn connect_to(&mut self, device: Device) {
        let target = device.address;
        if self
            .connected
            .as_ref()
            .is_some_and(|connected| connected.address == target)
            || self
                .connecting
                .as_ref()
                .is_some_and(|connecting| connecting.address == target)
        {
            debug!("{} is already connected or connecting", target);
            return;
        }
        if let Some(active) = &self.connected {
            // Switch: finish tearing down the old link first, the pending
            // connect is issued when its Disconnected event arrives
            info!("switching from {} to {}", active.address, target);
            let address = active.address;
            self.pending_connect = Some(device);
            match self.active {
                Some(TransportKind::Ble) => {
                    BLE_COMMAND_CHANNEL
                        .send(BleCommand::Disconnect(address))
                        .await
                }
                Some(TransportKind::Classic) => {
                    CLASSIC_COMMAND_CHANNEL
                        .send(ClassicCommand::Disconnect(address))
                        .await
                }
                None => warn!("connected device without an active transport"),
            }
            return;
        }
        self.issue_classic_connect(device).await;
    }

    /// Classic is the only outbound path; silence BLE so only one transport
    /// is connectable while the attempt runs.
    async fn issue_classic_connect(&mut self, device: Device) {
        BLE_COMMAND_CHANNEL.send(BleCommand::StopAdvertising).await;
        self.connecting = Some(device.clone());
        CLASSIC_COMMAND_CHANNEL
            .send(ClassicCommand::Connect(device))
            .await;
    }

    async fn disconnect_active(&mut self) {
        let Some(device) = &self.connected else {
            debug!("disconnect: nothing connected");
            return;
        };
        let address = device.address;
        match self.active {
            Some(TransportKind::Ble) => {
                BLE_COMMAND_CHANNEL
                    .send(BleCommand::Disconnect(address))
                    .await
            }
            Some(TransportKind::Classic) => {
                CLASSIC_COMMAND_CHANNEL
                    .send(ClassicCommand::Disconnect(address))
                    .await
            }
            None => warn!("connected device without an active transport"),
        }
    }

    async fn deactivate(&mut self) {
        BLE_COMMAND_CHANNEL.send(BleCommand::Deactivate).await;
        CLASSIC_COMMAND_CHANNEL
            .send(ClassicCommand::Deactivate)
            .await;
        self.active = None;
        self.connected = None;
        self.connecting = None;
        self.pending_connect = None;
        self.reconnect_at = None;
        set_active_transport(None);
    }

    async fn handle_event(&mut self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connecting { device, .. } => {
                self.connecting = Some(device.clone());
            }
            ConnectionEvent::Connected { transport, device } => {
                self.active = Some(*transport);
                self.connected = Some(device.clone());
                self.connecting = None;
                set_active_transport(Some(*transport));
            }
            ConnectionEvent::Disconnected { device, .. } => {
                if self
                    .connected
                    .as_ref()
                    .is_some_and(|connected| connected.address == device.address)
                {
                    self.connected = None;
                    self.active = None;
                    set_active_transport(None);
                }
                if self
                    .connecting
                    .as_ref()
                    .is_some_and(|connecting| connecting.address == device.address)
                {
                    self.connecting = None;
                }
                if let Some(pending) = self.pending_connect.take() {
                    self.issue_classic_connect(pending).await;
                }
            }
            ConnectionEvent::ConnectionError { .. } => {
                // Whatever went wrong, leave the way open for a retry
                self.connecting = None;
            }
        }
        publish_connection_event(event);
    }

    fn forward_report(&mut self, report: InputReport) {
        match self.active {
            Some(TransportKind::Ble) => {
                if BLE_REPORT_CHANNEL.try_send(report).is_err() {
                    warn!("BLE report mailbox full, report dropped");
                }
            }
            Some(TransportKind::Classic) => {
                if CLASSIC_REPORT_CHANNEL.try_send(report).is_err() {
                    warn!("classic report mailbox full, report dropped");
                }
            }
            None => debug!("no active transport, report dropped"),
        }
    }

    async fn reconnect_to_last(&mut self) {
        self.reconnect_at = None;
        let Some(last) = self.reconnect.take() else {
            return;
        };
        if self.connected.is_some() || self.connecting.is_some() {
            debug!("reconnect skipped, already engaged");
            return;
        }
        match last.transport {
            TransportKind::Ble => {
                info!("reconnect: advertising for {}", last.device.address);
                BLE_COMMAND_CHANNEL.send(BleCommand::StartAdvertising).await;
            }
            TransportKind::Classic => {
                info!("reconnect: connecting to {}", last.device.address);
                self.issue_classic_connect(last.device).await;
            }
        }
    }
}
