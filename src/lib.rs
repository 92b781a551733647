//! # hidlink
//!
//! Dual-transport Bluetooth HID peripheral engine: the device presents
//! itself as a wireless keyboard and pointer to a remote host, over BLE
//! HID-over-GATT or the classic Bluetooth HID device profile.
//!
//! ## Modules
//!
//! - [`reporter`] - Composes keyboard and pointer input reports
//! - [`facade`] - Routes commands and reports to whichever transport owns the link
//! - [`ble`] - HID-over-GATT transport: advertising, service registration, notifications
//! - [`classic`] - Classic HID transport: discovery, outgoing connections, interrupt reports
//! - [`gatt`] - Service definitions and attribute request handling shared by the BLE transport
//! - [`mock`] - Scriptable host implementations for tests and bring-up
//!
//! Platform Bluetooth stacks are plugged in through the [`ble::host::BleHost`]
//! and [`classic::host::ClassicHost`] traits; [`run_peripheral`] wires both
//! transports and the facade together and drives them to completion.

#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod ble;
pub mod channel;
pub mod classic;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod event;
pub mod facade;
pub mod gatt;
pub mod hid;
pub mod host;
pub mod mock;
pub mod reporter;
pub mod state;

use embassy_futures::join::join3;

pub use crate::ble::BleTransport;
pub use crate::classic::ClassicTransport;
pub use crate::config::PeripheralConfig;
pub use crate::facade::TransportFacade;
pub use crate::host::InitError;
pub use crate::reporter::InputReporter;

pub(crate) type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Size of each transport's input report mailbox
pub const REPORT_CHANNEL_SIZE: usize = 16;

/// Size of the facade and transport command channels
pub const COMMAND_CHANNEL_SIZE: usize = 4;

/// Size of the transport-to-facade event channel
pub const EVENT_CHANNEL_SIZE: usize = 8;

/// Connection event queue depth per subscriber
pub const CONNECTION_EVENT_SIZE: usize = 8;

/// Max number of connection event subscribers
pub const CONNECTION_EVENT_SUBS: usize = 4;

/// Max number of connection event publishers
pub const CONNECTION_EVENT_PUBS: usize = 2;

/// Advertising event queue depth per subscriber
pub const ADVERTISING_EVENT_SIZE: usize = 4;

/// Max number of advertising event subscribers
pub const ADVERTISING_EVENT_SUBS: usize = 2;

/// Max number of advertising event publishers
pub const ADVERTISING_EVENT_PUBS: usize = 1;

/// Discovery event queue depth per subscriber
pub const DISCOVERY_EVENT_SIZE: usize = 8;

/// Max number of discovery event subscribers
pub const DISCOVERY_EVENT_SUBS: usize = 2;

/// Max number of discovery event publishers
pub const DISCOVERY_EVENT_PUBS: usize = 1;

/// Initialize both transports and run the peripheral until it's deactivated.
///
/// Registers the GATT services on the BLE host and opens the classic host,
/// then drives both transports and the facade concurrently. Returns an error
/// if either host cannot be brought up; returns `Ok(())` only after a
/// `Deactivate` command has wound everything down.
///
/// # Arguments
///
/// * `ble_host` - platform BLE stack, check [`ble::host::BleHost`]
/// * `classic_host` - platform classic stack, check [`classic::host::ClassicHost`]
/// * `config` - peripheral configuration, check [`PeripheralConfig`] for details
pub async fn run_peripheral<B: ble::host::BleHost, C: classic::host::ClassicHost>(
    ble_host: B,
    classic_host: C,
    config: PeripheralConfig,
) -> Result<(), InitError> {
    let mut ble = BleTransport::new(ble_host, &config);
    let mut classic = ClassicTransport::new(classic_host, &config);
    let mut facade = TransportFacade::new(&config);

    ble.init().await?;
    classic.init().await?;

    info!("hidlink up, waiting for work");
    join3(ble.run(), classic.run(), facade.run()).await;
    info!("hidlink deactivated");
    Ok(())
}
