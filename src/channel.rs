//! Exposed channels which carry reports, commands and events between the
//! reporter, the transport facade and the two transports.

use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{PubSubBehavior, PubSubChannel, Subscriber};
pub use embassy_sync::{blocking_mutex, channel, pubsub};

use crate::ble::BleCommand;
use crate::classic::ClassicCommand;
use crate::event::{AdvertisingEvent, ConnectionEvent, DiscoveryEvent};
use crate::facade::FacadeCommand;
use crate::hid::InputReport;
use crate::{
    RawMutex, ADVERTISING_EVENT_PUBS, ADVERTISING_EVENT_SIZE, ADVERTISING_EVENT_SUBS,
    COMMAND_CHANNEL_SIZE, CONNECTION_EVENT_PUBS, CONNECTION_EVENT_SIZE, CONNECTION_EVENT_SUBS,
    DISCOVERY_EVENT_PUBS, DISCOVERY_EVENT_SIZE, DISCOVERY_EVENT_SUBS, EVENT_CHANNEL_SIZE,
    REPORT_CHANNEL_SIZE,
};

pub type ConnectionEventSub = Subscriber<
    'static,
    RawMutex,
    ConnectionEvent,
    CONNECTION_EVENT_SIZE,
    CONNECTION_EVENT_SUBS,
    CONNECTION_EVENT_PUBS,
>;
pub type AdvertisingEventSub = Subscriber<
    'static,
    RawMutex,
    AdvertisingEvent,
    ADVERTISING_EVENT_SIZE,
    ADVERTISING_EVENT_SUBS,
    ADVERTISING_EVENT_PUBS,
>;
pub type DiscoveryEventSub = Subscriber<
    'static,
    RawMutex,
    DiscoveryEvent,
    DISCOVERY_EVENT_SIZE,
    DISCOVERY_EVENT_SUBS,
    DISCOVERY_EVENT_PUBS,
>;

/// Channel for input reports from the reporter to the facade
pub static INPUT_REPORT_CHANNEL: Channel<RawMutex, InputReport, REPORT_CHANNEL_SIZE> = Channel::new();
/// Mailbox of the BLE transport, fed only by the facade
pub(crate) static BLE_REPORT_CHANNEL: Channel<RawMutex, InputReport, REPORT_CHANNEL_SIZE> = Channel::new();
/// Mailbox of the classic transport, fed only by the facade
pub(crate) static CLASSIC_REPORT_CHANNEL: Channel<RawMutex, InputReport, REPORT_CHANNEL_SIZE> =
    Channel::new();
/// Channel for commands from the application to the facade
pub static FACADE_COMMAND_CHANNEL: Channel<RawMutex, FacadeCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();
/// Channel for commands from the facade to the BLE transport
pub(crate) static BLE_COMMAND_CHANNEL: Channel<RawMutex, BleCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();
/// Channel for commands from the facade to the classic transport
pub(crate) static CLASSIC_COMMAND_CHANNEL: Channel<RawMutex, ClassicCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();
/// Channel for connection events from both transports to the facade
pub(crate) static TRANSPORT_EVENT_CHANNEL: Channel<RawMutex, ConnectionEvent, EVENT_CHANNEL_SIZE> =
    Channel::new();
/// Connection events republished by the facade for application subscribers
pub static CONNECTION_EVENT_CHANNEL: PubSubChannel<
    RawMutex,
    ConnectionEvent,
    CONNECTION_EVENT_SIZE,
    CONNECTION_EVENT_SUBS,
    CONNECTION_EVENT_PUBS,
> = PubSubChannel::new();
/// Advertising lifecycle events from the BLE transport
pub static ADVERTISING_EVENT_CHANNEL: PubSubChannel<
    RawMutex,
    AdvertisingEvent,
    ADVERTISING_EVENT_SIZE,
    ADVERTISING_EVENT_SUBS,
    ADVERTISING_EVENT_PUBS,
> = PubSubChannel::new();
/// Discovery events from the classic transport
pub static DISCOVERY_EVENT_CHANNEL: PubSubChannel<
    RawMutex,
    DiscoveryEvent,
    DISCOVERY_EVENT_SIZE,
    DISCOVERY_EVENT_SUBS,
    DISCOVERY_EVENT_PUBS,
> = PubSubChannel::new();

/// Publish `event` to application subscribers, evicting the oldest entry for
/// any subscriber that lags.
pub(crate) fn publish_connection_event(event: ConnectionEvent) {
    info!("Publishing ConnectionEvent: {:?}", event);
    CONNECTION_EVENT_CHANNEL.publish_immediate(event);
}

pub(crate) fn publish_advertising_event(event: AdvertisingEvent) {
    debug!("Publishing AdvertisingEvent: {:?}", event);
    ADVERTISING_EVENT_CHANNEL.publish_immediate(event);
}

pub(crate) fn publish_discovery_event(event: DiscoveryEvent) {
    debug!("Publishing DiscoveryEvent: {:?}", event);
    DISCOVERY_EVENT_CHANNEL.publish_immediate(event);
}
