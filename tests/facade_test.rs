mod common;

use embassy_futures::join::join;
use embassy_futures::select::select;
use embassy_time::{Duration, Timer};
use hidlink::ble::host::BleHostEvent;
use hidlink::channel::{
    ConnectionEventSub, ADVERTISING_EVENT_CHANNEL, CONNECTION_EVENT_CHANNEL,
    FACADE_COMMAND_CHANNEL,
};
use hidlink::classic::host::ClassicHostEvent;
use hidlink::config::{LastConnection, PeripheralConfig};
use hidlink::connection::Device;
use hidlink::event::{AdvertisingEvent, ConnectionEvent};
use hidlink::facade::FacadeCommand;
use hidlink::mock::{
    BleCall, ClassicCall, MockBleHost, MockBleState, MockClassicHost, MockClassicState,
};
use hidlink::reporter::{InputReporter, Modifiers};
use hidlink::state::{BondState, LinkState, TransportKind};
use hidlink::{run_peripheral, state};
use rusty_fork::rusty_fork_test;

use crate::common::{device, next_advertising_event, next_connection_event, test_block_on};

static BLE: MockBleState = MockBleState::new();
static CLASSIC: MockClassicState = MockClassicState::new();

async fn engine() {
    engine_with(PeripheralConfig::default()).await
}

async fn engine_with(config: PeripheralConfig) {
    run_peripheral(MockBleHost::new(&BLE), MockClassicHost::new(&CLASSIC), config)
        .await
        .unwrap();
}

/// Connect a pre-bonded BLE central and wait until the facade exposes it.
async fn connect_ble(events: &mut ConnectionEventSub, central: &Device) {
    BLE.push_event(BleHostEvent::BondStateChanged {
        device: central.clone(),
        bond: BondState::Bonded,
    });
    BLE.push_event(BleHostEvent::ConnectionStateChanged {
        device: central.clone(),
        state: LinkState::Connected,
    });
    let event = next_connection_event(events).await;
    assert_eq!(
        event,
        ConnectionEvent::Connected {
            transport: TransportKind::Ble,
            device: central.clone(),
        }
    );
}

/// Drive a full outgoing classic connection and wait for it to be exposed.
async fn connect_classic(events: &mut ConnectionEventSub, peer: &Device) {
    FACADE_COMMAND_CHANNEL
        .send(FacadeCommand::ConnectTo(peer.clone()))
        .await;
    let event = next_connection_event(events).await;
    assert_eq!(
        event,
        ConnectionEvent::Connecting {
            transport: TransportKind::Classic,
            device: peer.clone(),
        }
    );
    CLASSIC.push_event(ClassicHostEvent::ConnectionStateChanged {
        device: peer.clone(),
        state: LinkState::Connected,
    });
    let event = next_connection_event(events).await;
    assert_eq!(
        event,
        ConnectionEvent::Connected {
            transport: TransportKind::Classic,
            device: peer.clone(),
        }
    );
}

rusty_fork_test! {

#[test]
fn switching_devices_tears_down_the_old_link_first() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let central = device(0xA0);
            connect_ble(&mut events, &central).await;
            assert_eq!(state::active_transport(), Some(TransportKind::Ble));

            let target = device(0xB0);
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::ConnectTo(target.clone()))
                .await;

            // Old link goes first, the new attempt starts only after its
            // Disconnected arrives
            assert_eq!(
                next_connection_event(&mut events).await,
                ConnectionEvent::Disconnected {
                    transport: TransportKind::Ble,
                    device: central.clone(),
                }
            );
            assert_eq!(
                next_connection_event(&mut events).await,
                ConnectionEvent::Connecting {
                    transport: TransportKind::Classic,
                    device: target.clone(),
                }
            );
            CLASSIC.push_event(ClassicHostEvent::ConnectionStateChanged {
                device: target.clone(),
                state: LinkState::Connected,
            });
            assert_eq!(
                next_connection_event(&mut events).await,
                ConnectionEvent::Connected {
                    transport: TransportKind::Classic,
                    device: target.clone(),
                }
            );
            assert_eq!(state::active_transport(), Some(TransportKind::Classic));

            assert!(BLE
                .calls()
                .contains(&BleCall::CancelConnection(central.address)));
            assert!(CLASSIC.calls().contains(&ClassicCall::Connect(target.address)));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn deactivate_shuts_both_transports_down() {
    test_block_on(async {
        let peer = device(0xC0);
        let run = run_peripheral(
            MockBleHost::new(&BLE),
            MockClassicHost::new(&CLASSIC),
            PeripheralConfig::default(),
        );
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            connect_classic(&mut events, &peer).await;
            FACADE_COMMAND_CHANNEL.send(FacadeCommand::Deactivate).await;
        };
        let (result, ()) = join(run, scenario).await;
        result.unwrap();

        assert_eq!(state::active_transport(), None);
        assert!(BLE.calls().contains(&BleCall::Close));
        let calls = CLASSIC.take_calls();
        assert!(calls.contains(&ClassicCall::Disconnect(peer.address)));
        assert!(calls.contains(&ClassicCall::UnregisterApp));
    });
}

#[test]
fn reconnects_by_advertising_for_a_ble_host() {
    test_block_on(async {
        let config = PeripheralConfig {
            reconnect: Some(LastConnection {
                transport: TransportKind::Ble,
                device: device(0xD0),
            }),
            ..PeripheralConfig::default()
        };
        let scenario = async {
            let mut advertising = ADVERTISING_EVENT_CHANNEL.subscriber().unwrap();
            // Fires after the 500ms grace period, unprompted
            assert_eq!(
                next_advertising_event(&mut advertising).await,
                AdvertisingEvent::Started
            );
            assert!(state::is_advertising());
        };
        select(engine_with(config), scenario).await;
    });
}

#[test]
fn reconnects_to_the_last_classic_host() {
    test_block_on(async {
        let peer = device(0xE0);
        let config = PeripheralConfig {
            reconnect: Some(LastConnection {
                transport: TransportKind::Classic,
                device: peer.clone(),
            }),
            ..PeripheralConfig::default()
        };
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            assert_eq!(
                next_connection_event(&mut events).await,
                ConnectionEvent::Connecting {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                }
            );
            CLASSIC.push_event(ClassicHostEvent::ConnectionStateChanged {
                device: peer.clone(),
                state: LinkState::Connected,
            });
            assert_eq!(
                next_connection_event(&mut events).await,
                ConnectionEvent::Connected {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                }
            );

            let calls = CLASSIC.take_calls();
            let register = calls
                .iter()
                .position(|call| matches!(call, ClassicCall::RegisterApp { .. }))
                .unwrap();
            let connect = calls
                .iter()
                .position(|call| *call == ClassicCall::Connect(peer.address))
                .unwrap();
            assert!(register < connect);
        };
        select(engine_with(config), scenario).await;
    });
}

#[test]
fn reconnect_skips_when_a_central_arrives_first() {
    test_block_on(async {
        let config = PeripheralConfig {
            reconnect: Some(LastConnection {
                transport: TransportKind::Ble,
                device: device(0xD1),
            }),
            ..PeripheralConfig::default()
        };
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let mut advertising = ADVERTISING_EVENT_CHANNEL.subscriber().unwrap();
            let central = device(0xA1);
            // Engaged well before the grace period runs out
            connect_ble(&mut events, &central).await;
            Timer::after(Duration::from_millis(700)).await;
            assert!(advertising.try_next_message_pure().is_none());
            assert!(BLE
                .calls()
                .iter()
                .all(|call| !matches!(call, BleCall::StartAdvertising { .. })));
        };
        select(engine_with(config), scenario).await;
    });
}

#[test]
fn connect_to_the_active_device_is_absorbed() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0xF0);
            connect_classic(&mut events, &peer).await;

            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::ConnectTo(peer.clone()))
                .await;
            Timer::after(Duration::from_millis(100)).await;
            assert!(events.try_next_message_pure().is_none());
            let calls = CLASSIC.take_calls();
            assert_eq!(
                calls
                    .iter()
                    .filter(|call| **call == ClassicCall::Connect(peer.address))
                    .count(),
                1
            );
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn drops_reports_without_an_active_connection() {
    test_block_on(async {
        let scenario = async {
            let mut reporter = InputReporter::new();
            reporter.key_down(Modifiers::none(), 0x04).unwrap();
            Timer::after(Duration::from_millis(100)).await;
            assert!(BLE
                .calls()
                .iter()
                .all(|call| !matches!(call, BleCall::Notify { .. })));
            assert!(CLASSIC
                .calls()
                .iter()
                .all(|call| !matches!(call, ClassicCall::SendReport { .. })));
        };
        select(engine(), scenario).await;
    });
}

}
