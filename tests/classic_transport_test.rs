mod common;

use embassy_futures::select::select;
use embassy_time::{Duration, Timer};
use hidlink::channel::{
    ConnectionEventSub, CONNECTION_EVENT_CHANNEL, DISCOVERY_EVENT_CHANNEL, FACADE_COMMAND_CHANNEL,
};
use hidlink::classic::host::ClassicHostEvent;
use hidlink::config::PeripheralConfig;
use hidlink::connection::Device;
use hidlink::event::{ConnectionEvent, DiscoveryEvent};
use hidlink::facade::FacadeCommand;
use hidlink::host::{HostError, InitError};
use hidlink::mock::{ClassicCall, MockBleHost, MockBleState, MockClassicHost, MockClassicState};
use hidlink::reporter::{InputReporter, Modifiers, PointerButtons};
use hidlink::state::{LinkState, TransportKind};
use hidlink::{run_peripheral, state, ClassicTransport};
use rusty_fork::rusty_fork_test;

use crate::common::{device, next_connection_event, next_discovery_event, test_block_on};

static BLE: MockBleState = MockBleState::new();
static CLASSIC: MockClassicState = MockClassicState::new();

async fn engine() {
    run_peripheral(
        MockBleHost::new(&BLE),
        MockClassicHost::new(&CLASSIC),
        PeripheralConfig::default(),
    )
    .await
    .unwrap();
}

fn report_payload(bytes: &[u8]) -> heapless::Vec<u8, 8> {
    let mut payload = heapless::Vec::new();
    payload.extend_from_slice(bytes).unwrap();
    payload
}

/// Drive a full outgoing connection to `peer` and wait for it to be exposed.
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
fn unavailable_profile_fails_init() {
    test_block_on(async {
        CLASSIC.fail_open(HostError::PoweredOff);
        let config = PeripheralConfig::default();
        let mut classic = ClassicTransport::new(MockClassicHost::new(&CLASSIC), &config);
        let err = classic.init().await.unwrap_err();
        assert_eq!(err, InitError::ProfileUnavailable);
    });
}

#[test]
fn connect_registers_app_before_the_link() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x10);
            connect_classic(&mut events, &peer).await;
            assert_eq!(state::active_transport(), Some(TransportKind::Classic));

            let calls = CLASSIC.take_calls();
            assert_eq!(
                calls.as_slice(),
                &[
                    ClassicCall::Open,
                    ClassicCall::RegisterApp { subclass: 0xC0 },
                    ClassicCall::Connect(peer.address),
                ]
            );
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn connect_attempt_times_out() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x20);
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::ConnectTo(peer.clone()))
                .await;
            let event = next_connection_event(&mut events).await;
            assert!(matches!(event, ConnectionEvent::Connecting { .. }));

            // The platform never reports a link; the 30s guard fires
            let event = next_connection_event(&mut events).await;
            assert_eq!(
                event,
                ConnectionEvent::ConnectionError {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                    reason: "connect timeout",
                }
            );
            assert_eq!(state::active_transport(), None);
            // A timed out attempt does not fall back to scanning
            assert!(!CLASSIC.calls().contains(&ClassicCall::StartScan));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn refused_connect_reports_an_error() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            CLASSIC.refuse_connect();
            let peer = device(0x30);
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::ConnectTo(peer.clone()))
                .await;
            let event = next_connection_event(&mut events).await;
            assert!(matches!(event, ConnectionEvent::Connecting { .. }));
            let event = next_connection_event(&mut events).await;
            assert_eq!(
                event,
                ConnectionEvent::ConnectionError {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                    reason: "connect refused",
                }
            );
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn failed_app_registration_reports_an_error() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            CLASSIC.fail_register_app(HostError::Refused);
            let peer = device(0x40);
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::ConnectTo(peer.clone()))
                .await;
            let event = next_connection_event(&mut events).await;
            assert!(matches!(event, ConnectionEvent::Connecting { .. }));
            let event = next_connection_event(&mut events).await;
            assert_eq!(
                event,
                ConnectionEvent::ConnectionError {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                    reason: "app registration failed",
                }
            );
            // Never got as far as the link
            assert!(!CLASSIC.calls().contains(&ClassicCall::Connect(peer.address)));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn discovery_dedups_and_closes_the_window() {
    test_block_on(async {
        let scenario = async {
            let mut discovery = DISCOVERY_EVENT_CHANNEL.subscriber().unwrap();
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::StartDiscovery)
                .await;
            assert_eq!(
                next_discovery_event(&mut discovery).await,
                DiscoveryEvent::Started
            );
            assert!(state::is_scanning());

            let first = device(0x50);
            let second = device(0x51);
            CLASSIC.push_event(ClassicHostEvent::DeviceDiscovered {
                device: first.clone(),
            });
            CLASSIC.push_event(ClassicHostEvent::DeviceDiscovered {
                device: first.clone(),
            });
            CLASSIC.push_event(ClassicHostEvent::DeviceDiscovered {
                device: second.clone(),
            });
            assert_eq!(
                next_discovery_event(&mut discovery).await,
                DiscoveryEvent::DeviceDetected(first)
            );
            // The repeat sighting was swallowed
            assert_eq!(
                next_discovery_event(&mut discovery).await,
                DiscoveryEvent::DeviceDetected(second)
            );

            // Nothing selected; the 20s window closes by itself
            assert_eq!(
                next_discovery_event(&mut discovery).await,
                DiscoveryEvent::Finished
            );
            assert!(!state::is_scanning());

            // Stopping again stays quiet
            FACADE_COMMAND_CHANNEL
                .send(FacadeCommand::StopDiscovery)
                .await;
            Timer::after(Duration::from_millis(50)).await;
            assert!(discovery.try_next_message_pure().is_none());
            let calls = CLASSIC.take_calls();
            assert_eq!(
                calls
                    .iter()
                    .filter(|call| **call == ClassicCall::StopScan)
                    .count(),
                1
            );
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn answers_get_report_pulls() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x60);
            connect_classic(&mut events, &peer).await;

            CLASSIC.push_event(ClassicHostEvent::GetReport {
                device: peer.clone(),
                report_type: 1,
                report_id: 1,
                buffer_size: 8,
            });
            Timer::after(Duration::from_millis(50)).await;

            assert!(CLASSIC.calls().contains(&ClassicCall::ReplyReport {
                device: peer.address,
                report_type: 1,
                report_id: 1,
                payload: report_payload(&[0; 8]),
            }));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn sends_reports_over_the_interrupt_channel() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x70);
            connect_classic(&mut events, &peer).await;

            let mut reporter = InputReporter::new();
            reporter.key_down(Modifiers::none(), 0x04).unwrap();
            reporter.pointer(3, -2, 0, PointerButtons::LEFT).unwrap();
            // Two pump ticks to drain both reports
            Timer::after(Duration::from_millis(100)).await;

            let calls = CLASSIC.take_calls();
            assert!(calls.contains(&ClassicCall::SendReport {
                device: peer.address,
                report_id: 1,
                payload: report_payload(&[0, 0, 4, 0, 0, 0, 0, 0]),
            }));
            assert!(calls.contains(&ClassicCall::SendReport {
                device: peer.address,
                report_id: 2,
                payload: report_payload(&[0x01, 3, 0xFE, 0, 0]),
            }));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn virtual_cable_unplug_disconnects_without_rescanning() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x80);
            connect_classic(&mut events, &peer).await;

            CLASSIC.push_event(ClassicHostEvent::VirtualCableUnplug {
                device: peer.clone(),
            });
            let event = next_connection_event(&mut events).await;
            assert_eq!(
                event,
                ConnectionEvent::Disconnected {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                }
            );
            assert_eq!(state::active_transport(), None);
            Timer::after(Duration::from_millis(50)).await;
            // An unplugged host asked to be forgotten, don't chase it
            assert!(!state::is_scanning());
            let calls = CLASSIC.take_calls();
            assert!(calls.contains(&ClassicCall::Disconnect(peer.address)));
            assert!(!calls.contains(&ClassicCall::StartScan));
        };
        select(engine(), scenario).await;
    });
}

#[test]
fn rescans_when_the_host_drops_the_link() {
    test_block_on(async {
        let scenario = async {
            let mut events = CONNECTION_EVENT_CHANNEL.subscriber().unwrap();
            let mut discovery = DISCOVERY_EVENT_CHANNEL.subscriber().unwrap();
            let peer = device(0x90);
            connect_classic(&mut events, &peer).await;

            CLASSIC.push_event(ClassicHostEvent::ConnectionStateChanged {
                device: peer.clone(),
                state: LinkState::Disconnected,
            });
            let event = next_connection_event(&mut events).await;
            assert_eq!(
                event,
                ConnectionEvent::Disconnected {
                    transport: TransportKind::Classic,
                    device: peer.clone(),
                }
            );
            // Losing the only host flips the transport back to seeking
            assert_eq!(
                next_discovery_event(&mut discovery).await,
                DiscoveryEvent::Started
            );
            assert!(state::is_scanning());
            assert!(CLASSIC.calls().contains(&ClassicCall::StartScan));
        };
        select(engine(), scenario).await;
    });
}

}
