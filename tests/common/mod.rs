// Each integration binary pulls in the subset of helpers it needs.
#![allow(dead_code)]

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, Waker};

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, MockDriver, Timer};
use hidlink::channel::{AdvertisingEventSub, ConnectionEventSub, DiscoveryEventSub};
use hidlink::connection::{Address, Device};
use hidlink::event::{AdvertisingEvent, ConnectionEvent, DiscoveryEvent};

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Virtual time advanced per pending poll.
const STEP: Duration = Duration::from_millis(1);

/// Poll budget per test, ten virtual minutes.
const MAX_STEPS: usize = 600_000;

/// Bound on each single event wait inside a scenario. Covers the longest
/// engine timer (the 60s advertising window) with room to spare.
const EVENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Drive a future to completion on the mock clock. Every pending poll
/// advances virtual time by one step, so engine timers fire without
/// wall-clock waits and timeout scenarios stay fast.
pub fn test_block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    let driver = MockDriver::get();
    for _ in 0..MAX_STEPS {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => driver.advance(STEP),
        }
    }
    panic!("test exceeded the virtual time budget");
}

pub async fn next_connection_event(events: &mut ConnectionEventSub) -> ConnectionEvent {
    match select(events.next_message_pure(), Timer::after(EVENT_TIMEOUT)).await {
        Either::First(event) => event,
        Either::Second(()) => panic!("timed out waiting for a connection event"),
    }
}

pub async fn next_advertising_event(events: &mut AdvertisingEventSub) -> AdvertisingEvent {
    match select(events.next_message_pure(), Timer::after(EVENT_TIMEOUT)).await {
        Either::First(event) => event,
        Either::Second(()) => panic!("timed out waiting for an advertising event"),
    }
}

pub async fn next_discovery_event(events: &mut DiscoveryEventSub) -> DiscoveryEvent {
    match select(events.next_message_pure(), Timer::after(EVENT_TIMEOUT)).await {
        Either::First(event) => event,
        Either::Second(()) => panic!("timed out waiting for a discovery event"),
    }
}

/// Test peer with a recognizable address.
pub fn device(octet: u8) -> Device {
    Device::new(Address::new([octet, 0x23, 0x45, 0x67, 0x89, 0xAB]))
}
