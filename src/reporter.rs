//! Producer-side input composition.
//!
//! [`InputReporter`] turns key and pointer intents into wire reports and
//! enqueues them on `INPUT_REPORT_CHANNEL` for the facade to route. It never
//! talks to a transport and never blocks; a full queue surfaces as
//! [`HidError::QueueFull`].

use crate::channel::INPUT_REPORT_CHANNEL;
use crate::hid::{HidError, InputReport, KeyboardReport, PointerReport};

/// Keyboard modifier bitmask, boot protocol bit order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Modifiers(u8);

impl Modifiers {
    pub const LCTRL: Modifiers = Modifiers(0x01);
    pub const LSHIFT: Modifiers = Modifiers(0x02);
    pub const LALT: Modifiers = Modifiers(0x04);
    pub const LGUI: Modifiers = Modifiers(0x08);
    pub const RCTRL: Modifiers = Modifiers(0x10);
    pub const RSHIFT: Modifiers = Modifiers(0x20);
    pub const RALT: Modifiers = Modifiers(0x40);
    pub const RGUI: Modifiers = Modifiers(0x80);

    pub const fn none() -> Self {
        Modifiers(0)
    }

    pub const fn with(self, other: Modifiers) -> Self {
        Modifiers(self.0 | other.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Pointer button bitmask: bit 0 left, bit 1 right, bit 2 middle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PointerButtons(u8);

impl PointerButtons {
    pub const LEFT: PointerButtons = PointerButtons(0x01);
    pub const RIGHT: PointerButtons = PointerButtons(0x02);
    pub const MIDDLE: PointerButtons = PointerButtons(0x04);

    pub const fn none() -> Self {
        PointerButtons(0)
    }

    pub const fn with(self, other: PointerButtons) -> Self {
        PointerButtons(self.0 | other.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

fn clamp_delta(delta: i16) -> i8 {
    delta.clamp(-127, 127) as i8
}

#[derive(Default)]
pub struct InputReporter {
    last_pointer: PointerReport,
}

impl InputReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Press one key. A preceding modifier-only report makes hosts apply the
    /// modifier before they see the key.
    pub fn key_down(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), HidError> {
        if !modifiers.is_empty() {
            self.enqueue(InputReport::keyboard(KeyboardReport {
                modifier: modifiers.bits(),
                ..KeyboardReport::default()
            })?)?;
        }
        let mut keycodes = [0u8; 6];
        keycodes[0] = keycode;
        self.enqueue(InputReport::keyboard(KeyboardReport {
            modifier: modifiers.bits(),
            reserved: 0,
            keycodes,
        })?)
    }

    /// Release a key: first drop the key while the modifiers are still held,
    /// then release everything.
    pub fn key_up(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), HidError> {
        debug!("key up {} (modifiers {})", keycode, modifiers.bits());
        self.enqueue(InputReport::keyboard(KeyboardReport {
            modifier: modifiers.bits(),
            ..KeyboardReport::default()
        })?)?;
        self.enqueue(InputReport::keyboard(KeyboardReport::default())?)
    }

    /// Relative pointer motion, deltas clamped to [-127, 127]. Consecutive
    /// all-zero reports are suppressed; the first one still goes out so the
    /// host sees buttons released and motion stopped.
    pub fn pointer(
        &mut self,
        dx: i16,
        dy: i16,
        wheel: i16,
        buttons: PointerButtons,
    ) -> Result<(), HidError> {
        let report = PointerReport {
            buttons: buttons.bits(),
            x: clamp_delta(dx),
            y: clamp_delta(dy),
            wheel: clamp_delta(wheel),
            reserved: 0,
        };
        if report.is_zero() && self.last_pointer.is_zero() {
            return Ok(());
        }
        self.last_pointer = report;
        self.enqueue(InputReport::pointer(report)?)
    }

    fn enqueue(&self, report: InputReport) -> Result<(), HidError> {
        INPUT_REPORT_CHANNEL
            .try_send(report)
            .map_err(|_| HidError::QueueFull)
    }
}
