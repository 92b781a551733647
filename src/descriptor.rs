//! HID report map shared by both transports.
//!
//! The same descriptor bytes are served from the GATT Report Map
//! characteristic and embedded in the classic SDP record, so the composite
//! keyboard + pointer layout lives here once, built from short-item helpers.

/// Report ids for the composite report map. Ids start from 0x01.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportType {
    Keyboard = 0x01,
    Pointer = 0x02,
}

// Short-item prefix bytes: high nibble is the item tag (plus the item type
// bits), the low two bits carry the data size in bytes.
const fn input(size: u8) -> u8 {
    0x80 | size
}
const fn output(size: u8) -> u8 {
    0x90 | size
}
const fn collection(size: u8) -> u8 {
    0xA0 | size
}
const END_COLLECTION: u8 = 0xC0;
const fn usage_page(size: u8) -> u8 {
    0x04 | size
}
const fn logical_minimum(size: u8) -> u8 {
    0x14 | size
}
const fn logical_maximum(size: u8) -> u8 {
    0x24 | size
}
const fn report_size(size: u8) -> u8 {
    0x74 | size
}
const fn report_id(size: u8) -> u8 {
    0x84 | size
}
const fn report_count(size: u8) -> u8 {
    0x94 | size
}
const fn usage(size: u8) -> u8 {
    0x08 | size
}
const fn usage_minimum(size: u8) -> u8 {
    0x18 | size
}
const fn usage_maximum(size: u8) -> u8 {
    0x28 | size
}

/// Keyboard collection, report id 1: 8 modifier bits (usages 0xE0-0xE7), one
/// reserved byte, 5 LED output bits plus 3 bits padding, and a 6 key array.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_MAP: [u8; 65] = [
    usage_page(1),      0x01,                       // Generic Desktop
    usage(1),           0x06,                       // Keyboard
    collection(1),      0x01,                       // Application
    report_id(1),       ReportType::Keyboard as u8,
    usage_page(1),      0x07,                       // Keyboard/Keypad
    usage_minimum(1),   0xE0,
    usage_maximum(1),   0xE7,
    logical_minimum(1), 0x00,
    logical_maximum(1), 0x01,
    report_size(1),     0x01,
    report_count(1),    0x08,
    input(1),           0x02,                       // Data, Variable, Absolute: modifiers
    report_count(1),    0x01,
    report_size(1),     0x08,
    input(1),           0x01,                       // Constant: reserved byte
    report_count(1),    0x05,
    report_size(1),     0x01,
    usage_page(1),      0x08,                       // LEDs
    usage_minimum(1),   0x01,
    usage_maximum(1),   0x05,
    output(1),          0x02,                       // Data, Variable, Absolute: LEDs
    report_count(1),    0x01,
    report_size(1),     0x03,
    output(1),          0x01,                       // Constant: LED padding
    report_count(1),    0x06,
    report_size(1),     0x08,
    logical_minimum(1), 0x00,
    logical_maximum(1), 0x65,
    usage_page(1),      0x07,                       // Keyboard/Keypad
    usage_minimum(1),   0x00,
    usage_maximum(1),   0x65,
    input(1),           0x00,                       // Data, Array: 6 key slots
    END_COLLECTION,
];

/// Pointer collection, report id 2: 3 button bits plus 5 bits padding, then
/// X/Y/wheel as signed bytes inside a nested physical collection.
#[rustfmt::skip]
pub const POINTER_REPORT_MAP: [u8; 54] = [
    usage_page(1),      0x01,                       // Generic Desktop
    usage(1),           0x02,                       // Mouse
    collection(1),      0x01,                       // Application
    report_id(1),       ReportType::Pointer as u8,
    usage(1),           0x01,                       // Pointer
    collection(1),      0x00,                       // Physical
    usage_page(1),      0x09,                       // Buttons
    usage_minimum(1),   0x01,
    usage_maximum(1),   0x03,
    logical_minimum(1), 0x00,
    logical_maximum(1), 0x01,
    report_count(1),    0x03,
    report_size(1),     0x01,
    input(1),           0x02,                       // Data, Variable, Absolute: buttons
    report_count(1),    0x01,
    report_size(1),     0x05,
    input(1),           0x01,                       // Constant: button padding
    usage_page(1),      0x01,                       // Generic Desktop
    usage(1),           0x30,                       // X
    usage(1),           0x31,                       // Y
    usage(1),           0x38,                       // Wheel
    logical_minimum(1), 0x81,                       // -127
    logical_maximum(1), 0x7F,                       // 127
    report_size(1),     0x08,
    report_count(1),    0x03,
    input(1),           0x06,                       // Data, Variable, Relative: deltas
    END_COLLECTION,
    END_COLLECTION,
];

/// The composite report map served to hosts, keyboard collection first.
pub const REPORT_MAP: [u8; KEYBOARD_REPORT_MAP.len() + POINTER_REPORT_MAP.len()] = concat_report_maps();

const fn concat_report_maps() -> [u8; KEYBOARD_REPORT_MAP.len() + POINTER_REPORT_MAP.len()] {
    let mut out = [0u8; KEYBOARD_REPORT_MAP.len() + POINTER_REPORT_MAP.len()];
    let mut i = 0;
    while i < KEYBOARD_REPORT_MAP.len() {
        out[i] = KEYBOARD_REPORT_MAP[i];
        i += 1;
    }
    let mut j = 0;
    while j < POINTER_REPORT_MAP.len() {
        out[KEYBOARD_REPORT_MAP.len() + j] = POINTER_REPORT_MAP[j];
        j += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal HID short-item walker, enough to audit our own map: collection
    /// nesting, report ids, and per-report input/output bit widths.
    #[derive(Default)]
    struct ParsedMap {
        top_level_collections: usize,
        report_ids: std::vec::Vec<u8>,
        input_bits: std::collections::BTreeMap<u8, u32>,
        output_bits: std::collections::BTreeMap<u8, u32>,
    }

    fn parse(map: &[u8]) -> ParsedMap {
        let mut parsed = ParsedMap::default();
        let mut depth = 0usize;
        let mut current_id = 0u8;
        let mut size_bits = 0u32;
        let mut count = 0u32;
        let mut i = 0usize;
        while i < map.len() {
            let prefix = map[i];
            let data_len = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            let data = &map[i + 1..i + 1 + data_len];
            let value = data.iter().rev().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            match prefix & 0xFC {
                0xA0 => {
                    if depth == 0 {
                        parsed.top_level_collections += 1;
                    }
                    depth += 1;
                }
                0xC0 => depth -= 1,
                0x84 => {
                    current_id = value as u8;
                    parsed.report_ids.push(current_id);
                }
                0x74 => size_bits = value,
                0x94 => count = value,
                0x80 => *parsed.input_bits.entry(current_id).or_default() += size_bits * count,
                0x90 => *parsed.output_bits.entry(current_id).or_default() += size_bits * count,
                _ => {}
            }
            i += 1 + data_len;
        }
        assert_eq!(depth, 0, "unbalanced collections");
        parsed
    }

    #[test]
    fn item_prefix_encoding() {
        assert_eq!(input(1), 0x81);
        assert_eq!(output(1), 0x91);
        assert_eq!(collection(1), 0xA1);
        assert_eq!(END_COLLECTION, 0xC0);
        assert_eq!(usage_page(1), 0x05);
        assert_eq!(logical_minimum(1), 0x15);
        assert_eq!(logical_maximum(1), 0x25);
        assert_eq!(report_size(1), 0x75);
        assert_eq!(report_id(1), 0x85);
        assert_eq!(report_count(1), 0x95);
        assert_eq!(usage(1), 0x09);
        assert_eq!(usage_minimum(1), 0x19);
        assert_eq!(usage_maximum(1), 0x29);
    }

    #[test]
    fn composite_map_round_trips() {
        let parsed = parse(&REPORT_MAP);
        assert_eq!(parsed.top_level_collections, 2);
        assert_eq!(parsed.report_ids, [KEYBOARD_REPORT_ID_BYTE, POINTER_REPORT_ID_BYTE]);
        // Keyboard: 8 modifier bits + 8 reserved bits + 6x8 key bits
        assert_eq!(parsed.input_bits[&1], 64);
        // Keyboard LEDs: 5 bits + 3 padding
        assert_eq!(parsed.output_bits[&1], 8);
        // Pointer: 3 buttons + 5 padding + 3 signed bytes
        assert_eq!(parsed.input_bits[&2], 32);
    }

    const KEYBOARD_REPORT_ID_BYTE: u8 = ReportType::Keyboard as u8;
    const POINTER_REPORT_ID_BYTE: u8 = ReportType::Pointer as u8;

    #[test]
    fn keyboard_collection_comes_first() {
        assert_eq!(REPORT_MAP.len(), 119);
        assert_eq!(&REPORT_MAP[..KEYBOARD_REPORT_MAP.len()], &KEYBOARD_REPORT_MAP);
        assert_eq!(&REPORT_MAP[KEYBOARD_REPORT_MAP.len()..], &POINTER_REPORT_MAP);
    }
}
