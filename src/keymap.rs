//! Key code translation tables.
//!
//! The host link carries USB HID usage IDs. The USB drivers consume them
//! directly (boot report key slots are HID usages); the PS/2 keyboard
//! engine translates them to scan code set 2 via the tables below.

/// First HID usage of the modifier block (LeftControl).
pub const HID_MOD_FIRST: u8 = 0xE0;

/// Last HID usage of the modifier block (RightGui).
pub const HID_MOD_LAST: u8 = 0xE7;

/// HID usage of the Pause key, which has no single set-2 make code and is
/// emitted as a fixed multi-byte sequence.
pub const HID_PAUSE: u8 = 0x48;

/// HID usage -> scan code set 2 make byte for usages 0x00..=0x73. Index
/// is the usage ID; the first four slots are the HID error roll-over
/// codes and unused.
pub const HID_TO_SET2: [u8; 116] = [
    0x00, 0x00, 0xFC, 0x00, 0x1C, 0x32, 0x21, 0x23, 0x24, 0x2B, 0x34, 0x33, 0x43, 0x3B, 0x42, 0x4B,
    0x3A, 0x31, 0x44, 0x4D, 0x15, 0x2D, 0x1B, 0x2C, 0x3C, 0x2A, 0x1D, 0x22, 0x35, 0x1A, 0x16, 0x1E,
    0x26, 0x25, 0x2E, 0x36, 0x3D, 0x3E, 0x46, 0x45, 0x5A, 0x76, 0x66, 0x0D, 0x29, 0x4E, 0x55, 0x54,
    0x5B, 0x5D, 0x5D, 0x4C, 0x52, 0x0E, 0x41, 0x49, 0x4A, 0x58, 0x05, 0x06, 0x04, 0x0C, 0x03, 0x0B,
    0x83, 0x0A, 0x01, 0x09, 0x78, 0x07, 0x7C, 0x7E, 0x7E, 0x70, 0x6C, 0x7D, 0x71, 0x69, 0x7A, 0x74,
    0x6B, 0x72, 0x75, 0x77, 0x4A, 0x7C, 0x7B, 0x79, 0x5A, 0x69, 0x72, 0x7A, 0x6B, 0x73, 0x74, 0x6C,
    0x75, 0x7D, 0x70, 0x71, 0x61, 0x2F, 0x37, 0x0F, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0x40,
    0x48, 0x50, 0x57, 0x5F,
];

/// Modifier usage (0xE0..=0xE7, indexed by `usage - 0xE0`) -> set-2 make
/// byte: LCtrl, LShift, LAlt, LGui, RCtrl, RShift, RAlt, RGui.
pub const MOD_TO_SET2: [u8; 8] = [0x14, 0x12, 0x11, 0x1F, 0x14, 0x59, 0x11, 0x27];

/// Whether a regular key's set-2 sequence carries the `0xE0` extended
/// prefix. The argument is the HID usage, not the set-2 byte.
pub fn needs_e0(usage: u8) -> bool {
    usage == 0x46
        || (0x49..=0x52).contains(&usage)
        || usage == 0x54
        || usage == 0x58
        || usage == 0x65
        || usage == 0x66
        || usage >= 0x81
}

/// Whether a modifier (indexed by `usage - 0xE0`) carries the `0xE0`
/// prefix. The right-hand modifiers do, except RightShift.
pub fn modifier_needs_e0(index: u8) -> bool {
    index > 2 && index != 5
}

/// Validate a host-supplied key code for the USB drivers. Usages outside
/// the defined key and modifier blocks have no report encoding and are
/// dropped by the caller.
pub fn keymap_usb(usage: u8) -> Option<u8> {
    if (0x04..HID_TO_SET2.len() as u8).contains(&usage)
        || (HID_MOD_FIRST..=HID_MOD_LAST).contains(&usage)
    {
        Some(usage)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_a() {
        assert_eq!(HID_TO_SET2[0x04], 0x1C);
        assert!(!needs_e0(0x04));
    }

    #[test]
    fn insert_is_extended() {
        assert_eq!(HID_TO_SET2[0x49], 0x70);
        assert!(needs_e0(0x49));
    }

    #[test]
    fn extended_set_bounds() {
        // Closed set: 0x46, 0x49..=0x52, 0x54, 0x58, 0x65, 0x66, >= 0x81.
        assert!(needs_e0(0x46));
        assert!(!needs_e0(0x47));
        assert!(!needs_e0(0x48));
        assert!(needs_e0(0x52));
        assert!(!needs_e0(0x53));
        assert!(needs_e0(0x54));
        assert!(!needs_e0(0x55));
        assert!(needs_e0(0x58));
        assert!(needs_e0(0x65));
        assert!(needs_e0(0x66));
        assert!(!needs_e0(0x67));
        assert!(needs_e0(0x81));
    }

    #[test]
    fn shift_modifiers() {
        // LeftShift maps plain, RightShift maps to 0x59 without a prefix.
        assert_eq!(MOD_TO_SET2[0x01], 0x12);
        assert!(!modifier_needs_e0(0x01));
        assert_eq!(MOD_TO_SET2[0x05], 0x59);
        assert!(!modifier_needs_e0(0x05));
        // Right-hand Ctrl/Alt/Gui are extended.
        assert!(modifier_needs_e0(0x04));
        assert!(modifier_needs_e0(0x06));
        assert!(modifier_needs_e0(0x07));
        assert!(!modifier_needs_e0(0x00));
        assert!(!modifier_needs_e0(0x03));
    }

    #[test]
    fn usb_filter() {
        assert_eq!(keymap_usb(0x04), Some(0x04));
        assert_eq!(keymap_usb(0x73), Some(0x73));
        assert_eq!(keymap_usb(0xE0), Some(0xE0));
        assert_eq!(keymap_usb(0xE7), Some(0xE7));
        assert_eq!(keymap_usb(0x00), None);
        assert_eq!(keymap_usb(0x03), None);
        assert_eq!(keymap_usb(0x80), None);
        assert_eq!(keymap_usb(0xFF), None);
    }
}
