//! Host-link wire protocol: frame layout, opcodes, and status flags.
//!
//! Both directions use fixed 8-byte frames:
//!
//! ```text
//! Byte 0    magic (0x33 request, 0x34 response)
//! Byte 1    opcode (request) / status or error code (response)
//! Byte 2-5  opcode-specific payload / status bytes 2, 3, reserved
//! Byte 6-7  CRC-16/ARC over bytes 0-5, big-endian
//! ```

use crate::crc::{crc16, merge8, split16};

/// Frame length in bytes, both directions.
pub const FRAME_LEN: usize = 8;

/// First byte of every request frame.
pub const MAGIC: u8 = 0x33;

/// First byte of every response frame.
pub const MAGIC_RESP: u8 = 0x34;

/// Plain response codes carried in byte 1 when the OK bit is clear.
pub mod resp {
    /// Sent for a repeat request before any response exists.
    pub const NONE: u8 = 0x00;
    /// Request CRC mismatch; the host should retry.
    pub const CRC_ERROR: u8 = 0x40;
    /// Unknown opcode; not retryable.
    pub const INVALID_ERROR: u8 = 0x45;
    /// A partial frame aged out (serial transport only).
    pub const TIMEOUT_ERROR: u8 = 0x48;
}

/// Status byte 1 flags of a successful response.
pub mod pong {
    pub const OK: u8 = 0x80;
    pub const CAPS: u8 = 0b0000_0001;
    pub const SCROLL: u8 = 0b0000_0010;
    pub const NUM: u8 = 0b0000_0100;
    pub const KEYBOARD_OFFLINE: u8 = 0b0000_1000;
    pub const MOUSE_OFFLINE: u8 = 0b0001_0000;
    pub const RESET_REQUIRED: u8 = 0b0100_0000;
}

/// Status byte 2: active output selection.
pub mod out1 {
    /// Outputs are runtime-reconfigurable.
    pub const DYNAMIC: u8 = 0b1000_0000;

    pub mod kbd {
        pub const MASK: u8 = 0b0000_0111;
        pub const USB: u8 = 0b0000_0001;
        pub const PS2: u8 = 0b0000_0010;
    }

    pub mod mouse {
        pub const MASK: u8 = 0b0011_1000;
        pub const USB_ABS: u8 = 0b0000_1000;
        pub const USB_REL: u8 = 0b0001_0000;
        pub const PS2: u8 = 0b0001_1000;
        pub const USB_WIN98: u8 = 0b0010_0000;
    }
}

/// Status byte 3: capability and connectivity flags.
pub mod out2 {
    pub const HAS_USB: u8 = 0b0000_0001;
    pub const HAS_PS2: u8 = 0b0000_0010;
    pub const HAS_USB_WIN98: u8 = 0b0000_0100;
    pub const CONNECTABLE: u8 = 0b0100_0000;
    pub const CONNECTED: u8 = 0b1000_0000;
}

/// Request opcodes (byte 1).
pub mod cmd {
    pub const PING: u8 = 0x01;
    pub const REPEAT: u8 = 0x02;
    pub const SET_KEYBOARD: u8 = 0x03;
    pub const SET_MOUSE: u8 = 0x04;
    pub const SET_CONNECTED: u8 = 0x05;
    pub const CLEAR_HID: u8 = 0x10;
    pub const KEY: u8 = 0x11;
    pub const MOUSE_BUTTON: u8 = 0x12;
    pub const MOUSE_MOVE: u8 = 0x13;
    pub const MOUSE_RELATIVE: u8 = 0x14;
    pub const MOUSE_WHEEL: u8 = 0x15;

    /// Per-button `{SELECT, STATE}` bit pairs of the MOUSE_BUTTON payload.
    /// LEFT/RIGHT/MIDDLE live in the first payload byte, the extra
    /// buttons in the second.
    pub mod mouse {
        pub const LEFT_SELECT: u8 = 0b1000_0000;
        pub const LEFT_STATE: u8 = 0b0000_1000;
        pub const RIGHT_SELECT: u8 = 0b0100_0000;
        pub const RIGHT_STATE: u8 = 0b0000_0100;
        pub const MIDDLE_SELECT: u8 = 0b0010_0000;
        pub const MIDDLE_STATE: u8 = 0b0000_0010;
        pub const EXTRA_UP_SELECT: u8 = 0b1000_0000;
        pub const EXTRA_UP_STATE: u8 = 0b0000_1000;
        pub const EXTRA_DOWN_SELECT: u8 = 0b0100_0000;
        pub const EXTRA_DOWN_STATE: u8 = 0b0000_0100;
    }
}

/// Fill in the trailing CRC of an outgoing frame.
pub fn seal(frame: &mut [u8; FRAME_LEN]) {
    let (hi, lo) = split16(crc16(&frame[..6]));
    frame[6] = hi;
    frame[7] = lo;
}

/// Check the trailing CRC of a received frame.
pub fn check(frame: &[u8; FRAME_LEN]) -> bool {
    crc16(&frame[..6]) == merge8(frame[6], frame[7])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_check() {
        let mut frame = [MAGIC, cmd::PING, 0, 0, 0, 0, 0, 0];
        assert!(!check(&frame));
        seal(&mut frame);
        assert!(check(&frame));
    }

    #[test]
    fn check_rejects_any_corruption() {
        let mut frame = [MAGIC, cmd::KEY, 0x04, 0x01, 0, 0, 0, 0];
        seal(&mut frame);
        for byte in 0..FRAME_LEN {
            let mut bad = frame;
            bad[byte] ^= 0x01;
            assert!(!check(&bad), "corruption at byte {} accepted", byte);
        }
    }
}
