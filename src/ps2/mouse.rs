//! PS/2 mouse engine: host command handling and movement packets.
//!
//! Implements a standard three-button PS/2 mouse that upgrades itself to
//! an IntelliMouse (device ID 3, wheel) or IntelliMouse Explorer (device
//! ID 4, wheel plus buttons 4/5) when the host performs the magic
//! Set-Sample-Rate sequences.

use super::{Ps2Bus, Ps2Phy};
use crate::hid::MouseButton;

const ACK: u8 = 0xFA;
const SELF_TEST_PASSED: u8 = 0xAA;

/// Set-Sample-Rate; its argument byte feeds the magic sequences.
const SET_SAMPLE_RATE: u8 = 0xF3;

/// 200, 100, 80 upgrades to the wheel mouse.
const MAGIC_WHEEL: u32 = 0x00C8_6450;

/// 200, 200, 80 upgrades further to the 5-button wheel mouse.
const MAGIC_EXPLORER: u32 = 0x00C8_C850;

/// One emulated PS/2 mouse channel.
pub struct Ps2Mouse<B> {
    phy: Ps2Phy<B>,
    streaming: bool,
    magic_seq: u32,
    device_id: u8,
    buttons: u8,
    prev_byte: u8,
    online: bool,
}

impl<B: Ps2Bus> Ps2Mouse<B> {
    pub fn new(bus: B) -> Self {
        Self {
            phy: Ps2Phy::new(bus),
            streaming: false,
            magic_seq: 0,
            device_id: 0,
            buttons: 0,
            prev_byte: 0,
            online: false,
        }
    }

    pub fn begin(&mut self) {
        // Nothing to announce; the target opens with a reset command.
    }

    /// Bit-bang task; call from the main loop.
    pub fn task(&mut self, now_us: u64) {
        if let Some(byte) = self.phy.poll(now_us) {
            self.receive(byte);
        }
        self.online = self.streaming && self.phy.online(now_us);
    }

    pub fn send_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
        self.packet(0, 0, 0, 0);
    }

    pub fn send_rel(&mut self, dx: i8, dy: i8) {
        self.packet(dx, dy, 0, 0);
    }

    pub fn send_wheel(&mut self, dy: i8) {
        self.packet(0, 0, 0, dy);
    }

    /// Release all buttons.
    pub fn clear(&mut self) {
        self.buttons = 0;
        self.packet(0, 0, 0, 0);
    }

    pub fn is_offline(&self) -> bool {
        !self.online
    }

    /// Bytes queued toward the target host.
    pub fn pending_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.phy.pending()
    }

    fn receive(&mut self, byte: u8) {
        let prev = self.prev_byte;
        self.prev_byte = byte;

        if prev == SET_SAMPLE_RATE {
            self.magic_seq = ((self.magic_seq << 8) | u32::from(byte)) & 0x00FF_FFFF;
            if self.device_id == 0 && self.magic_seq == MAGIC_WHEEL {
                self.device_id = 3;
            } else if self.device_id == 3 && self.magic_seq == MAGIC_EXPLORER {
                self.device_id = 4;
            }
        } else {
            match byte {
                0xFF => {
                    // Reset: ack, self-test pass, device ID.
                    self.streaming = false;
                    self.device_id = 0;
                    self.buttons = 0;
                    self.phy.send(ACK);
                    self.phy.send(SELF_TEST_PASSED);
                    self.phy.send(self.device_id);
                    return;
                }
                0xF6 => {
                    // Set Defaults.
                    self.streaming = false;
                    self.device_id = 0;
                }
                0xF5 | 0xEA => self.streaming = false,
                0xF4 => self.streaming = true,
                0xF2 => {
                    self.phy.send(ACK);
                    self.phy.send(self.device_id);
                    return;
                }
                0xE9 => {
                    // Status request: stream mode, resolution, sample rate.
                    self.phy.send(ACK);
                    self.phy.send(0x00);
                    self.phy.send(0x02);
                    self.phy.send(100);
                    return;
                }
                _ => {}
            }
        }
        self.phy.send(ACK);
    }

    /// Queue one movement packet when data reporting is enabled.
    fn packet(&mut self, x: i8, y: i8, h: i8, v: i8) {
        if !self.streaming {
            return;
        }
        // PS/2 Y grows upward, HID Y downward.
        let byte2 = x;
        let byte3 = y.wrapping_neg();
        let mut byte1: u8 = 0x08 | (self.buttons & 0x07);
        if byte2 < 0 {
            byte1 |= 0x10;
        }
        if byte3 < 0 {
            byte1 |= 0x20;
        }
        self.phy.send(byte1);
        self.phy.send(byte2 as u8);
        self.phy.send(byte3 as u8);

        if self.device_id == 3 || self.device_id == 4 {
            let mut byte4: u8 = 0;
            if v < 0 {
                byte4 = 0x01;
            } else if v > 0 {
                byte4 = 0xFF;
            }
            if h < 0 {
                byte4 = 0x02;
            } else if h > 0 {
                byte4 = 0xFE;
            }
            if self.device_id == 4 {
                byte4 = (byte4 & 0x0F) | ((self.buttons << 1) & 0x30);
            }
            self.phy.send(byte4);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps2::testutil::InhibitedBus;

    fn mouse() -> Ps2Mouse<InhibitedBus> {
        Ps2Mouse::new(InhibitedBus)
    }

    fn queued(mouse: &Ps2Mouse<InhibitedBus>) -> std::vec::Vec<u8> {
        mouse.pending_bytes().collect()
    }

    fn enable_streaming(mouse: &mut Ps2Mouse<InhibitedBus>) {
        mouse.receive(0xF4);
    }

    #[test]
    fn reset_reports_plain_mouse() {
        let mut mouse = mouse();
        mouse.receive(0xFF);
        assert_eq!(queued(&mouse), vec![ACK, SELF_TEST_PASSED, 0x00]);
    }

    #[test]
    fn no_packets_until_reporting_enabled() {
        let mut mouse = mouse();
        mouse.send_rel(5, 5);
        assert!(queued(&mouse).is_empty());

        enable_streaming(&mut mouse);
        mouse.send_rel(5, 5);
        assert_eq!(queued(&mouse).len(), 1 + 3); // ACK + packet
    }

    #[test]
    fn packet_layout_and_y_inversion() {
        let mut mouse = mouse();
        enable_streaming(&mut mouse);
        mouse.send_button(MouseButton::Left, true);
        mouse.send_rel(-3, 7);

        let bytes = queued(&mouse);
        // ACK, then button packet, then movement packet.
        assert_eq!(bytes[0], ACK);
        assert_eq!(&bytes[1..4], &[0x09, 0x00, 0x00]);
        // -3 right, 7 down: sign bits for negative x and negated y.
        assert_eq!(&bytes[4..7], &[0x08 | 0x01 | 0x10 | 0x20, 0xFD, 0xF9]);
    }

    #[test]
    fn wheel_requires_intellimouse_upgrade() {
        let mut mouse = mouse();
        enable_streaming(&mut mouse);
        mouse.send_wheel(1);
        assert_eq!(queued(&mouse).len(), 1 + 3); // three-byte packet, no wheel

        // Magic sequence: F3 C8, F3 64, F3 50.
        for byte in [0xF3, 0xC8, 0xF3, 0x64, 0xF3, 0x50] {
            mouse.receive(byte);
        }
        assert_eq!(mouse.device_id, 3);
        mouse.receive(0xF2);
        assert!(queued(&mouse).ends_with(&[ACK, 3]));

        mouse.send_wheel(-1);
        assert!(queued(&mouse).ends_with(&[0x08, 0x00, 0x00, 0x01]));
        mouse.send_wheel(1);
        assert!(queued(&mouse).ends_with(&[0x08, 0x00, 0x00, 0xFF]));
    }

    #[test]
    fn explorer_upgrade_reports_extra_buttons() {
        let mut mouse = mouse();
        enable_streaming(&mut mouse);
        for byte in [0xF3, 0xC8, 0xF3, 0x64, 0xF3, 0x50] {
            mouse.receive(byte);
        }
        for byte in [0xF3, 0xC8, 0xF3, 0xC8, 0xF3, 0x50] {
            mouse.receive(byte);
        }
        assert_eq!(mouse.device_id, 4);

        mouse.send_button(MouseButton::Backward, true);
        // Button 4 lives in bit 4 of the fourth byte.
        assert!(queued(&mouse).ends_with(&[0x08, 0x00, 0x00, 0x10]));
    }

    #[test]
    fn status_request() {
        let mut mouse = mouse();
        mouse.receive(0xE9);
        assert_eq!(queued(&mouse), vec![ACK, 0x00, 0x02, 100]);
    }

    #[test]
    fn set_defaults_downgrades() {
        let mut mouse = mouse();
        enable_streaming(&mut mouse);
        for byte in [0xF3, 0xC8, 0xF3, 0x64, 0xF3, 0x50] {
            mouse.receive(byte);
        }
        assert_eq!(mouse.device_id, 3);

        mouse.receive(0xF6);
        assert_eq!(mouse.device_id, 0);
        assert!(!mouse.streaming);
    }

    #[test]
    fn clear_releases_buttons() {
        let mut mouse = mouse();
        enable_streaming(&mut mouse);
        mouse.send_button(MouseButton::Left, true);
        mouse.clear();
        assert!(queued(&mouse).ends_with(&[0x08, 0x00, 0x00]));
    }
}
