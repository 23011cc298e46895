//! PS/2 keyboard engine: host command handling and scan code emission.
//!
//! Sits on top of [`Ps2Phy`] and implements the AT keyboard command set
//! (reset, identify, LEDs, typematic, enable/disable) plus translation of
//! HID key events into scan code set 2 make/break sequences.

use heapless::Vec;

use super::{Ps2Bus, Ps2Phy};
use crate::clock::Deadline;
use crate::config::{
    PS2_DEFAULT_DELAY_MS, PS2_DEFAULT_REPEAT_US, PS2_PRESSED_KEYS, PS2_SELFTEST_DELAY_US,
};
use crate::fmt::debug;
use crate::hid::KeyboardLeds;
use crate::keymap::{
    modifier_needs_e0, needs_e0, HID_MOD_FIRST, HID_MOD_LAST, HID_PAUSE, HID_TO_SET2, MOD_TO_SET2,
};

const ACK: u8 = 0xFA;
const SELF_TEST_PASSED: u8 = 0xAA;
const BREAK: u8 = 0xF0;
const EXTENDED: u8 = 0xE0;

/// Typematic repeat interval (µs) by the low five bits of the 0xF3
/// argument.
const REPEAT_US: [u32; 32] = [
    33_333, 37_453, 41_667, 45_872, 48_309, 54_054, 58_480, 62_500, 66_667, 75_188, 83_333, 91_743,
    100_000, 108_696, 116_279, 125_000, 133_333, 149_254, 166_667, 181_818, 200_000, 217_391,
    232_558, 250_000, 270_270, 303_030, 333_333, 370_370, 400_000, 434_783, 476_190, 500_000,
];

/// Typematic delay (ms) by bits 5-6 of the 0xF3 argument.
const DELAY_MS: [u16; 4] = [250, 500, 750, 1000];

/// Commands whose argument arrives as the next byte.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    SetLeds,
    SetTypematic,
}

/// One emulated PS/2 keyboard channel.
pub struct Ps2Keyboard<B> {
    phy: Ps2Phy<B>,
    /// Raw LED mask as set by the target: scroll = 1, num = 2, caps = 4.
    leds: u8,
    scanning: bool,
    pending: Pending,
    repeat_us: u32,
    delay_ms: u16,
    /// Held Ctrl keys; selects the Ctrl+Pause (Break) sequence.
    ctrl_held: i8,
    mods: u8,
    pressed: Vec<u8, PS2_PRESSED_KEYS>,
    selftest: Deadline,
    online: bool,
}

impl<B: Ps2Bus> Ps2Keyboard<B> {
    pub fn new(bus: B) -> Self {
        Self {
            phy: Ps2Phy::new(bus),
            leds: 0,
            scanning: true,
            pending: Pending::None,
            repeat_us: PS2_DEFAULT_REPEAT_US,
            delay_ms: PS2_DEFAULT_DELAY_MS,
            ctrl_held: 0,
            mods: 0,
            pressed: Vec::new(),
            selftest: Deadline::new(),
            online: false,
        }
    }

    pub fn begin(&mut self, now_us: u64) {
        self.reset(now_us);
    }

    /// Bit-bang task plus deferred work; call from the main loop.
    pub fn task(&mut self, now_us: u64) {
        if let Some(byte) = self.phy.poll(now_us) {
            self.receive(byte, now_us);
        }
        if self.selftest.fire(now_us) {
            self.leds = 0;
            self.phy.send(SELF_TEST_PASSED);
        }
        self.online = self.scanning && self.phy.online(now_us);
    }

    pub fn send_key(&mut self, code: u8, pressed: bool) {
        if !self.scanning {
            return;
        }
        if (HID_MOD_FIRST..=HID_MOD_LAST).contains(&code) {
            self.send_modifier(code - HID_MOD_FIRST, pressed);
        } else if code == HID_PAUSE {
            self.send_pause(pressed);
        } else if let Some(&make) = HID_TO_SET2.get(code as usize) {
            if needs_e0(code) {
                self.phy.send(EXTENDED);
            }
            if pressed {
                if !self.pressed.contains(&code) {
                    let _ = self.pressed.push(code);
                }
            } else {
                if let Some(slot) = self.pressed.iter().position(|&k| k == code) {
                    self.pressed.swap_remove(slot);
                }
                self.phy.send(BREAK);
            }
            self.phy.send(make);
        }
    }

    /// Release everything currently held.
    pub fn clear(&mut self) {
        let mods = self.mods;
        for index in 0..8 {
            if mods & (1 << index) != 0 {
                self.send_key(HID_MOD_FIRST + index, false);
            }
        }
        let held: Vec<u8, PS2_PRESSED_KEYS> = self.pressed.clone();
        for code in held {
            self.send_key(code, false);
        }
    }

    pub fn leds(&self) -> KeyboardLeds {
        KeyboardLeds {
            caps: self.leds & 0b100 != 0,
            scroll: self.leds & 0b001 != 0,
            num: self.leds & 0b010 != 0,
        }
    }

    pub fn is_offline(&self) -> bool {
        !self.online
    }

    /// Bytes queued toward the target host.
    pub fn pending_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.phy.pending()
    }

    fn reset(&mut self, now_us: u64) {
        self.scanning = true;
        self.repeat_us = PS2_DEFAULT_REPEAT_US;
        self.delay_ms = PS2_DEFAULT_DELAY_MS;
        // All LEDs on until the self-test pass byte goes out.
        self.leds = 7;
        self.selftest.arm(now_us, PS2_SELFTEST_DELAY_US);
    }

    fn receive(&mut self, byte: u8, now_us: u64) {
        match self.pending {
            Pending::SetLeds => {
                self.leds = if byte > 7 { 0 } else { byte };
                self.pending = Pending::None;
            }
            Pending::SetTypematic => {
                self.repeat_us = REPEAT_US[(byte & 0x1F) as usize];
                self.delay_ms = DELAY_MS[((byte & 0x60) >> 5) as usize];
                self.pending = Pending::None;
            }
            Pending::None => match byte {
                0xFF => self.reset(now_us),
                0xEE => {
                    // Echo answers with itself, not with an ACK.
                    self.phy.send(0xEE);
                    return;
                }
                0xF2 => {
                    self.phy.send(ACK);
                    self.phy.send(0xAB);
                    self.phy.send(0x83);
                    return;
                }
                0xED => self.pending = Pending::SetLeds,
                0xF3 => self.pending = Pending::SetTypematic,
                0xF4 => self.scanning = true,
                0xF5 | 0xF6 => {
                    self.scanning = byte == 0xF6;
                    self.repeat_us = PS2_DEFAULT_REPEAT_US;
                    self.delay_ms = PS2_DEFAULT_DELAY_MS;
                    self.leds = 0;
                }
                _ => debug!("ps2 kbd: unhandled command {=u8:x}", byte),
            },
        }
        self.phy.send(ACK);
    }

    fn send_modifier(&mut self, index: u8, pressed: bool) {
        // Ctrl state feeds the Pause/Break variant selection.
        if index == 0 || index == 4 {
            self.ctrl_held += if pressed { 1 } else { -1 };
            if !(0..=2).contains(&self.ctrl_held) {
                self.ctrl_held = 0;
            }
        }
        let bit = 1 << index;
        if pressed {
            self.mods |= bit;
        } else {
            self.mods &= !bit;
        }

        if modifier_needs_e0(index) {
            self.phy.send(EXTENDED);
        }
        if !pressed {
            self.phy.send(BREAK);
        }
        self.phy.send(MOD_TO_SET2[index as usize]);
    }

    /// Pause has no break code; Ctrl+Pause is the distinct Break key.
    fn send_pause(&mut self, pressed: bool) {
        if !pressed {
            return;
        }
        if self.ctrl_held > 0 {
            for byte in [0xE0, 0x7E, 0xE0, 0xF0, 0x7E] {
                self.phy.send(byte);
            }
        } else {
            for byte in [0xE1, 0x14, 0x77, 0xE1, 0xF0, 0x14, 0xF0, 0x77] {
                self.phy.send(byte);
            }
        }
    }
}
