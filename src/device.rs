//! The device aggregate: command dispatch and the main-loop body.
//!
//! Owns the active keyboard and mouse, the host link, the outputs store,
//! and the auxiliary USB control. The firmware entry point constructs a
//! [`Device`] once in setup and calls [`Device::tick`] forever.
//!
//! Request handling is strictly request/response: every complete frame
//! produces exactly one response frame. A repeat request re-sends the
//! previous status code without re-running its handler; before any
//! response exists it answers with the none code.

use crate::crc::merge8_i16;
use crate::error::Error;
use crate::fmt::{info, warning};
use crate::hid::usb::{KeyboardPort, UsbPort};
use crate::hid::{KbdKind, Keyboard, Mouse, MouseKind};
use crate::keymap::keymap_usb;
use crate::link::{Link, LinkEvent};
use crate::outputs;
use crate::proto::{self, cmd, out1, pong, resp, FRAME_LEN};
use crate::ps2::Ps2Bus;
use crate::storage::{OutputsStore, Storage};
use crate::aum::UsbConnect;

/// Everything the board hands over to the firmware core. Backends whose
/// peripheral is `None` are unavailable and collapse to the dummy driver
/// if selected.
pub struct Peripherals<L, S, KP, MP, KB, MB, A> {
    pub link: L,
    pub storage: S,
    pub usb_keyboard: Option<KP>,
    pub usb_mouse: Option<MP>,
    pub ps2_keyboard: Option<KB>,
    pub ps2_mouse: Option<MB>,
    pub aum: A,
}

/// The firmware core. Lives for the whole uptime; reconfiguration takes
/// effect on the next reset.
pub struct Device<L, S, KP, MP, KB, MB, A> {
    link: L,
    store: OutputsStore<S>,
    kbd: Keyboard<KP, KB>,
    mouse: Mouse<MP, MB>,
    aum: A,
    avail: u8,
    reset_required: bool,
    prev_code: u8,
}

impl<L, S, KP, MP, KB, MB, A> Device<L, S, KP, MP, KB, MB, A>
where
    L: Link,
    S: Storage,
    KP: KeyboardPort,
    MP: UsbPort,
    KB: Ps2Bus,
    MB: Ps2Bus,
    A: UsbConnect,
{
    /// Set up the device: resolve the output selection and bring up the
    /// selected drivers.
    pub fn new(parts: Peripherals<L, S, KP, MP, KB, MB, A>, now_us: u64) -> Self {
        let mut store = OutputsStore::new(parts.storage);
        let selection = outputs::load(&mut store);

        let mut kbd =
            outputs::make_keyboard(selection.active, parts.usb_keyboard, parts.ps2_keyboard);
        let mut mouse = outputs::make_mouse(selection.active, parts.usb_mouse, parts.ps2_mouse);
        kbd.begin(now_us);
        mouse.begin();
        info!("outputs: active={=u8:b} avail={=u8:b}", selection.active, selection.avail);

        Self {
            link: parts.link,
            store,
            kbd,
            mouse,
            aum: parts.aum,
            avail: selection.avail,
            reset_required: false,
            prev_code: resp::NONE,
        }
    }

    /// One main-loop pass. Never blocks.
    pub fn tick(&mut self, now_us: u64) {
        self.aum.pump();
        self.kbd.periodic(now_us);
        self.mouse.periodic(now_us);

        match self.link.poll(now_us) {
            LinkEvent::Idle => {}
            LinkEvent::Request(frame) => {
                let code = self.handle_request(&frame);
                self.respond(code);
            }
            LinkEvent::Timeout => self.respond(resp::TIMEOUT_ERROR),
        }

        self.kbd.ps2_task(now_us);
        self.mouse.ps2_task(now_us);
    }

    /// A driver selection was changed; the host must reset the device to
    /// apply it.
    pub fn reset_required(&self) -> bool {
        self.reset_required
    }

    pub fn keyboard(&self) -> &Keyboard<KP, KB> {
        &self.kbd
    }

    pub fn mouse(&self) -> &Mouse<MP, MB> {
        &self.mouse
    }

    fn handle_request(&mut self, frame: &[u8; FRAME_LEN]) -> u8 {
        if !proto::check(frame) {
            return resp::CRC_ERROR;
        }
        let args = &frame[2..6];
        match frame[1] {
            cmd::PING => pong::OK,
            cmd::REPEAT => 0,
            cmd::SET_KEYBOARD => {
                self.set_outputs(out1::kbd::MASK, args[0]);
                pong::OK
            }
            cmd::SET_MOUSE => {
                self.set_outputs(out1::mouse::MASK, args[0]);
                pong::OK
            }
            cmd::SET_CONNECTED => {
                self.aum.set_connected(args[0] != 0);
                pong::OK
            }
            cmd::CLEAR_HID => {
                self.kbd.clear();
                self.mouse.clear();
                pong::OK
            }
            cmd::KEY => {
                if let Some(code) = keymap_usb(args[0]) {
                    self.kbd.send_key(code, args[1] != 0);
                }
                pong::OK
            }
            cmd::MOUSE_BUTTON => {
                use crate::proto::cmd::mouse::*;
                let pair = |byte: u8, select: u8, state: u8| {
                    (byte & select != 0).then_some(byte & state != 0)
                };
                self.mouse.send_buttons(
                    pair(args[0], LEFT_SELECT, LEFT_STATE),
                    pair(args[0], RIGHT_SELECT, RIGHT_STATE),
                    pair(args[0], MIDDLE_SELECT, MIDDLE_STATE),
                    pair(args[1], EXTRA_UP_SELECT, EXTRA_UP_STATE),
                    pair(args[1], EXTRA_DOWN_SELECT, EXTRA_DOWN_STATE),
                );
                pong::OK
            }
            cmd::MOUSE_MOVE => {
                self.mouse
                    .send_move(merge8_i16(args[0], args[1]), merge8_i16(args[2], args[3]));
                pong::OK
            }
            cmd::MOUSE_RELATIVE => {
                self.mouse.send_relative(args[0] as i8, args[1] as i8);
                pong::OK
            }
            cmd::MOUSE_WHEEL => {
                // Vertical only; the first payload byte is reserved for a
                // horizontal delta that is deliberately not forwarded.
                self.mouse.send_wheel(args[1] as i8);
                pong::OK
            }
            _ => resp::INVALID_ERROR,
        }
    }

    fn set_outputs(&mut self, mask: u8, bits: u8) {
        if cfg!(feature = "dynamic") {
            if self.store.write(mask, bits, false).is_err() {
                warning!("outputs write failed");
            }
            self.reset_required = true;
        }
    }

    /// Build and send the response for `code`; zero means "repeat the
    /// previous one".
    fn respond(&mut self, code: u8) {
        let code = if code == 0 {
            self.prev_code
        } else {
            self.prev_code = code;
            code
        };

        let mut frame = [0u8; FRAME_LEN];
        frame[0] = proto::MAGIC_RESP;
        if code & pong::OK != 0 {
            frame[1] = pong::OK;
            if cfg!(feature = "dynamic") {
                if self.reset_required {
                    frame[1] |= pong::RESET_REQUIRED;
                }
                frame[2] = out1::DYNAMIC;
            }
            if self.kbd.kind() != KbdKind::Dummy {
                if self.kbd.is_offline() {
                    frame[1] |= pong::KEYBOARD_OFFLINE;
                }
                frame[1] |= self.kbd.leds().pong_bits();
                frame[2] |= outputs::kbd_bits(self.kbd.kind());
            }
            if self.mouse.kind() != MouseKind::Dummy {
                if self.mouse.is_offline() {
                    frame[1] |= pong::MOUSE_OFFLINE;
                }
                frame[2] |= outputs::mouse_bits(self.mouse.kind());
            }
            frame[3] = self.avail;
            if self.aum.connectable() {
                frame[3] |= proto::out2::CONNECTABLE;
                if self.aum.connected() {
                    frame[3] |= proto::out2::CONNECTED;
                }
            }
        } else {
            frame[1] = code;
        }
        proto::seal(&mut frame);

        if self.send(&frame).is_err() {
            warning!("response dropped by the link");
        }
    }

    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Error> {
        self.link.send(frame)
    }
}
