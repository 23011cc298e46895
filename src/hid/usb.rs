//! USB HID keyboard and mouse drivers.
//!
//! Descriptor submission and enumeration are the board's business; the
//! drivers talk to a minimal port abstraction covering exactly the
//! operations they need: readiness, suspend state, remote wakeup, report
//! submission, and (for the keyboard) the host's LED output report.
//!
//! Report layouts:
//!
//! ```text
//! keyboard  [modifiers, 0, k0, k1, k2, k3, k4, k5]            (boot protocol)
//! abs mouse [buttons, x_lo, x_hi, y_lo, y_hi, wheel]          (x, y unsigned LE)
//! rel mouse [buttons, dx, dy, wheel]                          (dx, dy, wheel signed)
//! ```

use super::{KeyboardLeds, MouseButton, MouseKind};
use crate::clock::timed_out;
use crate::config::{USB_OFFLINE_DEBOUNCE_US, USB_POLL_INTERVAL_US};
use crate::keymap::{HID_MOD_FIRST, HID_MOD_LAST};

/// A single HID IN endpoint on the board's USB device stack.
pub trait UsbPort {
    /// Enumerated and able to accept a report right now.
    fn ready(&mut self) -> bool;

    /// The bus is suspended by the target host.
    fn suspended(&mut self) -> bool;

    /// Ask the suspended host to resume us.
    fn remote_wakeup(&mut self);

    /// Submit a report. Returns false when the endpoint did not take it.
    fn write_report(&mut self, report: &[u8]) -> bool;
}

/// A keyboard endpoint additionally receives LED output reports.
pub trait KeyboardPort: UsbPort {
    /// Most recent LED output report byte from the target host.
    fn leds(&mut self) -> u8;
}

/// Boot keyboard LED output report bits.
pub mod led {
    pub const NUM: u8 = 0b001;
    pub const CAPS: u8 = 0b010;
    pub const SCROLL: u8 = 0b100;
}

/// Offline debounce: a single missed readiness sample is not an outage,
/// but an endpoint that stays unready past the window is.
struct OnlineTracker {
    online: bool,
    prev_sample: bool,
    offline_since: Option<u64>,
}

impl OnlineTracker {
    const fn new() -> Self {
        Self {
            online: true,
            prev_sample: true,
            offline_since: None,
        }
    }

    /// Feed one readiness sample. Returns true on an offline-to-online
    /// transition, which callers use to resynchronize state.
    fn sample(&mut self, ready: bool, now_us: u64) -> bool {
        let mut resync = false;
        if ready {
            if !self.online {
                resync = true;
            }
            self.online = true;
            self.offline_since = None;
        } else if self.prev_sample {
            self.offline_since = Some(now_us);
        } else if let Some(since) = self.offline_since {
            if timed_out(since, USB_OFFLINE_DEBOUNCE_US, now_us) {
                self.online = false;
            }
        }
        self.prev_sample = ready;
        resync
    }
}

/// USB boot-protocol keyboard.
pub struct UsbKeyboard<P> {
    port: P,
    mods: u8,
    keys: [u8; 6],
    sent: bool,
    tracker: OnlineTracker,
    next_poll_at: u64,
}

impl<P: KeyboardPort> UsbKeyboard<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            mods: 0,
            keys: [0; 6],
            sent: true,
            tracker: OnlineTracker::new(),
            next_poll_at: 0,
        }
    }

    pub fn begin(&mut self) {}

    /// Sample endpoint readiness and push any pending report.
    pub fn periodic(&mut self, now_us: u64) {
        if now_us < self.next_poll_at {
            return;
        }
        self.next_poll_at = now_us + USB_POLL_INTERVAL_US;

        let ready = self.port.ready();
        if self.tracker.sample(ready, now_us) {
            // The host may have dropped our state across the outage.
            self.sent = false;
        }
        self.sync_report(false);
    }

    pub fn send_key(&mut self, code: u8, pressed: bool) {
        if (HID_MOD_FIRST..=HID_MOD_LAST).contains(&code) {
            let bit = 1 << (code & 0x07);
            if pressed {
                self.mods |= bit;
            } else {
                self.mods &= !bit;
            }
        } else if pressed {
            if !self.keys.contains(&code) {
                let slot = self.keys.iter().position(|&k| k == 0).unwrap_or(0);
                self.keys[slot] = code;
            }
        } else if let Some(slot) = self.keys.iter().position(|&k| k == code) {
            self.keys[slot] = 0;
        }
        self.sync_report(true);
    }

    pub fn clear(&mut self) {
        self.mods = 0;
        self.keys = [0; 6];
        self.sync_report(true);
    }

    pub fn leds(&mut self) -> KeyboardLeds {
        let bits = self.port.leds();
        KeyboardLeds {
            caps: bits & led::CAPS != 0,
            scroll: bits & led::SCROLL != 0,
            num: bits & led::NUM != 0,
        }
    }

    pub fn is_offline(&self) -> bool {
        !self.tracker.online
    }

    fn sync_report(&mut self, new: bool) {
        if new {
            self.sent = false;
        }
        if self.sent {
            return;
        }
        if self.port.suspended() {
            self.port.remote_wakeup();
            return;
        }
        let mut report = [0u8; 8];
        report[0] = self.mods;
        report[2..8].copy_from_slice(&self.keys);
        self.sent = self.port.write_report(&report);
    }
}

/// USB mouse: absolute (plain or Win98 quirk) or relative.
pub struct UsbMouse<P> {
    port: P,
    kind: MouseKind,
    buttons: u8,
    x: i16,
    y: i16,
    tracker: OnlineTracker,
    next_poll_at: u64,
}

impl<P: UsbPort> UsbMouse<P> {
    /// `kind` must be one of the USB mouse kinds.
    pub fn new(port: P, kind: MouseKind) -> Self {
        debug_assert!(matches!(
            kind,
            MouseKind::UsbAbsolute | MouseKind::UsbAbsoluteWin98 | MouseKind::UsbRelative
        ));
        Self {
            port,
            kind,
            buttons: 0,
            x: 0,
            y: 0,
            tracker: OnlineTracker::new(),
            next_poll_at: 0,
        }
    }

    pub fn kind(&self) -> MouseKind {
        self.kind
    }

    pub fn periodic(&mut self, now_us: u64) {
        if now_us < self.next_poll_at {
            return;
        }
        self.next_poll_at = now_us + USB_POLL_INTERVAL_US;
        let ready = self.port.ready();
        self.tracker.sample(ready, now_us);
    }

    pub fn send_buttons(&mut self, changes: &[(MouseButton, Option<bool>)]) {
        let mut affected = false;
        for &(button, state) in changes {
            if let Some(pressed) = state {
                affected = true;
                if pressed {
                    self.buttons |= button.mask();
                } else {
                    self.buttons &= !button.mask();
                }
            }
        }
        if affected {
            self.flush(0);
        }
    }

    pub fn send_move(&mut self, x: i16, y: i16) {
        if self.is_absolute() {
            self.x = x;
            self.y = y;
            self.report_abs(0);
        }
    }

    pub fn send_relative(&mut self, dx: i8, dy: i8) {
        if self.kind == MouseKind::UsbRelative {
            self.report_rel(dx, dy, 0);
        }
    }

    pub fn send_wheel(&mut self, dy: i8) {
        self.flush(dy);
    }

    pub fn clear(&mut self) {
        self.buttons = 0;
        self.x = 0;
        self.y = 0;
        self.flush(0);
    }

    pub fn is_offline(&self) -> bool {
        !self.tracker.online
    }

    fn is_absolute(&self) -> bool {
        matches!(
            self.kind,
            MouseKind::UsbAbsolute | MouseKind::UsbAbsoluteWin98
        )
    }

    fn flush(&mut self, wheel: i8) {
        if self.is_absolute() {
            self.report_abs(wheel);
        } else {
            self.report_rel(0, 0, wheel);
        }
    }

    /// Clears state and skips the report while the bus is suspended; a
    /// wakeup is requested instead.
    fn guard(&mut self) -> bool {
        if self.port.suspended() {
            self.port.remote_wakeup();
            self.buttons = 0;
            self.x = 0;
            self.y = 0;
            return false;
        }
        true
    }

    fn report_abs(&mut self, wheel: i8) {
        if !self.guard() {
            return;
        }
        // Map the signed 16-bit plane onto the unsigned 15-bit descriptor
        // range; the Win98 descriptor keeps the full 16 bits.
        let mut x = ((i32::from(self.x) + 32768) / 2) as u16;
        let mut y = ((i32::from(self.y) + 32768) / 2) as u16;
        if self.kind == MouseKind::UsbAbsoluteWin98 {
            x <<= 1;
            y <<= 1;
        }
        let report = [
            self.buttons,
            (x & 0xFF) as u8,
            (x >> 8) as u8,
            (y & 0xFF) as u8,
            (y >> 8) as u8,
            wheel as u8,
        ];
        let _ = self.port.write_report(&report);
    }

    fn report_rel(&mut self, dx: i8, dy: i8, wheel: i8) {
        if !self.guard() {
            return;
        }
        let report = [self.buttons, dx as u8, dy as u8, wheel as u8];
        let _ = self.port.write_report(&report);
    }
}
