//! HID output drivers.
//!
//! Exactly one [`Keyboard`] and one [`Mouse`] are alive at any time, owned
//! by the device main loop. Each is a tagged variant over the compiled-in
//! backends; the `Dummy` variant accepts every call as a no-op and stands
//! in whenever the selected backend is unavailable.

pub mod usb;

use self::usb::{KeyboardPort, UsbKeyboard, UsbMouse, UsbPort};
use crate::proto::pong;
use crate::ps2::{Ps2Bus, Ps2Keyboard, Ps2Mouse};

/// Active keyboard backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KbdKind {
    Dummy,
    Usb,
    Ps2,
}

/// Active mouse backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MouseKind {
    Dummy,
    UsbAbsolute,
    /// Same report format as [`MouseKind::UsbAbsolute`] with the
    /// descriptor quirk (and doubled coordinate range) that Windows 98
    /// needs to enumerate the device.
    UsbAbsoluteWin98,
    UsbRelative,
    Ps2,
}

/// Keyboard lock LEDs as last dictated by the target host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardLeds {
    pub caps: bool,
    pub scroll: bool,
    pub num: bool,
}

impl KeyboardLeds {
    pub(crate) fn pong_bits(&self) -> u8 {
        (if self.caps { pong::CAPS } else { 0 })
            | (if self.scroll { pong::SCROLL } else { 0 })
            | (if self.num { pong::NUM } else { 0 })
    }
}

/// Mouse buttons addressable over the host link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Extra button 4 ("up"/previous).
    Backward,
    /// Extra button 5 ("down"/next).
    Forward,
}

impl MouseButton {
    /// Bit in both the USB report button byte and the PS/2 packet.
    pub fn mask(self) -> u8 {
        match self {
            MouseButton::Left => 0x01,
            MouseButton::Right => 0x02,
            MouseButton::Middle => 0x04,
            MouseButton::Backward => 0x08,
            MouseButton::Forward => 0x10,
        }
    }
}

/// The active keyboard output.
pub enum Keyboard<P, B> {
    Dummy,
    Usb(UsbKeyboard<P>),
    Ps2(Ps2Keyboard<B>),
}

impl<P: KeyboardPort, B: Ps2Bus> Keyboard<P, B> {
    /// Bring up the underlying transport.
    pub fn begin(&mut self, now_us: u64) {
        match self {
            Keyboard::Dummy => {}
            Keyboard::Usb(kbd) => kbd.begin(),
            Keyboard::Ps2(kbd) => kbd.begin(now_us),
        }
    }

    /// Release all keys.
    pub fn clear(&mut self) {
        match self {
            Keyboard::Dummy => {}
            Keyboard::Usb(kbd) => kbd.clear(),
            Keyboard::Ps2(kbd) => kbd.clear(),
        }
    }

    /// Post a key event. `code` is a HID usage already validated by the
    /// dispatcher.
    pub fn send_key(&mut self, code: u8, pressed: bool) {
        match self {
            Keyboard::Dummy => {}
            Keyboard::Usb(kbd) => kbd.send_key(code, pressed),
            Keyboard::Ps2(kbd) => kbd.send_key(code, pressed),
        }
    }

    /// Main-loop pump for the USB backend. Must not block.
    pub fn periodic(&mut self, now_us: u64) {
        if let Keyboard::Usb(kbd) = self {
            kbd.periodic(now_us);
        }
    }

    /// Main-loop pump for the PS/2 backend (bit-bang task).
    pub fn ps2_task(&mut self, now_us: u64) {
        if let Keyboard::Ps2(kbd) = self {
            kbd.task(now_us);
        }
    }

    pub fn is_offline(&self) -> bool {
        match self {
            Keyboard::Dummy => false,
            Keyboard::Usb(kbd) => kbd.is_offline(),
            Keyboard::Ps2(kbd) => kbd.is_offline(),
        }
    }

    pub fn leds(&mut self) -> KeyboardLeds {
        match self {
            Keyboard::Dummy => KeyboardLeds::default(),
            Keyboard::Usb(kbd) => kbd.leds(),
            Keyboard::Ps2(kbd) => kbd.leds(),
        }
    }

    pub fn kind(&self) -> KbdKind {
        match self {
            Keyboard::Dummy => KbdKind::Dummy,
            Keyboard::Usb(_) => KbdKind::Usb,
            Keyboard::Ps2(_) => KbdKind::Ps2,
        }
    }
}

/// The active mouse output.
pub enum Mouse<P, B> {
    Dummy,
    Usb(UsbMouse<P>),
    Ps2(Ps2Mouse<B>),
}

impl<P: UsbPort, B: Ps2Bus> Mouse<P, B> {
    pub fn begin(&mut self) {
        // All backends come up lazily; USB enumeration belongs to the
        // port, PS/2 waits for the target's reset command.
    }

    /// Release all buttons and re-center state.
    pub fn clear(&mut self) {
        match self {
            Mouse::Dummy => {}
            Mouse::Usb(mouse) => mouse.clear(),
            Mouse::Ps2(mouse) => mouse.clear(),
        }
    }

    /// Apply button changes. `Some(state)` means the button is affected;
    /// `None` leaves it as is.
    pub fn send_buttons(
        &mut self,
        left: Option<bool>,
        right: Option<bool>,
        middle: Option<bool>,
        up: Option<bool>,
        down: Option<bool>,
    ) {
        let changes = [
            (MouseButton::Left, left),
            (MouseButton::Right, right),
            (MouseButton::Middle, middle),
            (MouseButton::Backward, up),
            (MouseButton::Forward, down),
        ];
        match self {
            Mouse::Dummy => {}
            Mouse::Usb(mouse) => mouse.send_buttons(&changes),
            Mouse::Ps2(mouse) => {
                for (button, state) in changes {
                    if let Some(state) = state {
                        mouse.send_button(button, state);
                    }
                }
            }
        }
    }

    /// Absolute move; meaningful for absolute mice only.
    pub fn send_move(&mut self, x: i16, y: i16) {
        if let Mouse::Usb(mouse) = self {
            mouse.send_move(x, y);
        }
    }

    /// Relative move; meaningful for relative mice only.
    pub fn send_relative(&mut self, dx: i8, dy: i8) {
        match self {
            Mouse::Dummy => {}
            Mouse::Usb(mouse) => mouse.send_relative(dx, dy),
            Mouse::Ps2(mouse) => mouse.send_rel(dx, dy),
        }
    }

    /// Vertical wheel. Horizontal scrolling is not forwarded at all for
    /// BIOS/UEFI compatibility.
    pub fn send_wheel(&mut self, dy: i8) {
        match self {
            Mouse::Dummy => {}
            Mouse::Usb(mouse) => mouse.send_wheel(dy),
            Mouse::Ps2(mouse) => mouse.send_wheel(dy),
        }
    }

    pub fn periodic(&mut self, now_us: u64) {
        if let Mouse::Usb(mouse) = self {
            mouse.periodic(now_us);
        }
    }

    pub fn ps2_task(&mut self, now_us: u64) {
        if let Mouse::Ps2(mouse) = self {
            mouse.task(now_us);
        }
    }

    pub fn is_offline(&self) -> bool {
        match self {
            Mouse::Dummy => false,
            Mouse::Usb(mouse) => mouse.is_offline(),
            Mouse::Ps2(mouse) => mouse.is_offline(),
        }
    }

    pub fn kind(&self) -> MouseKind {
        match self {
            Mouse::Dummy => MouseKind::Dummy,
            Mouse::Usb(mouse) => mouse.kind(),
            Mouse::Ps2(_) => MouseKind::Ps2,
        }
    }
}
