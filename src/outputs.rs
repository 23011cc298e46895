//! Output selection: persisted record, compile-time defaults, and the
//! driver factory.
//!
//! The selection byte packs the keyboard kind into its low bits and the
//! mouse kind into bits 3-5 (see [`crate::proto::out1`]). On startup the
//! persisted record wins when valid; otherwise the compile-time defaults
//! are used and written back. Selections naming a backend that is not
//! compiled in (or whose peripheral was not provided) collapse to the
//! dummy driver.

use crate::fmt::info;
use crate::hid::usb::{KeyboardPort, UsbKeyboard, UsbMouse, UsbPort};
use crate::hid::{Keyboard, Mouse, MouseKind};
use crate::proto::{out1, out2};
use crate::ps2::{Ps2Bus, Ps2Keyboard, Ps2Mouse};
use crate::storage::{OutputsStore, Storage};

/// The resolved selection: active output bits plus the capability mask
/// reported in status byte 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub active: u8,
    pub avail: u8,
}

/// Capability bits for the compiled-in backends.
pub fn available() -> u8 {
    let mut avail = 0;
    if cfg!(feature = "usb") {
        avail |= out2::HAS_USB;
    }
    if cfg!(feature = "usb-win98") {
        avail |= out2::HAS_USB_WIN98;
    }
    if cfg!(feature = "ps2") {
        avail |= out2::HAS_PS2;
    }
    avail
}

/// Compile-time default selection: USB preferred, PS/2 as fallback.
pub fn defaults() -> u8 {
    let mut outputs = 0;
    if cfg!(feature = "usb") {
        outputs |= out1::kbd::USB | out1::mouse::USB_ABS;
    } else if cfg!(feature = "ps2") {
        outputs |= out1::kbd::PS2 | out1::mouse::PS2;
    }
    outputs
}

/// Resolve the active selection. Dynamic builds read the persisted
/// record and repair it with the defaults when it fails validation;
/// static builds always use the defaults.
pub fn load<S: Storage>(store: &mut OutputsStore<S>) -> Selection {
    let active = if cfg!(feature = "dynamic") {
        match store.read() {
            Some(outputs) => outputs,
            None => {
                let outputs = defaults();
                info!("outputs record invalid, writing defaults");
                let _ = store.write(0xFF, outputs, true);
                outputs
            }
        }
    } else {
        defaults()
    };
    Selection {
        active,
        avail: available(),
    }
}

/// Build the keyboard named by `active`, falling back to the dummy.
pub fn make_keyboard<P: KeyboardPort, B: Ps2Bus>(
    active: u8,
    usb: Option<P>,
    ps2: Option<B>,
) -> Keyboard<P, B> {
    match active & out1::kbd::MASK {
        out1::kbd::USB if cfg!(feature = "usb") => match usb {
            Some(port) => Keyboard::Usb(UsbKeyboard::new(port)),
            None => Keyboard::Dummy,
        },
        out1::kbd::PS2 if cfg!(feature = "ps2") => match ps2 {
            Some(bus) => Keyboard::Ps2(Ps2Keyboard::new(bus)),
            None => Keyboard::Dummy,
        },
        _ => Keyboard::Dummy,
    }
}

/// Build the mouse named by `active`, falling back to the dummy.
pub fn make_mouse<P: UsbPort, B: Ps2Bus>(
    active: u8,
    usb: Option<P>,
    ps2: Option<B>,
) -> Mouse<P, B> {
    let kind = match active & out1::mouse::MASK {
        out1::mouse::USB_ABS if cfg!(feature = "usb") => MouseKind::UsbAbsolute,
        out1::mouse::USB_WIN98 if cfg!(feature = "usb-win98") => MouseKind::UsbAbsoluteWin98,
        out1::mouse::USB_REL if cfg!(feature = "usb") => MouseKind::UsbRelative,
        out1::mouse::PS2 if cfg!(feature = "ps2") => MouseKind::Ps2,
        _ => MouseKind::Dummy,
    };
    match kind {
        MouseKind::Ps2 => match ps2 {
            Some(bus) => Mouse::Ps2(Ps2Mouse::new(bus)),
            None => Mouse::Dummy,
        },
        MouseKind::Dummy => Mouse::Dummy,
        usb_kind => match usb {
            Some(port) => Mouse::Usb(UsbMouse::new(port, usb_kind)),
            None => Mouse::Dummy,
        },
    }
}

/// The outputs bits a given keyboard kind reports back.
pub fn kbd_bits(kind: crate::hid::KbdKind) -> u8 {
    match kind {
        crate::hid::KbdKind::Dummy => 0,
        crate::hid::KbdKind::Usb => out1::kbd::USB,
        crate::hid::KbdKind::Ps2 => out1::kbd::PS2,
    }
}

/// The outputs bits a given mouse kind reports back.
pub fn mouse_bits(kind: MouseKind) -> u8 {
    match kind {
        MouseKind::Dummy => 0,
        MouseKind::UsbAbsolute => out1::mouse::USB_ABS,
        MouseKind::UsbAbsoluteWin98 => out1::mouse::USB_WIN98,
        MouseKind::UsbRelative => out1::mouse::USB_REL,
        MouseKind::Ps2 => out1::mouse::PS2,
    }
}
