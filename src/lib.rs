//! wire2hid - firmware core of a remote keyboard/mouse bridge.
//!
//! A microcontroller running this crate receives framed HID commands from
//! a management host over a serial or SPI link and replays them to a
//! target computer as USB or PS/2 input events, reporting LED and
//! liveness state back over the same link.
//!
//! The crate is hardware-agnostic: boards provide GPIO, storage, serial
//! and USB endpoints through small trait seams (`embedded-hal` pins,
//! `embedded-io` serial, `embedded-storage` flash, and the USB port
//! traits in [`hid::usb`]), wire up interrupts to [`link::spi::SpiSlave`]
//! when the SPI transport is selected, and then run:
//!
//! ```ignore
//! let mut device = Device::new(peripherals, now_us());
//! loop {
//!     device.tick(now_us());
//! }
//! ```
//!
//! Everything is poll-driven and non-blocking; the only interrupt-shared
//! state is the SPI frame buffer pair, which lives behind a
//! critical-section mutex.
//!
//! All protocol logic is testable on the host: `cargo test` runs the
//! unit tests and the end-to-end wire scenarios in `tests/`.

#![cfg_attr(not(test), no_std)]

pub mod aum;
pub mod clock;
pub mod config;
pub mod crc;
pub mod device;
pub mod error;
mod fmt;
pub mod hid;
pub mod keymap;
pub mod link;
pub mod outputs;
pub mod proto;
pub mod ps2;
pub mod storage;

pub use device::{Device, Peripherals};
pub use error::Error;
