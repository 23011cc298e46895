//! Host-link transports.
//!
//! Exactly one transport connects the device to its host: a UART
//! ([`serial::SerialLink`]) or an SPI slave ([`spi::SpiSlave`]). Both
//! deliver complete 8-byte request frames and accept 8-byte responses.

pub mod serial;
pub mod spi;

use crate::error::Error;
use crate::proto::FRAME_LEN;

/// Outcome of polling a transport once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Nothing new.
    Idle,
    /// A complete request frame arrived.
    Request([u8; FRAME_LEN]),
    /// A partial frame aged out and was dropped (serial only).
    Timeout,
}

/// A polled 8-byte-frame transport.
pub trait Link {
    fn poll(&mut self, now_us: u64) -> LinkEvent;

    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Error>;
}
