//! Serial (UART) request framer.
//!
//! Accumulates request bytes one per poll into an 8-byte frame. A partial
//! frame with no traffic for [`SERIAL_TIMEOUT_US`](crate::config::SERIAL_TIMEOUT_US)
//! is discarded and reported so the dispatcher can answer with a timeout
//! error.
//!
//! The first byte is deliberately not required to be the request magic;
//! some deployed hosts resynchronize through the CRC check alone. Builds
//! with the `strict-magic` feature discard non-magic leading bytes
//! instead.

use super::{Link, LinkEvent};
use crate::clock::timed_out;
use crate::config::SERIAL_TIMEOUT_US;
use crate::error::Error;
use crate::proto::FRAME_LEN;

use embedded_io::{Read, ReadReady, Write};

/// 8-byte framer over a byte-oriented serial port.
pub struct SerialLink<P> {
    port: P,
    buf: [u8; FRAME_LEN],
    index: usize,
    last_rx_us: u64,
}

impl<P> SerialLink<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            buf: [0; FRAME_LEN],
            index: 0,
            last_rx_us: 0,
        }
    }
}

impl<P: Read + Write + ReadReady> Link for SerialLink<P> {
    fn poll(&mut self, now_us: u64) -> LinkEvent {
        if self.port.read_ready().unwrap_or(false) {
            let mut byte = [0u8; 1];
            if !matches!(self.port.read(&mut byte), Ok(1)) {
                return LinkEvent::Idle;
            }

            #[cfg(feature = "strict-magic")]
            if self.index == 0 && byte[0] != crate::proto::MAGIC {
                return LinkEvent::Idle;
            }

            self.buf[self.index] = byte[0];
            if self.index == FRAME_LEN - 1 {
                self.index = 0;
                return LinkEvent::Request(self.buf);
            }
            self.last_rx_us = now_us;
            self.index += 1;
        } else if self.index > 0 && timed_out(self.last_rx_us, SERIAL_TIMEOUT_US, now_us) {
            self.index = 0;
            return LinkEvent::Timeout;
        }
        LinkEvent::Idle
    }

    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Error> {
        self.port.write_all(frame).map_err(|_| Error::Link)?;
        self.port.flush().map_err(|_| Error::Link)
    }
}
