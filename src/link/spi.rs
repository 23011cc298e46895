//! SPI-slave request framer.
//!
//! Two 8-byte buffers are shared between the main loop and the SPI
//! transfer interrupt. The first byte of the outbound buffer doubles as
//! the direction latch: while it is non-zero the ISR clocks the staged
//! response out, and once all 8 bytes have left it clears the latch and
//! re-arms ingest. While the latch is clear the ISR captures request
//! bytes, skipping the host's leading idle (zero) bytes, and clocks
//! zeros back.
//!
//! The response magic is never zero, so staging a response always arms
//! egress. All shared state lives behind a critical-section mutex; both
//! the ISR entry point and the main-side accessors take the lock, which
//! also gives the main loop its atomic 8-byte snapshot of the inbound
//! buffer.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::{Link, LinkEvent};
use crate::error::Error;
use crate::proto::FRAME_LEN;

struct SpiState {
    in_buf: [u8; FRAME_LEN],
    in_index: usize,
    out_buf: [u8; FRAME_LEN],
    out_index: usize,
    receiving: bool,
}

impl SpiState {
    const fn new() -> Self {
        Self {
            in_buf: [0; FRAME_LEN],
            in_index: 0,
            out_buf: [0; FRAME_LEN],
            out_index: 0,
            receiving: false,
        }
    }

    fn on_transfer(&mut self, rx: u8) -> u8 {
        if self.out_buf[0] != 0 && self.out_index < FRAME_LEN {
            let tx = self.out_buf[self.out_index];
            self.out_index += 1;
            if self.out_index == FRAME_LEN {
                self.out_index = 0;
                self.in_index = 0;
                self.out_buf[0] = 0;
            }
            tx
        } else {
            if !self.receiving && rx != 0 {
                self.receiving = true;
            }
            if self.receiving && self.in_index < FRAME_LEN {
                self.in_buf[self.in_index] = rx;
                self.in_index += 1;
            }
            if self.in_index == FRAME_LEN {
                self.receiving = false;
            }
            0
        }
    }

    fn ready(&self) -> bool {
        self.out_buf[0] == 0 && self.in_index == FRAME_LEN
    }
}

/// Shared SPI-slave frame buffers. Lives in a `static`; the board's SPI
/// interrupt handler calls [`SpiSlave::on_transfer`] for every byte
/// exchanged on the bus.
pub struct SpiSlave {
    state: Mutex<CriticalSectionRawMutex, RefCell<SpiState>>,
}

impl SpiSlave {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SpiState::new())),
        }
    }

    /// ISR entry point: feed the byte just received, get the byte to load
    /// for the next transfer.
    pub fn on_transfer(&self, rx: u8) -> u8 {
        self.state.lock(|state| state.borrow_mut().on_transfer(rx))
    }

    /// Main-context handle implementing [`Link`].
    pub fn link(&self) -> SpiLink<'_> {
        SpiLink { slave: self }
    }
}

impl Default for SpiSlave {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-context view of a [`SpiSlave`].
pub struct SpiLink<'a> {
    slave: &'a SpiSlave,
}

impl Link for SpiLink<'_> {
    fn poll(&mut self, _now_us: u64) -> LinkEvent {
        self.slave.state.lock(|state| {
            let state = state.borrow();
            if state.ready() {
                LinkEvent::Request(state.in_buf)
            } else {
                LinkEvent::Idle
            }
        })
    }

    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Error> {
        self.slave.state.lock(|state| {
            let mut state = state.borrow_mut();
            // Byte 0 last: it is the latch that lets the ISR start the
            // response, though under the lock the whole copy is atomic
            // anyway.
            for i in (0..FRAME_LEN).rev() {
                state.out_buf[i] = frame[i];
            }
            state.out_index = 0;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock 8 bytes through the ISR path, returning what the host reads.
    fn host_transfer(slave: &SpiSlave, request: &[u8; FRAME_LEN]) -> [u8; FRAME_LEN] {
        let mut response = [0u8; FRAME_LEN];
        for i in 0..FRAME_LEN {
            response[i] = slave.on_transfer(request[i]);
        }
        response
    }

    #[test]
    fn request_becomes_ready_after_eight_bytes() {
        let slave = SpiSlave::new();
        let mut link = slave.link();
        let request = [0x33, 0x01, 0, 0, 0, 0, 0xAA, 0xBB];

        host_transfer(&slave, &request);
        assert_eq!(link.poll(0), LinkEvent::Request(request));
    }

    #[test]
    fn leading_idle_bytes_are_skipped() {
        let slave = SpiSlave::new();
        let mut link = slave.link();

        // Host clocks some idle zeros before the frame.
        for _ in 0..5 {
            assert_eq!(slave.on_transfer(0), 0);
        }
        let request = [0x33, 0x02, 0, 0, 0, 0, 0x11, 0x22];
        host_transfer(&slave, &request);
        assert_eq!(link.poll(0), LinkEvent::Request(request));
    }

    #[test]
    fn staged_response_is_clocked_out_then_ingest_rearms() {
        let slave = SpiSlave::new();
        let mut link = slave.link();

        let request = [0x33, 0x01, 0, 0, 0, 0, 0xAA, 0xBB];
        host_transfer(&slave, &request);
        assert!(matches!(link.poll(0), LinkEvent::Request(_)));

        let response = [0x34, 0x80, 0, 0, 0, 0, 0xCC, 0xDD];
        link.send(&response).unwrap();
        // Not ready while the response is pending.
        assert_eq!(link.poll(0), LinkEvent::Idle);

        // Host clocks the response out (sending idle bytes).
        let echoed = host_transfer(&slave, &[0; FRAME_LEN]);
        assert_eq!(echoed, response);

        // A second request can now be ingested.
        let request2 = [0x33, 0x10, 0, 0, 0, 0, 0x01, 0x02];
        host_transfer(&slave, &request2);
        assert_eq!(link.poll(0), LinkEvent::Request(request2));
    }

    #[test]
    fn ingest_clocks_zeros_back() {
        let slave = SpiSlave::new();
        let request = [0x33, 0x01, 0, 0, 0, 0, 0xAA, 0xBB];
        assert_eq!(host_transfer(&slave, &request), [0; FRAME_LEN]);
    }

    #[test]
    fn extra_bytes_after_a_full_frame_are_dropped() {
        let slave = SpiSlave::new();
        let mut link = slave.link();
        let request = [0x33, 0x01, 0, 0, 0, 0, 0xAA, 0xBB];
        host_transfer(&slave, &request);
        // Host keeps clocking; the frame must not be overwritten.
        slave.on_transfer(0x55);
        slave.on_transfer(0x66);
        assert_eq!(link.poll(0), LinkEvent::Request(request));
    }
}
