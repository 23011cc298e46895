//! PS/2 physical layer: a polled bit-bang slave.
//!
//! The device owns the clock. One frame is eleven bits on the wire:
//! start (0), eight data bits LSB first, odd parity, stop (1). Each
//! `poll` advances at most one clock edge, paced by microsecond
//! deadlines, so the main loop can run this as a tight task.
//!
//! Host-to-device bytes are detected from the request-to-send condition
//! (data held low while the clock is released) and acknowledged with an
//! extra data-low clock pulse. The host may inhibit the bus at any time
//! by holding the clock low; an in-flight transmission is aborted and the
//! byte requeued at the head of the queue.

use heapless::Deque;

use super::Ps2Bus;
use crate::clock::timed_out;
use crate::config::{PS2_HALF_BIT_US, PS2_OFFLINE_TIMEOUT_US, PS2_TX_QUEUE};

/// Resend request; handled here by replaying the last transmitted byte.
const RESEND: u8 = 0xFE;

#[derive(Clone, Copy)]
enum State {
    Idle,
    /// Transmitting: `step` 0 = start, 1..=8 = data, 9 = parity, 10 = stop.
    Tx { byte: u8, step: u8, clock_low: bool },
    /// Receiving: `step` 0..=7 = data, 8 = parity, 9 = stop. The start
    /// bit is the request-to-send condition itself.
    Rx { bits: u16, step: u8, clock_low: bool },
    /// Acknowledge pulse after a good frame from the host.
    Ack { byte: u8, clock_low: bool },
}

/// One PS/2 channel's physical layer.
pub struct Ps2Phy<B> {
    bus: B,
    queue: Deque<u8, PS2_TX_QUEUE>,
    state: State,
    edge_at: u64,
    last_tx: u8,
    last_activity_us: u64,
    had_activity: bool,
    inhibited_since: Option<u64>,
}

impl<B: Ps2Bus> Ps2Phy<B> {
    pub fn new(mut bus: B) -> Self {
        bus.set_clock(true);
        bus.set_data(true);
        Self {
            bus,
            queue: Deque::new(),
            state: State::Idle,
            edge_at: 0,
            last_tx: 0,
            last_activity_us: 0,
            had_activity: false,
            inhibited_since: None,
        }
    }

    /// Queue a byte for the host. Silently dropped when the queue is
    /// full, which only happens if the host stopped clocking long ago.
    pub fn send(&mut self, byte: u8) {
        let _ = self.queue.push_back(byte);
    }

    /// Bytes queued but not yet clocked out.
    pub fn pending(&self) -> impl Iterator<Item = u8> + '_ {
        self.queue.iter().copied()
    }

    /// Number of bytes waiting in the device-to-host queue.
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Channel liveness: some exchange has happened, and the bus has not
    /// been dead (idle and inhibited) past the offline window.
    pub fn online(&self, now_us: u64) -> bool {
        if !self.had_activity {
            return false;
        }
        let idle = timed_out(self.last_activity_us, PS2_OFFLINE_TIMEOUT_US, now_us);
        let held = self
            .inhibited_since
            .is_some_and(|since| timed_out(since, PS2_OFFLINE_TIMEOUT_US, now_us));
        !(idle && held)
    }

    /// Advance the FSM by at most one clock edge. Returns a byte received
    /// from the host, already ACKed and parity-checked.
    pub fn poll(&mut self, now_us: u64) -> Option<u8> {
        match self.state {
            State::Idle => {
                self.poll_idle(now_us);
                None
            }
            State::Tx {
                byte,
                step,
                clock_low,
            } => {
                if now_us >= self.edge_at {
                    self.poll_tx(now_us, byte, step, clock_low);
                }
                None
            }
            State::Rx {
                bits,
                step,
                clock_low,
            } => {
                if now_us >= self.edge_at {
                    self.poll_rx(now_us, bits, step, clock_low);
                }
                None
            }
            State::Ack { byte, clock_low } => {
                if now_us >= self.edge_at {
                    return self.poll_ack(now_us, byte, clock_low);
                }
                None
            }
        }
    }

    fn poll_idle(&mut self, now_us: u64) {
        if !self.bus.clock() {
            // The host is holding the clock: inhibited.
            if self.inhibited_since.is_none() {
                self.inhibited_since = Some(now_us);
            }
            return;
        }
        self.inhibited_since = None;

        if !self.bus.data() {
            // Request-to-send: the start bit is already on the wire.
            self.state = State::Rx {
                bits: 0,
                step: 0,
                clock_low: false,
            };
            self.edge_at = now_us + PS2_HALF_BIT_US;
        } else if !self.queue.is_empty() && now_us >= self.edge_at {
            let byte = self.queue.pop_front().unwrap_or(0);
            self.state = State::Tx {
                byte,
                step: 0,
                clock_low: false,
            };
        }
    }

    fn poll_tx(&mut self, now_us: u64, byte: u8, step: u8, clock_low: bool) {
        if !clock_low {
            if !self.bus.clock() {
                // Host inhibit mid-frame: abort and retransmit later.
                self.bus.set_data(true);
                let _ = self.queue.push_front(byte);
                self.inhibited_since = Some(now_us);
                self.state = State::Idle;
                self.edge_at = now_us + PS2_HALF_BIT_US;
                return;
            }
            self.bus.set_data(tx_bit(byte, step));
            self.bus.set_clock(false);
            self.state = State::Tx {
                byte,
                step,
                clock_low: true,
            };
        } else {
            self.bus.set_clock(true);
            if step == 10 {
                self.bus.set_data(true);
                self.last_tx = byte;
                self.mark_activity(now_us);
                self.state = State::Idle;
            } else {
                self.state = State::Tx {
                    byte,
                    step: step + 1,
                    clock_low: false,
                };
            }
        }
        self.edge_at = now_us + PS2_HALF_BIT_US;
    }

    fn poll_rx(&mut self, now_us: u64, bits: u16, step: u8, clock_low: bool) {
        if !clock_low {
            self.bus.set_clock(false);
            self.state = State::Rx {
                bits,
                step,
                clock_low: true,
            };
        } else {
            // The host updates the data line while our clock is low; the
            // bit is stable by the release edge.
            self.bus.set_clock(true);
            let bits = bits | (u16::from(self.bus.data()) << step);
            if step == 9 {
                let byte = (bits & 0xFF) as u8;
                let parity = bits & (1 << 8) != 0;
                let stop = bits & (1 << 9) != 0;
                if stop && parity == odd_parity(byte) {
                    self.state = State::Ack {
                        byte,
                        clock_low: false,
                    };
                } else {
                    // Framing failure: drop the byte.
                    self.state = State::Idle;
                }
            } else {
                self.state = State::Rx {
                    bits,
                    step: step + 1,
                    clock_low: false,
                };
            }
        }
        self.edge_at = now_us + PS2_HALF_BIT_US;
    }

    fn poll_ack(&mut self, now_us: u64, byte: u8, clock_low: bool) -> Option<u8> {
        if !clock_low {
            self.bus.set_data(false);
            self.bus.set_clock(false);
            self.state = State::Ack {
                byte,
                clock_low: true,
            };
            self.edge_at = now_us + PS2_HALF_BIT_US;
            return None;
        }
        self.bus.set_clock(true);
        self.bus.set_data(true);
        self.mark_activity(now_us);
        self.state = State::Idle;
        self.edge_at = now_us + PS2_HALF_BIT_US;

        // A host command obsoletes anything we still had queued.
        while self.queue.pop_front().is_some() {}
        if byte == RESEND {
            let last = self.last_tx;
            self.send(last);
            return None;
        }
        Some(byte)
    }

    fn mark_activity(&mut self, now_us: u64) {
        self.had_activity = true;
        self.last_activity_us = now_us;
    }
}

fn tx_bit(byte: u8, step: u8) -> bool {
    match step {
        0 => false,                          // start
        1..=8 => byte & (1 << (step - 1)) != 0, // data, LSB first
        9 => odd_parity(byte),               // parity
        _ => true,                           // stop
    }
}

/// The parity bit that makes the data-plus-parity one-count odd.
fn odd_parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ps2::testutil::{SimBus, Wire};
    use std::cell::RefCell;
    use std::rc::Rc;

    const STEP_US: u64 = 5;

    fn frame_bits(byte: u8) -> Vec<bool> {
        let mut bits = vec![false];
        for i in 0..8 {
            bits.push(byte & (1 << i) != 0);
        }
        bits.push(odd_parity(byte));
        bits.push(true);
        bits
    }

    /// Run the phy while recording the data line at every falling clock
    /// edge the device generates.
    fn run_and_sample(
        phy: &mut Ps2Phy<SimBus>,
        wire: &Rc<RefCell<Wire>>,
        from_us: u64,
        duration_us: u64,
    ) -> Vec<bool> {
        let mut samples = Vec::new();
        let mut prev_clock = wire.borrow().clock_level();
        let mut t = from_us;
        while t < from_us + duration_us {
            phy.poll(t);
            let (clock, data) = {
                let w = wire.borrow();
                (w.clock_level(), w.data_level())
            };
            if prev_clock && !clock {
                samples.push(data);
            }
            prev_clock = clock;
            t += STEP_US;
        }
        samples
    }

    #[test]
    fn transmit_frame_layout() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        phy.send(0x5A);
        let bits = run_and_sample(&mut phy, &wire, 0, 2_000);
        assert_eq!(bits, frame_bits(0x5A));
        assert_eq!(phy.pending_len(), 0);
    }

    #[test]
    fn transmit_parity_of_odd_weight_byte() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        // 0x01 has odd weight; the parity bit must be 0.
        phy.send(0x01);
        let bits = run_and_sample(&mut phy, &wire, 0, 2_000);
        assert_eq!(bits, frame_bits(0x01));
        assert!(!bits[9]);
    }

    #[test]
    fn queued_bytes_go_out_in_order() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        phy.send(0xFA);
        phy.send(0xAB);
        let bits = run_and_sample(&mut phy, &wire, 0, 4_000);
        let mut expected = frame_bits(0xFA);
        expected.extend(frame_bits(0xAB));
        assert_eq!(bits, expected);
    }

    #[test]
    fn inhibit_aborts_and_requeues() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        phy.send(0x77);
        // Let a few edges happen, then have the host clamp the clock.
        run_and_sample(&mut phy, &wire, 0, 150);
        wire.borrow_mut().host_clock = false;
        for t in 0..60 {
            phy.poll(150 + t * STEP_US);
        }
        assert_eq!(phy.pending().collect::<Vec<_>>(), vec![0x77]);

        // After release the byte goes out whole.
        wire.borrow_mut().host_clock = true;
        let bits = run_and_sample(&mut phy, &wire, 1_000, 2_000);
        assert_eq!(bits, frame_bits(0x77));
    }

    /// Scripted host sending one byte to the device.
    struct SimHost {
        bits: Vec<bool>,
        index: usize,
        prev_clock: bool,
        ack_seen: bool,
    }

    impl SimHost {
        fn new(byte: u8) -> Self {
            let mut bits = Vec::new();
            for i in 0..8 {
                bits.push(byte & (1 << i) != 0);
            }
            bits.push(odd_parity(byte));
            bits.push(true); // stop
            Self {
                bits,
                index: 0,
                prev_clock: true,
                ack_seen: false,
            }
        }

        /// Present the next bit on each device-driven falling edge.
        fn step(&mut self, wire: &Rc<RefCell<Wire>>) {
            let clock = wire.borrow().clock_level();
            if self.prev_clock && !clock {
                let mut w = wire.borrow_mut();
                if self.index < self.bits.len() {
                    w.host_data = self.bits[self.index];
                    self.index += 1;
                } else {
                    w.host_data = true;
                    if !w.data_level() {
                        self.ack_seen = true;
                    }
                }
            }
            self.prev_clock = clock;
        }
    }

    fn host_sends(phy: &mut Ps2Phy<SimBus>, wire: &Rc<RefCell<Wire>>, byte: u8) -> Option<u8> {
        // Inhibit, then request-to-send.
        wire.borrow_mut().host_clock = false;
        let mut t = 0;
        while t < 150 {
            phy.poll(t);
            t += STEP_US;
        }
        {
            let mut w = wire.borrow_mut();
            w.host_data = false;
            w.host_clock = true;
        }

        let mut host = SimHost::new(byte);
        let mut received = None;
        while t < 5_000 {
            if let Some(b) = phy.poll(t) {
                received = Some(b);
            }
            host.step(wire);
            t += STEP_US;
        }
        assert!(host.ack_seen, "device never acknowledged the byte");
        received
    }

    #[test]
    fn receive_byte_with_ack() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));
        assert_eq!(host_sends(&mut phy, &wire, 0xED), Some(0xED));
    }

    #[test]
    fn receive_discards_on_bad_parity() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        // Build a host that lies about parity.
        wire.borrow_mut().host_clock = false;
        let mut t = 0;
        while t < 150 {
            phy.poll(t);
            t += STEP_US;
        }
        {
            let mut w = wire.borrow_mut();
            w.host_data = false;
            w.host_clock = true;
        }
        let mut host = SimHost::new(0xED);
        host.bits[8] = !host.bits[8]; // corrupt the parity bit
        let mut received = None;
        while t < 5_000 {
            if let Some(b) = phy.poll(t) {
                received = Some(b);
            }
            host.step(&wire);
            t += STEP_US;
        }
        assert_eq!(received, None);
        assert!(!host.ack_seen);
    }

    #[test]
    fn resend_replays_last_byte() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        phy.send(0xAA);
        run_and_sample(&mut phy, &wire, 0, 2_000);

        // Host answers with a resend request; the device must queue 0xAA
        // again without surfacing 0xFE.
        wire.borrow_mut().host_clock = false;
        let mut t = 2_000;
        while t < 2_150 {
            phy.poll(t);
            t += STEP_US;
        }
        {
            let mut w = wire.borrow_mut();
            w.host_data = false;
            w.host_clock = true;
        }
        let mut host = SimHost::new(RESEND);
        let mut received = None;
        let mut requeued = false;
        while t < 7_000 {
            if let Some(byte) = phy.poll(t) {
                received = Some(byte);
            }
            host.step(&wire);
            if phy.pending_len() == 1 {
                requeued = true;
                break;
            }
            t += STEP_US;
        }
        assert_eq!(received, None);
        assert!(requeued, "last byte was not requeued");
        assert_eq!(phy.pending().collect::<Vec<_>>(), vec![0xAA]);
    }

    #[test]
    fn online_follows_activity_and_inhibit() {
        let wire = Wire::released();
        let mut phy = Ps2Phy::new(SimBus(wire.clone()));

        // Nothing exchanged yet.
        assert!(!phy.online(0));

        phy.send(0xAA);
        run_and_sample(&mut phy, &wire, 0, 2_000);
        assert!(phy.online(2_000));

        // Host clamps the clock and goes silent.
        wire.borrow_mut().host_clock = false;
        let mut t = 2_000;
        while t < 2_000 + PS2_OFFLINE_TIMEOUT_US + 10_000 {
            phy.poll(t);
            t += 500;
        }
        assert!(!phy.online(t));

        // Releasing the clock brings the channel back.
        wire.borrow_mut().host_clock = true;
        phy.poll(t);
        assert!(phy.online(t));
    }
}
