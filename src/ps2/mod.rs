//! PS/2 device-side (slave) emulation.
//!
//! Each channel bit-bangs one PS/2 port over two open-drain GPIOs. The
//! [`phy::Ps2Phy`] layer handles framing, clocking, parity, inhibit and
//! the device-to-host queue; [`Ps2Keyboard`] and [`Ps2Mouse`] implement
//! the respective host command sets on top of it.

pub mod keyboard;
pub mod mouse;
pub mod phy;

pub use keyboard::Ps2Keyboard;
pub use mouse::Ps2Mouse;
pub use phy::Ps2Phy;

use embedded_hal::digital::{InputPin, OutputPin};

/// Open-drain view of a PS/2 port's clock and data lines.
///
/// `set_*(true)` releases the line (pull-up takes over), `set_*(false)`
/// drives it low. Reads return the resolved line level, which may differ
/// from what we drive when the host pulls the line down.
pub trait Ps2Bus {
    fn clock(&mut self) -> bool;

    fn data(&mut self) -> bool;

    fn set_clock(&mut self, high: bool);

    fn set_data(&mut self, high: bool);
}

/// [`Ps2Bus`] over a pair of open-drain HAL pins.
pub struct Ps2Pins<C, D> {
    clock: C,
    data: D,
}

impl<C, D> Ps2Pins<C, D> {
    pub fn new(clock: C, data: D) -> Self {
        Self { clock, data }
    }
}

impl<C, D> Ps2Bus for Ps2Pins<C, D>
where
    C: InputPin + OutputPin,
    D: InputPin + OutputPin,
{
    fn clock(&mut self) -> bool {
        self.clock.is_high().unwrap_or(true)
    }

    fn data(&mut self) -> bool {
        self.data.is_high().unwrap_or(true)
    }

    fn set_clock(&mut self, high: bool) {
        let _ = if high {
            self.clock.set_high()
        } else {
            self.clock.set_low()
        };
    }

    fn set_data(&mut self, high: bool) {
        let _ = if high {
            self.data.set_high()
        } else {
            self.data.set_low()
        };
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Ps2Bus;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Simulated open-drain bus: a line is high only while neither side
    /// pulls it low.
    pub struct Wire {
        pub dev_clock: bool,
        pub dev_data: bool,
        pub host_clock: bool,
        pub host_data: bool,
    }

    impl Wire {
        pub fn released() -> Rc<RefCell<Wire>> {
            Rc::new(RefCell::new(Wire {
                dev_clock: true,
                dev_data: true,
                host_clock: true,
                host_data: true,
            }))
        }

        pub fn clock_level(&self) -> bool {
            self.dev_clock && self.host_clock
        }

        pub fn data_level(&self) -> bool {
            self.dev_data && self.host_data
        }
    }

    pub struct SimBus(pub Rc<RefCell<Wire>>);

    impl Ps2Bus for SimBus {
        fn clock(&mut self) -> bool {
            self.0.borrow().clock_level()
        }

        fn data(&mut self) -> bool {
            self.0.borrow().data_level()
        }

        fn set_clock(&mut self, high: bool) {
            self.0.borrow_mut().dev_clock = high;
        }

        fn set_data(&mut self, high: bool) {
            self.0.borrow_mut().dev_data = high;
        }
    }

    /// A bus whose host permanently holds the clock low. The phy never
    /// starts transmitting, so tests can inspect exactly what an engine
    /// queued.
    pub struct InhibitedBus;

    impl Ps2Bus for InhibitedBus {
        fn clock(&mut self) -> bool {
            false
        }

        fn data(&mut self) -> bool {
            true
        }

        fn set_clock(&mut self, _high: bool) {}

        fn set_data(&mut self, _high: bool) {}
    }
}
