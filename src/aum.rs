//! Auxiliary USB management ("AUM"): VBUS proxying and the host-driven
//! connected switch.
//!
//! Boards with the auxiliary circuit expose three GPIOs: a sense input
//! for the upstream VBUS level, an output that mirrors it toward the
//! target, and an output that physically connects or disconnects the USB
//! data lines. Boards without it use [`NoAum`], which reports the device
//! as not connectable.

use embedded_hal::digital::{InputPin, OutputPin};

/// Control surface for the auxiliary USB circuit.
pub trait UsbConnect {
    /// The board can switch the target-facing USB connection at all.
    fn connectable(&self) -> bool {
        false
    }

    /// Current state of the connected switch.
    fn connected(&self) -> bool {
        false
    }

    /// Drive the connected switch.
    fn set_connected(&mut self, _connected: bool) {}

    /// Mirror the upstream VBUS level; called every main-loop pass.
    fn pump(&mut self) {}
}

/// No auxiliary circuit fitted.
pub struct NoAum;

impl UsbConnect for NoAum {}

/// Auxiliary circuit over three GPIOs.
pub struct AumPins<S, V, C> {
    vbus_sense: S,
    vbus_drive: V,
    connect: C,
    vbus_state: bool,
    connected: bool,
}

impl<S: InputPin, V: OutputPin, C: OutputPin> AumPins<S, V, C> {
    /// The connected switch starts closed so the target sees the device
    /// right after power-up.
    pub fn new(vbus_sense: S, vbus_drive: V, mut connect: C) -> Self {
        let _ = connect.set_high();
        Self {
            vbus_sense,
            vbus_drive,
            connect,
            vbus_state: false,
            connected: true,
        }
    }
}

impl<S: InputPin, V: OutputPin, C: OutputPin> UsbConnect for AumPins<S, V, C> {
    fn connectable(&self) -> bool {
        true
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        let _ = if connected {
            self.connect.set_high()
        } else {
            self.connect.set_low()
        };
    }

    fn pump(&mut self) {
        let level = self.vbus_sense.is_high().unwrap_or(false);
        if level != self.vbus_state {
            self.vbus_state = level;
            let _ = if level {
                self.vbus_drive.set_high()
            } else {
                self.vbus_drive.set_low()
            };
        }
    }
}
