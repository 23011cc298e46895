//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, queue depths, and protocol tunables live here so
//! they can be tuned in one place.

// Host link

/// Default UART speed (8N1) for boards using the serial transport.
pub const SERIAL_BAUD: u32 = 115_200;

/// Inter-byte timeout for the serial framer (µs). A partial frame older
/// than this is dropped and answered with a timeout error.
pub const SERIAL_TIMEOUT_US: u64 = 100_000;

// PS/2

/// Half of one PS/2 clock period (µs). 33 µs per half bit gives a bus
/// clock of roughly 15 kHz, in the middle of the 10-16.7 kHz band.
pub const PS2_HALF_BIT_US: u64 = 33;

/// A channel with no traffic for this long while the host keeps the clock
/// low (or disconnected) is reported offline (µs).
pub const PS2_OFFLINE_TIMEOUT_US: u64 = 500_000;

/// Delay between a keyboard reset command and the self-test pass byte (µs).
/// The LEDs stay lit for the duration.
pub const PS2_SELFTEST_DELAY_US: u64 = 500_000;

/// Device-to-host byte queue depth per PS/2 channel.
pub const PS2_TX_QUEUE: usize = 64;

/// Maximum number of simultaneously held regular keys tracked by the PS/2
/// keyboard engine (modifiers are tracked separately as a bitmask).
pub const PS2_PRESSED_KEYS: usize = 12;

/// Default typematic repeat interval after reset (µs). Repeat generation
/// itself is the host's job; the value is only retained for readback.
pub const PS2_DEFAULT_REPEAT_US: u32 = 91_743;

/// Default typematic delay after reset (ms).
pub const PS2_DEFAULT_DELAY_MS: u16 = 500;

// USB

/// How often the USB drivers sample endpoint readiness (µs).
pub const USB_POLL_INTERVAL_US: u64 = 1_000;

/// An endpoint must stay unready this long before the driver reports the
/// device offline; brief stalls during enumeration do not count (µs).
pub const USB_OFFLINE_DEBOUNCE_US: u64 = 50_000;
