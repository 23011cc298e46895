//! Unified error type for wire2hid.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! Wire-level failures (bad CRC, unknown opcode, framing timeout) are not
//! errors in this sense; they are reported to the host as response codes.

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Non-volatile storage read/write/erase failed.
    Storage,

    /// The host-link transport failed to accept a response frame.
    Link,

    /// Buffer too small for the requested operation.
    BufferOverflow,
}
