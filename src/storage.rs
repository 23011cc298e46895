//! Persistent storage for the outputs selection record.
//!
//! The active keyboard/mouse selection survives power cycles as a single
//! 8-byte record at offset 0 of a device-specific non-volatile area:
//!
//! ```text
//! Byte 0    magic (0x33)
//! Byte 1    outputs selection bits (keyboard nibble | mouse nibble)
//! Byte 2-5  reserved, zero
//! Byte 6-7  CRC-16/ARC over bytes 0-5, big-endian
//! ```
//!
//! A record whose magic or CRC does not validate is treated as absent and
//! the firmware falls back to compile-time defaults, writing a fresh
//! record on the way.

use crate::crc::{crc16, merge8, split16};
use crate::error::Error;
use crate::fmt::warning;
use crate::proto;

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

/// Length of the persisted record.
pub const RECORD_LEN: usize = 8;

/// Byte-granular block storage, EEPROM-style: reads and updates at
/// arbitrary offsets, where an update overwrites in place and skips the
/// physical write when the stored bytes already match.
pub trait Storage {
    type Error;

    fn read_block(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn update_block(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error>;
}

/// The outputs record codec plus its storage slot.
pub struct OutputsStore<S> {
    storage: S,
}

impl<S: Storage> OutputsStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Read the persisted selection byte. `None` when the record is
    /// absent, unreadable, or fails validation.
    pub fn read(&mut self) -> Option<u8> {
        let mut data = [0u8; RECORD_LEN];
        if self.storage.read_block(0, &mut data).is_err() {
            warning!("outputs record unreadable");
            return None;
        }
        if data[0] != proto::MAGIC || crc16(&data[..6]) != merge8(data[6], data[7]) {
            return None;
        }
        Some(data[1])
    }

    /// Update the selection bits covered by `mask`, leaving the rest as
    /// stored. With `force` the read-modify-write is skipped and the
    /// record is rewritten from `bits` alone; this also repairs an
    /// invalid record.
    pub fn write(&mut self, mask: u8, bits: u8, force: bool) -> Result<(), Error> {
        let old = if force { 0 } else { self.read().unwrap_or(0) };

        let mut data = [0u8; RECORD_LEN];
        data[0] = proto::MAGIC;
        data[1] = (old & !mask) | (bits & mask);
        let (hi, lo) = split16(crc16(&data[..6]));
        data[6] = hi;
        data[7] = lo;

        self.storage
            .update_block(0, &data)
            .map_err(|_| Error::Storage)
    }
}

/// [`Storage`] adapter over a NOR flash peripheral.
///
/// NOR flash only erases in whole blocks, so the adapter dedicates the
/// first erase block to record storage: an update reads the affected
/// bytes, returns early if they already match, and otherwise erases the
/// block and reprograms it. Offsets must stay inside that first block.
pub struct NorStorage<F> {
    flash: F,
}

impl<F> NorStorage<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }
}

impl<F: ReadNorFlash + NorFlash> Storage for NorStorage<F> {
    type Error = Error;

    fn read_block(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.flash.read(offset, buf).map_err(|_| Error::Storage)
    }

    fn update_block(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error> {
        const MAX_WRITE: usize = 32;

        let mut current = [0u8; MAX_WRITE];
        if data.len() > MAX_WRITE || offset as usize + data.len() > F::ERASE_SIZE {
            return Err(Error::BufferOverflow);
        }
        self.flash
            .read(offset, &mut current[..data.len()])
            .map_err(|_| Error::Storage)?;
        if &current[..data.len()] == data {
            return Ok(());
        }

        self.flash
            .erase(0, F::ERASE_SIZE as u32)
            .map_err(|_| Error::Storage)?;

        // Pad the payload up to the programming granularity.
        let write_len = data.len().div_ceil(F::WRITE_SIZE) * F::WRITE_SIZE;
        let mut padded = [0xFFu8; MAX_WRITE];
        if write_len > MAX_WRITE || offset as usize % F::WRITE_SIZE != 0 {
            return Err(Error::BufferOverflow);
        }
        padded[..data.len()].copy_from_slice(data);
        self.flash
            .write(offset, &padded[..write_len])
            .map_err(|_| Error::Storage)
    }
}
