// Licensed under the Apache-2.0 license

//! Generic interface for flash storage access.

use core::result::Result;
use log::error;
use sboot_error::{SbootError, SbootResult};
use zerocopy::{FromBytes, IntoBytes};

/// Simple interface for reading, writing and erasing the arbitrary length of data on flash storage.
/// It is expected that drivers for the flash storage access would implement this trait.
///
/// Reads return the plaintext image; transparent flash decryption happens below this trait.
pub trait FlashStorage {
    /// Read from the flash storage, filling the provided buffer with data
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError>;

    /// Write to the flash storage with the full contents of the buffer, starting at the
    /// specified address
    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError>;

    /// Erase `length` bytes starting at address `address`. The address must be
    /// in the address space of the physical storage.
    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError>;

    /// Returns the size of the flash storage in bytes.
    fn capacity(&self) -> usize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum FlashDrvError {
    // Reserved value, for when "no error" / "success" should be
    // encoded in the same numeric representation as FlashDrvError
    //
    // Ok(()) = 0,
    /// Generic failure condition
    FAIL = 1,
    /// Underlying system is busy; retry
    BUSY = 2,
    /// The component is powered down
    OFF = 4,
    /// An invalid parameter was passed
    INVAL = 6,
    /// Parameter passed was too large
    SIZE = 7,
    /// Device is not available
    NODEVICE = 11,
}

impl From<FlashDrvError> for usize {
    fn from(err: FlashDrvError) -> usize {
        err as usize
    }
}

/// Reads `buffer.len()` bytes at `address`, reporting failures as `FLASH_READ_FAILED`.
pub fn read_flash(flash: &dyn FlashStorage, buffer: &mut [u8], address: u32) -> SbootResult<()> {
    let len = buffer.len();
    flash.read(buffer, address as usize).map_err(|err| {
        error!(
            "flash read of {} bytes at 0x{:x} failed: {:?}",
            len, address, err
        );
        SbootError::FLASH_READ_FAILED
    })
}

/// Reads a fixed-layout record at `address`.
pub fn read_record<T: FromBytes + IntoBytes>(
    flash: &dyn FlashStorage,
    address: u32,
) -> SbootResult<T> {
    let mut record = T::new_zeroed();
    read_flash(flash, record.as_mut_bytes(), address)?;
    Ok(record)
}

/// Writes `buffer` at `address` and reads it back.
pub fn write_flash_verified(
    flash: &dyn FlashStorage,
    buffer: &[u8],
    address: u32,
) -> SbootResult<()> {
    flash.write(buffer, address as usize).map_err(|err| {
        error!("flash write at 0x{:x} failed: {:?}", address, err);
        SbootError::FLASH_WRITE_FAILED
    })?;
    let mut check = [0u8; 64];
    for (i, expected) in buffer.chunks(check.len()).enumerate() {
        let offset = address + (i * check.len()) as u32;
        let check = &mut check[..expected.len()];
        read_flash(flash, check, offset)?;
        if check != expected {
            error!("flash contents at 0x{:x} differ after write", offset);
            return Err(SbootError::FLASH_VERIFY_FAILED);
        }
    }
    Ok(())
}
