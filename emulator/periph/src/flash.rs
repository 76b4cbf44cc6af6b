/*++

Licensed under the Apache-2.0 license.

File Name:

    flash.rs

Abstract:

    SPI NOR flash emulation. Erased flash reads 0xFF and writes can only
    clear bits.

--*/

use sboot_rom::{FlashDrvError, FlashStorage};
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::Path;

pub struct EmuFlash {
    data: RefCell<Vec<u8>>,
    writes: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl EmuFlash {
    /// Erase granularity.
    pub const SECTOR_SIZE: usize = 4096;

    /// Blank flash of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: RefCell::new(vec![0xff; size]),
            writes: Cell::new(0),
            fail_reads: Cell::new(false),
            fail_writes: Cell::new(false),
        }
    }

    /// Flash of `size` bytes starting with `initial_content`.
    pub fn with_content(size: usize, initial_content: &[u8]) -> Self {
        let flash = Self::new(size);
        let len = initial_content.len().min(size);
        flash.data.borrow_mut()[..len].copy_from_slice(&initial_content[..len]);
        flash
    }

    /// Programs `bytes` at `address` as a flashing tool would, erasing first.
    pub fn program(&self, address: usize, bytes: &[u8]) {
        self.data.borrow_mut()[address..address + bytes.len()].copy_from_slice(bytes);
    }

    pub fn contents(&self, address: usize, len: usize) -> Vec<u8> {
        self.data.borrow()[address..address + len].to_vec()
    }

    /// Flips bits in place, bypassing NOR semantics.
    pub fn corrupt(&self, address: usize, mask: u8) {
        self.data.borrow_mut()[address] ^= mask;
    }

    /// Successful writes and erases so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.data.borrow())?;
        file.sync_all()
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::with_content(data.len(), &data))
    }

    fn check_range(&self, address: usize, len: usize) -> Result<(), FlashDrvError> {
        match address.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(FlashDrvError::SIZE),
        }
    }
}

impl FlashStorage for EmuFlash {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        if self.fail_reads.get() {
            return Err(FlashDrvError::FAIL);
        }
        self.check_range(address, buffer.len())?;
        buffer.copy_from_slice(&self.data.borrow()[address..address + buffer.len()]);
        Ok(())
    }

    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        if self.fail_writes.get() {
            return Err(FlashDrvError::FAIL);
        }
        self.check_range(address, buffer.len())?;
        let mut data = self.data.borrow_mut();
        for (dst, src) in data[address..address + buffer.len()].iter_mut().zip(buffer) {
            *dst &= *src;
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        if address % Self::SECTOR_SIZE != 0 || length % Self::SECTOR_SIZE != 0 {
            return Err(FlashDrvError::INVAL);
        }
        if self.fail_writes.get() {
            return Err(FlashDrvError::FAIL);
        }
        self.check_range(address, length)?;
        self.data.borrow_mut()[address..address + length].fill(0xff);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.borrow().len()
    }
}
