/*++

Licensed under the Apache-2.0 license.

File Name:

    efuse.rs

Abstract:

    eFuse controller emulation. Bits and key block are write-once; the state
    can be kept in a file so it survives emulated power cycles.

--*/

use sboot_error::{SbootError, SbootResult};
use sboot_rom::{CodingScheme, FuseBit, RawFuses, KEY_BLOCK_LEN};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Seek;
use std::path::PathBuf;

/// Used to hold the state that is saved between emulator runs.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct EfuseState {
    bits: u32,
    key_block: [u8; KEY_BLOCK_LEN],
}

#[derive(Clone, Debug, Default)]
pub struct EfuseArgs {
    pub file_name: Option<PathBuf>,
    /// Key block coding. Defaults to no coding.
    pub coding_scheme: Option<CodingScheme>,
    /// Bits that ignore burns and always read as zero.
    pub unimplemented: Vec<FuseBit>,
    /// Burns start failing after this many succeeded.
    pub fail_after: Option<usize>,
}

pub struct EmuEfuse {
    /// File to store the fuse state.
    file: Option<File>,
    state: EfuseState,
    coding_scheme: CodingScheme,
    unimplemented: Vec<FuseBit>,
    fail_after: Option<usize>,
    writes: usize,
    burn_log: Vec<FuseBit>,
}

// Ensure that we save the state before we drop the eFuse instance.
impl Drop for EmuEfuse {
    fn drop(&mut self) {
        if let Err(err) = self.save_to_file() {
            eprintln!("failed to save eFuse state: {err}");
        }
    }
}

impl EmuEfuse {
    pub fn new(args: EfuseArgs) -> Result<Self, std::io::Error> {
        let file = if let Some(path) = args.file_name {
            Some(
                std::fs::File::options()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)?,
            )
        } else {
            None
        };

        let mut efuse = Self {
            file,
            state: EfuseState::default(),
            coding_scheme: args.coding_scheme.unwrap_or(CodingScheme::None),
            unimplemented: args.unimplemented,
            fail_after: args.fail_after,
            writes: 0,
            burn_log: Vec::new(),
        };
        efuse.read_from_file()?;
        Ok(efuse)
    }

    /// Successful burns since this instance was created.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Bits burned since this instance was created, in order.
    pub fn burn_log(&self) -> &[FuseBit] {
        &self.burn_log
    }

    pub fn set_fail_after(&mut self, fail_after: Option<usize>) {
        self.fail_after = fail_after;
    }

    /// Sets a bit without counting a write, for preparing a device state.
    pub fn preset_bit(&mut self, bit: FuseBit) {
        self.state.bits |= Self::mask(bit);
    }

    /// The key block as the hardware digest engine sees it, ignoring read protection.
    pub fn key_block_raw(&self) -> [u8; KEY_BLOCK_LEN] {
        self.state.key_block
    }

    pub fn save_to_file(&mut self) -> Result<(), std::io::Error> {
        if let Some(file) = &mut self.file {
            file.set_len(0)?;
            file.rewind()?;
            serde_json::to_writer(&mut *file, &self.state)?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn read_from_file(&mut self) -> Result<(), std::io::Error> {
        if let Some(file) = &mut self.file {
            if file.metadata()?.len() > 0 {
                file.rewind()?;
                self.state = serde_json::from_reader(file)?;
            }
        }
        Ok(())
    }

    fn mask(bit: FuseBit) -> u32 {
        match bit {
            FuseBit::AbsDone0 => 1 << 0,
            FuseBit::AbsDone1 => 1 << 1,
            FuseBit::KeyReadDisable => 1 << 2,
            FuseBit::KeyWriteDisable => 1 << 3,
            FuseBit::JtagDisable => 1 << 4,
            FuseBit::ConsoleDebugDisable => 1 << 5,
        }
    }

    fn start_burn(&self) -> SbootResult<()> {
        match self.fail_after {
            Some(limit) if self.writes >= limit => Err(SbootError::FUSE_BURN_FAILED),
            _ => Ok(()),
        }
    }
}

impl RawFuses for EmuEfuse {
    fn read_bit(&self, bit: FuseBit) -> bool {
        !self.unimplemented.contains(&bit) && self.state.bits & Self::mask(bit) != 0
    }

    fn burn_bit(&mut self, bit: FuseBit) -> SbootResult<()> {
        self.start_burn()?;
        self.state.bits |= Self::mask(bit);
        self.writes += 1;
        self.burn_log.push(bit);
        self.save_to_file().map_err(|_| SbootError::FUSE_BURN_FAILED)
    }

    fn coding_scheme(&self) -> CodingScheme {
        self.coding_scheme
    }

    fn read_key_block(&self, key: &mut [u8; KEY_BLOCK_LEN]) -> SbootResult<()> {
        if self.read_bit(FuseBit::KeyReadDisable) {
            return Err(SbootError::KEY_BLOCK_READ_PROTECTED);
        }
        *key = self.state.key_block;
        Ok(())
    }

    fn burn_key_block(&mut self, data: &[u8]) -> SbootResult<()> {
        self.start_burn()?;
        if self.read_bit(FuseBit::KeyWriteDisable) || data.len() > self.coding_scheme.key_len() {
            return Err(SbootError::FUSE_BURN_FAILED);
        }
        for (dst, src) in self.state.key_block.iter_mut().zip(data) {
            *dst |= *src;
        }
        self.writes += 1;
        self.save_to_file().map_err(|_| SbootError::FUSE_BURN_FAILED)
    }
}
