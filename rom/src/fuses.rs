// Licensed under the Apache-2.0 license

//! Fuse state oracle.
//!
//! Fuses are the only source of truth for secure boot state. Nothing here is
//! cached: every query goes back to the fuse controller.

use sboot_config::SecureBootVersion;
use sboot_error::SbootResult;

/// Size of the eFuse key block holding the V1 key or the V2 key digest.
pub const KEY_BLOCK_LEN: usize = 32;

/// Single write-once fuse bits used by secure boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuseBit {
    /// Secure boot V1 enabled (`ABS_DONE_0`).
    AbsDone0,
    /// Secure boot V2 enabled (`ABS_DONE_1`).
    AbsDone1,
    /// Software reads of the key block disabled.
    KeyReadDisable,
    /// Further writes to the key block disabled.
    KeyWriteDisable,
    JtagDisable,
    /// ROM BASIC interpreter fallback disabled.
    ConsoleDebugDisable,
}

/// Encoding of the key block. Determines how many key bits are usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodingScheme {
    None,
    ThreeFour,
    Repeat,
}

impl CodingScheme {
    /// Number of key bytes the block can hold.
    pub const fn key_len(&self) -> usize {
        match self {
            CodingScheme::None => 32,
            CodingScheme::ThreeFour => 24,
            CodingScheme::Repeat => 16,
        }
    }
}

/// Raw access to the fuse controller.
///
/// Implementations must read the hardware on every call. Unburned bits and
/// key bytes read as zero.
pub trait RawFuses {
    /// Returns false for bits the target does not implement.
    fn read_bit(&self, bit: FuseBit) -> bool;

    /// Burns a single bit. Burning a bit that is already set succeeds.
    fn burn_bit(&mut self, bit: FuseBit) -> SbootResult<()>;

    fn coding_scheme(&self) -> CodingScheme;

    /// Reads the key block. Fails with `KEY_BLOCK_READ_PROTECTED` once reads are disabled.
    fn read_key_block(&self, key: &mut [u8; KEY_BLOCK_LEN]) -> SbootResult<()>;

    /// Burns `data` into the start of the key block.
    fn burn_key_block(&mut self, data: &[u8]) -> SbootResult<()>;
}

/// Secure boot fuse bits captured at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FuseSnapshot {
    pub scheme_v1_active: bool,
    pub scheme_v2_active: bool,
    pub key_write_protected: bool,
    pub key_read_protected: bool,
}

impl FuseSnapshot {
    pub fn read(fuses: &dyn RawFuses) -> Self {
        FuseSnapshot {
            scheme_v1_active: fuses.read_bit(FuseBit::AbsDone0),
            scheme_v2_active: fuses.read_bit(FuseBit::AbsDone1),
            key_write_protected: fuses.read_bit(FuseBit::KeyWriteDisable),
            key_read_protected: fuses.read_bit(FuseBit::KeyReadDisable),
        }
    }

    pub fn is_active(&self, scheme: SecureBootVersion) -> bool {
        match scheme {
            SecureBootVersion::V1 => self.scheme_v1_active,
            SecureBootVersion::V2 => self.scheme_v2_active,
        }
    }

    /// The enabled scheme, if exactly one is enabled.
    pub fn active_scheme(&self) -> Option<SecureBootVersion> {
        match (self.scheme_v1_active, self.scheme_v2_active) {
            (true, false) => Some(SecureBootVersion::V1),
            (false, true) => Some(SecureBootVersion::V2),
            _ => None,
        }
    }
}

pub const fn enable_bit(scheme: SecureBootVersion) -> FuseBit {
    match scheme {
        SecureBootVersion::V1 => FuseBit::AbsDone0,
        SecureBootVersion::V2 => FuseBit::AbsDone1,
    }
}

/// Reports whether `scheme` is permanently enabled on this device.
pub fn is_enabled(fuses: &dyn RawFuses, scheme: SecureBootVersion) -> bool {
    fuses.read_bit(enable_bit(scheme))
}

/// True if nothing has been burned into the key block yet.
pub fn key_block_is_blank(fuses: &dyn RawFuses) -> SbootResult<bool> {
    let mut key = [0u8; KEY_BLOCK_LEN];
    fuses.read_key_block(&mut key)?;
    Ok(key.iter().all(|&b| b == 0))
}
