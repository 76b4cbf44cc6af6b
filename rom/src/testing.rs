// Licensed under the Apache-2.0 license

//! Write-counting doubles for unit tests.

use crate::crypto::{EntropySource, SignatureCrypto, ECDSA_PUBLIC_KEY_LEN, SHA256_DIGEST_LEN};
use crate::digest::DigestEngine;
use crate::flash::{FlashDrvError, FlashStorage};
use crate::fuses::{CodingScheme, FuseBit, RawFuses, KEY_BLOCK_LEN};
use core::cell::RefCell;
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{
    RsaPublicKeyBlock, BOOTLOADER_DIGEST_LEN, ECDSA_SIG_LEN, IV_LEN, RSA_KEY_LEN,
};

#[derive(Default)]
pub struct FakeFuses {
    pub bits: Vec<FuseBit>,
    pub key: [u8; KEY_BLOCK_LEN],
    pub coding: Option<CodingScheme>,
    pub unimplemented: Option<FuseBit>,
    /// Number of successful bit and key block burns.
    pub writes: usize,
    pub log: Vec<FuseBit>,
    pub key_burns: usize,
    /// Fail once this many burns have succeeded.
    pub fail_after: Option<usize>,
}

impl FakeFuses {
    /// Sets a bit without counting it as a write.
    pub fn set(&mut self, bit: FuseBit) {
        if !self.bits.contains(&bit) {
            self.bits.push(bit);
        }
    }

    fn check_fail(&self) -> SbootResult<()> {
        match self.fail_after {
            Some(n) if self.writes >= n => Err(SbootError::FUSE_BURN_FAILED),
            _ => Ok(()),
        }
    }
}

impl RawFuses for FakeFuses {
    fn read_bit(&self, bit: FuseBit) -> bool {
        self.unimplemented != Some(bit) && self.bits.contains(&bit)
    }

    fn burn_bit(&mut self, bit: FuseBit) -> SbootResult<()> {
        self.check_fail()?;
        self.set(bit);
        self.log.push(bit);
        self.writes += 1;
        Ok(())
    }

    fn coding_scheme(&self) -> CodingScheme {
        self.coding.unwrap_or(CodingScheme::None)
    }

    fn read_key_block(&self, key: &mut [u8; KEY_BLOCK_LEN]) -> SbootResult<()> {
        if self.read_bit(FuseBit::KeyReadDisable) {
            return Err(SbootError::KEY_BLOCK_READ_PROTECTED);
        }
        key.copy_from_slice(&self.key);
        Ok(())
    }

    fn burn_key_block(&mut self, data: &[u8]) -> SbootResult<()> {
        self.check_fail()?;
        if self.read_bit(FuseBit::KeyWriteDisable) {
            return Err(SbootError::FUSE_BURN_FAILED);
        }
        for (dst, src) in self.key.iter_mut().zip(data) {
            *dst |= *src;
        }
        self.writes += 1;
        self.key_burns += 1;
        Ok(())
    }
}

pub struct FakeFlash {
    pub data: RefCell<Vec<u8>>,
    pub writes: RefCell<usize>,
    pub fail_reads: bool,
}

impl FakeFlash {
    pub fn new(size: usize) -> Self {
        FakeFlash {
            data: RefCell::new(vec![0xff; size]),
            writes: RefCell::new(0),
            fail_reads: false,
        }
    }

    pub fn load(&self, address: usize, bytes: &[u8]) {
        self.data.borrow_mut()[address..address + bytes.len()].copy_from_slice(bytes);
    }
}

impl FlashStorage for FakeFlash {
    fn read(&self, buffer: &mut [u8], address: usize) -> Result<(), FlashDrvError> {
        if self.fail_reads {
            return Err(FlashDrvError::FAIL);
        }
        let data = self.data.borrow();
        let src = data
            .get(address..address + buffer.len())
            .ok_or(FlashDrvError::SIZE)?;
        buffer.copy_from_slice(src);
        Ok(())
    }

    fn write(&self, buffer: &[u8], address: usize) -> Result<(), FlashDrvError> {
        let mut data = self.data.borrow_mut();
        let dst = data
            .get_mut(address..address + buffer.len())
            .ok_or(FlashDrvError::SIZE)?;
        for (d, s) in dst.iter_mut().zip(buffer) {
            *d &= *s;
        }
        *self.writes.borrow_mut() += 1;
        Ok(())
    }

    fn erase(&self, address: usize, length: usize) -> Result<(), FlashDrvError> {
        let mut data = self.data.borrow_mut();
        data.get_mut(address..address + length)
            .ok_or(FlashDrvError::SIZE)?
            .fill(0xff);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.borrow().len()
    }
}

/// Digest engine that folds the key, IV and data into the output. Good enough
/// to tell inputs apart.
#[derive(Default)]
pub struct FakeDigestEngine {
    state: Vec<u8>,
    pub blocks: usize,
}

impl DigestEngine for FakeDigestEngine {
    fn start(&mut self, fuses: &dyn RawFuses, iv: &[u8; IV_LEN]) -> SbootResult<()> {
        let mut key = [0u8; KEY_BLOCK_LEN];
        fuses.read_key_block(&mut key)?;
        self.state = key.to_vec();
        self.state.extend_from_slice(iv);
        self.blocks = 0;
        Ok(())
    }

    fn update(&mut self, block: &[u8; 128]) -> SbootResult<()> {
        self.state.extend_from_slice(block);
        self.blocks += 1;
        Ok(())
    }

    fn finish(&mut self) -> SbootResult<[u8; BOOTLOADER_DIGEST_LEN]> {
        let mut out = [0u8; BOOTLOADER_DIGEST_LEN];
        for (i, b) in self.state.iter().enumerate() {
            out[i % BOOTLOADER_DIGEST_LEN] = out[i % BOOTLOADER_DIGEST_LEN]
                .rotate_left(3)
                .wrapping_add(*b);
        }
        Ok(out)
    }
}

/// Counts up from a seed.
pub struct CountingEntropy(pub u8);

impl EntropySource for CountingEntropy {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> SbootResult<()> {
        for b in dest.iter_mut() {
            self.0 = self.0.wrapping_add(1);
            *b = self.0;
        }
        Ok(())
    }
}

/// Accepts any signature that starts with [`MarkerCrypto::VALID`].
pub struct MarkerCrypto;

impl MarkerCrypto {
    pub const VALID: u8 = 0x5a;

    fn check(signature: &[u8], err: SbootError) -> SbootResult<()> {
        match signature.first() {
            Some(&Self::VALID) => Ok(()),
            _ => Err(err),
        }
    }
}

impl SignatureCrypto for MarkerCrypto {
    fn ecdsa_p256_verify(
        &self,
        _public_key: &[u8; ECDSA_PUBLIC_KEY_LEN],
        _digest: &[u8; SHA256_DIGEST_LEN],
        signature: &[u8; ECDSA_SIG_LEN],
    ) -> SbootResult<()> {
        Self::check(signature, SbootError::ECDSA_VERIFY_FAILED)
    }

    fn rsa_pss_sha256_verify(
        &self,
        _key: &RsaPublicKeyBlock,
        _digest: &[u8; SHA256_DIGEST_LEN],
        signature: &[u8; RSA_KEY_LEN],
    ) -> SbootResult<()> {
        Self::check(signature, SbootError::RSA_PSS_VERIFY_FAILED)
    }
}
