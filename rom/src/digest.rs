// Licensed under the Apache-2.0 license

//! Secure boot V1 bootloader digest.
//!
//! On the first boot the bootloader provisions the symmetric secure boot key
//! and stores `IV || digest` at the start of flash, where the ROM checks it on
//! every later boot. The key is still readable at this point; the enablement
//! sequencer protects it afterwards.

use crate::crypto::EntropySource;
use crate::env::SecureBootEnv;
use crate::flash::{read_flash, read_record, write_flash_verified};
use crate::fuses::{
    is_enabled, key_block_is_blank, CodingScheme, FuseSnapshot, RawFuses, KEY_BLOCK_LEN,
};
use crate::image_verifier::ImageRegion;
use log::{error, info, warn};
use sboot_config::SecureBootVersion;
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{IvDigest, BOOTLOADER_DIGEST_LEN, IV_LEN};
use sboot_romtime::HexBytes;
use zerocopy::{FromZeros, IntoBytes};
use zeroize::Zeroize;

/// Bytes consumed by each [`DigestEngine::update`] call.
pub const DIGEST_BLOCK_LEN: usize = 128;

/// The keyed digest engine the ROM uses to check the bootloader.
///
/// The engine takes its key from the key block, so the bootloader never
/// handles the key once it has been burned.
pub trait DigestEngine {
    fn start(&mut self, fuses: &dyn RawFuses, iv: &[u8; IV_LEN]) -> SbootResult<()>;
    fn update(&mut self, block: &[u8; DIGEST_BLOCK_LEN]) -> SbootResult<()>;
    fn finish(&mut self) -> SbootResult<[u8; BOOTLOADER_DIGEST_LEN]>;
}

pub struct DigestGenerator<'a> {
    engine: &'a mut dyn DigestEngine,
    entropy: &'a mut dyn EntropySource,
}

impl<'a> DigestGenerator<'a> {
    pub fn new(engine: &'a mut dyn DigestEngine, entropy: &'a mut dyn EntropySource) -> Self {
        Self { engine, entropy }
    }

    /// Provisions the secure boot key if needed and writes the bootloader
    /// digest record. Does nothing once a record is present.
    pub fn generate_digest(
        &mut self,
        env: &mut SecureBootEnv,
        bootloader: &ImageRegion,
    ) -> SbootResult<()> {
        env.require_bootloader()?;

        if is_enabled(&*env.fuses, SecureBootVersion::V1) {
            info!("secure boot V1 already enabled, bootloader digest not regenerated");
            return Ok(());
        }

        let record_offset = env.config.layout.iv_digest_offset;
        let existing: IvDigest = read_record(env.flash, record_offset)?;
        if !existing.is_erased() {
            info!("bootloader digest already present at 0x{:x}", record_offset);
            return Ok(());
        }

        let coding = env.fuses.coding_scheme();
        if coding == CodingScheme::Repeat {
            error!("key block coding scheme {:?} not supported", coding);
            return Err(SbootError::FUSE_CODING_SCHEME_UNSUPPORTED);
        }

        let digest_len = bootloader.digest_len()?;
        let end = bootloader.start_addr.checked_add(digest_len);
        if !end.is_some_and(|end| end as usize <= env.flash.capacity()) {
            error!(
                "bootloader 0x{:x}+0x{:x} does not fit in flash",
                bootloader.start_addr, digest_len
            );
            return Err(SbootError::BOOTLOADER_IMAGE_INVALID);
        }
        self.provision_key(&mut *env.fuses, coding)?;

        let mut record = IvDigest::new_zeroed();
        self.entropy.fill_bytes(&mut record.iv)?;
        self.engine.start(&*env.fuses, &record.iv)?;
        let mut block = [0u8; DIGEST_BLOCK_LEN];
        for offset in (0..digest_len).step_by(DIGEST_BLOCK_LEN) {
            read_flash(env.flash, &mut block, bootloader.start_addr + offset)?;
            self.engine.update(&block)?;
        }
        record.digest = self.engine.finish()?;
        info!(
            "bootloader digest over 0x{:x} bytes: {}",
            digest_len,
            HexBytes(&record.digest[..16])
        );

        write_flash_verified(env.flash, record.as_bytes(), record_offset)?;
        info!("bootloader digest written to 0x{:x}", record_offset);
        Ok(())
    }

    fn provision_key(&mut self, fuses: &mut dyn RawFuses, coding: CodingScheme) -> SbootResult<()> {
        let snapshot = FuseSnapshot::read(fuses);
        let protected = snapshot.key_read_protected || snapshot.key_write_protected;
        if protected || !key_block_is_blank(fuses)? {
            warn!("using pre-loaded secure boot key");
            return Ok(());
        }

        info!("generating new secure boot key");
        let mut key = [0u8; KEY_BLOCK_LEN];
        let key_len = coding.key_len();
        let result = self
            .entropy
            .fill_bytes(&mut key[..key_len])
            .and_then(|_| fuses.burn_key_block(&key[..key_len]));
        key.zeroize();
        result
    }
}
