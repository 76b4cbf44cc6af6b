/*++

Licensed under the Apache-2.0 license.

File Name:

    enable.rs

Abstract:

    Permanent secure boot enablement. Every fuse write made by secure boot
    goes through the sequencer, which never repairs a partial burn.

--*/

use crate::env::SecureBootEnv;
use crate::flash::read_record;
use crate::fuses::{enable_bit, CodingScheme, FuseBit, FuseSnapshot, KEY_BLOCK_LEN};
use crate::image_verifier::ImageRegion;
use constant_time_eq::constant_time_eq_32;
use log::{error, info, warn};
use sboot_config::SecureBootVersion;
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{IvDigest, RsaSignatureSector};
use sboot_romtime::HexBytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnableState {
    Unenabled,
    /// Key protection burned without the enable bit. Never repaired.
    PartiallyBurned,
    Enabled,
}

impl EnableState {
    /// Classifies the fuses from the point of view of `scheme`.
    pub fn classify(snapshot: &FuseSnapshot, scheme: SecureBootVersion) -> SbootResult<Self> {
        if snapshot.scheme_v1_active && snapshot.scheme_v2_active {
            error!("both secure boot schemes are enabled");
            return Err(SbootError::FUSE_BOTH_SCHEMES_ACTIVE);
        }
        if snapshot.is_active(scheme) {
            return Ok(EnableState::Enabled);
        }
        if snapshot.active_scheme().is_some() {
            error!("another secure boot scheme is enabled, {:?} refused", scheme);
            return Err(SbootError::FUSE_OTHER_SCHEME_ACTIVE);
        }
        if snapshot.key_read_protected || snapshot.key_write_protected {
            return Ok(EnableState::PartiallyBurned);
        }
        Ok(EnableState::Unenabled)
    }
}

/// Drives the one-time fuse writes for one boot.
pub struct EnableSequencer<'e, 'a> {
    env: &'e mut SecureBootEnv<'a>,
}

impl<'e, 'a> EnableSequencer<'e, 'a> {
    pub fn new(env: &'e mut SecureBootEnv<'a>) -> Self {
        Self { env }
    }

    pub fn state(&self, scheme: SecureBootVersion) -> SbootResult<EnableState> {
        EnableState::classify(&self.env.snapshot(), scheme)
    }

    /// Protects the V1 key and enables V1. The bootloader digest must
    /// already be in flash.
    pub fn permanently_enable_v1(&mut self) -> SbootResult<()> {
        let scheme = SecureBootVersion::V1;
        if !self.needs_enable(scheme)? {
            return Ok(());
        }

        let record_offset = self.env.config.layout.iv_digest_offset;
        let record: IvDigest = read_record(self.env.flash, record_offset)?;
        if record.is_erased() {
            error!("no bootloader digest at 0x{:x}", record_offset);
            return Err(SbootError::DIGEST_NOT_GENERATED);
        }

        info!("enabling secure boot V1");
        self.burn(FuseBit::KeyReadDisable)?;
        self.burn(FuseBit::KeyWriteDisable)?;
        self.burn_debug_disables()?;
        self.burn(enable_bit(scheme))?;
        self.check_enabled(scheme)
    }

    /// Fuses the digest of the public key that signed `image` and enables
    /// V2. The image is checked against its own key before anything is burned.
    pub fn permanently_enable_v2(&mut self, image: &ImageRegion) -> SbootResult<()> {
        let scheme = SecureBootVersion::V2;
        if !self.needs_enable(scheme)? {
            return Ok(());
        }

        let coding = self.env.fuses.coding_scheme();
        if coding != CodingScheme::None {
            error!("key digest needs an uncoded key block, found {:?}", coding);
            return Err(SbootError::FUSE_CODING_SCHEME_UNSUPPORTED);
        }

        let region = self
            .env
            .signed_region(scheme, image.start_addr, image.image_len)?;
        let image_digest = self.env.hash_region(&region)?;
        let sector: RsaSignatureSector = read_record(self.env.flash, region.block_addr)?;
        let mut verifier = self.env.verifier();
        let key_digest = verifier.rsa_key_digest(&sector.blocks[0].key);
        verifier
            .verify_rsa_signature_block(&sector, &image_digest, &key_digest)
            .inspect_err(|_| error!("candidate image does not verify, V2 not enabled"))?;

        let mut fused = [0u8; KEY_BLOCK_LEN];
        self.env.fuses.read_key_block(&mut fused)?;
        if fused.iter().all(|&b| b == 0) {
            info!("burning public key digest {}", HexBytes(&key_digest));
            self.env.fuses.burn_key_block(&key_digest)?;
        } else if constant_time_eq_32(&fused, &key_digest) {
            info!("public key digest already burned");
        } else {
            error!(
                "key block holds {}, candidate key digest is {}",
                HexBytes(&fused),
                HexBytes(&key_digest)
            );
            return Err(SbootError::FUSE_KEY_DIGEST_CONFLICT);
        }

        info!("enabling secure boot V2");
        self.burn(FuseBit::KeyWriteDisable)?;
        self.burn_debug_disables()?;
        self.burn(enable_bit(scheme))?;
        self.check_enabled(scheme)
    }

    /// Returns true if `scheme` still has to be burned.
    fn needs_enable(&self, scheme: SecureBootVersion) -> SbootResult<bool> {
        self.env.require_bootloader()?;
        match self.state(scheme)? {
            EnableState::Unenabled => Ok(true),
            EnableState::Enabled => {
                self.warn_incomplete_protection(scheme);
                Ok(false)
            }
            EnableState::PartiallyBurned => {
                error!(
                    "key protection burned but {:?} not enabled, refusing to continue",
                    scheme
                );
                Err(SbootError::FUSE_PARTIAL_BURN)
            }
        }
    }

    fn warn_incomplete_protection(&self, scheme: SecureBootVersion) {
        let snapshot = self.env.snapshot();
        let read_protect_needed = scheme == SecureBootVersion::V1;
        if !snapshot.key_write_protected || (read_protect_needed && !snapshot.key_read_protected)
        {
            warn!(
                "secure boot {:?} enabled but the key block is not fully protected",
                scheme
            );
        } else {
            info!("secure boot {:?} already enabled", scheme);
        }
    }

    fn burn_debug_disables(&mut self) -> SbootResult<()> {
        if self.env.config.allow_jtag {
            warn!("JTAG left enabled");
        } else {
            self.burn(FuseBit::JtagDisable)?;
        }
        if self.env.config.allow_rom_basic {
            warn!("ROM console left enabled");
        } else {
            self.burn(FuseBit::ConsoleDebugDisable)?;
        }
        Ok(())
    }

    fn burn(&mut self, bit: FuseBit) -> SbootResult<()> {
        info!("burning {:?}", bit);
        self.env
            .fuses
            .burn_bit(bit)
            .inspect_err(|_| error!("burning {:?} failed", bit))
    }

    fn check_enabled(&self, scheme: SecureBootVersion) -> SbootResult<()> {
        if self.env.snapshot().is_active(scheme) {
            info!("secure boot {:?} enabled", scheme);
            Ok(())
        } else {
            error!("secure boot {:?} enable bit did not read back", scheme);
            Err(SbootError::FUSE_BURN_NOT_APPLIED)
        }
    }
}
