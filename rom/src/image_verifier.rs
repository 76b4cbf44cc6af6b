// Licensed under the Apache-2.0 license

//! Locates and checks the signature appended to a signed flash region.

use crate::crypto::{Sha256Engine, SHA256_DIGEST_LEN};
use crate::env::SecureBootEnv;
use crate::flash::{read_flash, FlashStorage};
use crate::verify::{SignatureBlock, VerifiedDigest};
use core::mem::size_of;
use log::{error, info};
use sboot_config::SecureBootVersion;
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{EcdsaSigBlock, RsaSignatureSector, SIG_SECTOR_LEN};
use sboot_romtime::HexBytes;

/// Location of an image in flash, as reported by the image parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageRegion {
    pub start_addr: u32,
    pub image_len: u32,
    /// The image ends with its own SHA-256.
    pub hash_appended: bool,
}

impl ImageRegion {
    pub const fn new(start_addr: u32, image_len: u32) -> Self {
        Self {
            start_addr,
            image_len,
            hash_appended: false,
        }
    }

    /// Bytes covered by the V1 bootloader digest: the image minus any
    /// appended hash, rounded up to whole 128 byte blocks.
    pub fn digest_len(&self) -> SbootResult<u32> {
        let len = if self.hash_appended {
            self.image_len.checked_sub(SHA256_DIGEST_LEN as u32)
        } else {
            Some(self.image_len)
        };
        len.filter(|&len| len > 0)
            .and_then(|len| len.checked_next_multiple_of(128))
            .ok_or_else(|| {
                error!("bootloader image length 0x{:x} invalid", self.image_len);
                SbootError::BOOTLOADER_IMAGE_INVALID
            })
    }
}

/// Checks the signature of a region of flash.
pub trait ImageVerifier {
    /// Hashes `length` bytes at `src_addr`, reads the signature block that
    /// follows and checks it with the active secure boot scheme.
    fn verify_region(&mut self, src_addr: u32, length: u32) -> SbootResult<VerifiedDigest>;
}

/// SHA-256 of `len` bytes of flash at `addr`.
pub fn sha256_flash(
    flash: &dyn FlashStorage,
    sha256: &mut dyn Sha256Engine,
    addr: u32,
    len: u32,
) -> SbootResult<[u8; SHA256_DIGEST_LEN]> {
    let mut buf = [0u8; 256];
    sha256.start();
    let mut offset = 0;
    while offset < len {
        let chunk = (len - offset).min(buf.len() as u32);
        let buf = &mut buf[..chunk as usize];
        read_flash(flash, buf, addr + offset)?;
        sha256.update(buf);
        offset += chunk;
    }
    Ok(sha256.finish())
}

/// Where the signed data ends and the signature block starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedRegion {
    pub start_addr: u32,
    pub signed_len: u32,
    pub block_addr: u32,
    pub block_len: u32,
}

impl SecureBootEnv<'_> {
    /// The scheme app signatures are checked with: the fused one, or the
    /// configured one while nothing is fused.
    pub fn verification_scheme(&self) -> SbootResult<SecureBootVersion> {
        let snapshot = self.snapshot();
        if snapshot.scheme_v1_active && snapshot.scheme_v2_active {
            error!("both secure boot schemes are enabled");
            return Err(SbootError::FUSE_BOTH_SCHEMES_ACTIVE);
        }
        snapshot
            .active_scheme()
            .or(self.config.signed_apps_scheme)
            .ok_or_else(|| {
                error!("no secure boot scheme to check signatures with");
                SbootError::NO_ACTIVE_SCHEME
            })
    }

    /// Lays out a signed region for `scheme`. V2 signatures start on the next
    /// sector boundary and the padding up to it is signed too.
    pub fn signed_region(
        &self,
        scheme: SecureBootVersion,
        src_addr: u32,
        length: u32,
    ) -> SbootResult<SignedRegion> {
        let (signed_len, block_len) = match scheme {
            SecureBootVersion::V1 => (Some(length), size_of::<EcdsaSigBlock>()),
            SecureBootVersion::V2 => (
                length.checked_next_multiple_of(self.config.layout.sector_size),
                size_of::<RsaSignatureSector>(),
            ),
        };
        let region = signed_len.and_then(|signed_len| {
            let block_addr = src_addr.checked_add(signed_len)?;
            let end = block_addr.checked_add(block_len as u32)?;
            (end as usize <= self.flash.capacity()).then_some(SignedRegion {
                start_addr: src_addr,
                signed_len,
                block_addr,
                block_len: block_len as u32,
            })
        });
        region.ok_or_else(|| {
            error!(
                "signed region 0x{:x}+0x{:x} does not fit in flash",
                src_addr, length
            );
            SbootError::IMAGE_REGION_INVALID
        })
    }

    pub(crate) fn hash_region(&mut self, region: &SignedRegion) -> SbootResult<[u8; 32]> {
        sha256_flash(
            self.flash,
            &mut *self.sha256,
            region.start_addr,
            region.signed_len,
        )
    }
}

impl ImageVerifier for SecureBootEnv<'_> {
    fn verify_region(&mut self, src_addr: u32, length: u32) -> SbootResult<VerifiedDigest> {
        let scheme = self.verification_scheme()?;
        let region = self.signed_region(scheme, src_addr, length)?;
        let digest = self.hash_region(&region)?;
        info!(
            "checking {:?} signature of 0x{:x}+0x{:x}, digest {}",
            scheme,
            src_addr,
            region.signed_len,
            HexBytes(&digest)
        );

        let mut buf = [0u8; SIG_SECTOR_LEN];
        let bytes = &mut buf[..region.block_len as usize];
        read_flash(self.flash, bytes, region.block_addr)?;
        let block = SignatureBlock::parse(scheme, bytes)?;
        self.verifier().verify(scheme, &block, &digest)
    }
}
