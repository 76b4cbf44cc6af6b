// Licensed under the Apache-2.0 license

//! Signature block checks for both secure boot schemes.

use crate::crypto::{Sha256Engine, SignatureCrypto, ECDSA_PUBLIC_KEY_LEN, SHA256_DIGEST_LEN};
use crate::fuses::{RawFuses, KEY_BLOCK_LEN};
use constant_time_eq::constant_time_eq_32;
use log::{debug, error};
use sboot_config::SecureBootVersion;
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{EcdsaSigBlock, RsaPublicKeyBlock, RsaSignatureSector};
use sboot_romtime::HexBytes;
use zerocopy::{FromBytes, IntoBytes};

/// Digest of an image whose signature checked out.
///
/// Only meaningful to the bootloader, which hands it to later boot stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifiedDigest(pub [u8; SHA256_DIGEST_LEN]);

/// A signature block read from flash, tagged with the scheme it belongs to.
#[derive(Clone, Copy, Debug)]
pub enum SignatureBlock<'a> {
    Ecdsa(&'a EcdsaSigBlock),
    RsaPss(&'a RsaSignatureSector),
}

impl<'a> SignatureBlock<'a> {
    /// Interprets `bytes` as a signature block for `scheme`. The length must match exactly.
    pub fn parse(scheme: SecureBootVersion, bytes: &'a [u8]) -> SbootResult<Self> {
        let block = match scheme {
            SecureBootVersion::V1 => EcdsaSigBlock::ref_from_bytes(bytes)
                .ok()
                .map(SignatureBlock::Ecdsa),
            SecureBootVersion::V2 => RsaSignatureSector::ref_from_bytes(bytes)
                .ok()
                .map(SignatureBlock::RsaPss),
        };
        block.ok_or_else(|| {
            error!(
                "{} byte signature block is not a {:?} block",
                bytes.len(),
                scheme
            );
            SbootError::SIG_BLOCK_INVALID_LENGTH
        })
    }

    pub fn scheme(&self) -> SecureBootVersion {
        match self {
            SignatureBlock::Ecdsa(_) => SecureBootVersion::V1,
            SignatureBlock::RsaPss(_) => SecureBootVersion::V2,
        }
    }
}

pub struct SignatureVerifier<'a> {
    sha256: &'a mut dyn Sha256Engine,
    crypto: &'a dyn SignatureCrypto,
    fuses: &'a dyn RawFuses,
    ecdsa_public_key: Option<&'a [u8; ECDSA_PUBLIC_KEY_LEN]>,
}

impl<'a> SignatureVerifier<'a> {
    pub fn new(
        sha256: &'a mut dyn Sha256Engine,
        crypto: &'a dyn SignatureCrypto,
        fuses: &'a dyn RawFuses,
        ecdsa_public_key: Option<&'a [u8; ECDSA_PUBLIC_KEY_LEN]>,
    ) -> Self {
        Self {
            sha256,
            crypto,
            fuses,
            ecdsa_public_key,
        }
    }

    /// Checks `block` against `image_digest` under `scheme`.
    ///
    /// V2 blocks are checked against the public key digest burned into the key block.
    pub fn verify(
        &mut self,
        scheme: SecureBootVersion,
        block: &SignatureBlock,
        image_digest: &[u8; SHA256_DIGEST_LEN],
    ) -> SbootResult<VerifiedDigest> {
        match (scheme, block) {
            (SecureBootVersion::V1, SignatureBlock::Ecdsa(block)) => {
                self.verify_ecdsa_signature_block(block, image_digest)
            }
            (SecureBootVersion::V2, SignatureBlock::RsaPss(sector)) => {
                let mut trusted = [0u8; KEY_BLOCK_LEN];
                self.fuses.read_key_block(&mut trusted)?;
                self.verify_rsa_signature_block(sector, image_digest, &trusted)
            }
            _ => {
                error!(
                    "{:?} signature block presented to secure boot {:?}",
                    block.scheme(),
                    scheme
                );
                Err(SbootError::SIG_BLOCK_WRONG_SCHEME)
            }
        }
    }

    /// Checks an ECDSA P-256 signature block with the compiled-in public key.
    pub fn verify_ecdsa_signature_block(
        &self,
        block: &EcdsaSigBlock,
        image_digest: &[u8; SHA256_DIGEST_LEN],
    ) -> SbootResult<VerifiedDigest> {
        if !block.verify() {
            error!("signature block version {} not supported", block.version.get());
            return Err(SbootError::SIG_BLOCK_VERSION_MISMATCH);
        }
        let Some(public_key) = self.ecdsa_public_key else {
            error!("no signature verification key configured");
            return Err(SbootError::ECDSA_PUBLIC_KEY_INVALID);
        };
        self.crypto
            .ecdsa_p256_verify(public_key, image_digest, &block.signature)
            .inspect_err(|_| error!("image signature verification failed"))?;
        debug!("signature verified for digest {}", HexBytes(image_digest));
        Ok(VerifiedDigest(*image_digest))
    }

    /// SHA-256 over the key as it is laid out in the signature block.
    pub fn rsa_key_digest(&mut self, key: &RsaPublicKeyBlock) -> [u8; SHA256_DIGEST_LEN] {
        self.sha256.digest(key.as_bytes())
    }

    /// Checks the first block of an RSA-PSS signature sector.
    ///
    /// The key embedded in the block must hash to `trusted_key_digest`.
    pub fn verify_rsa_signature_block(
        &mut self,
        sector: &RsaSignatureSector,
        image_digest: &[u8; SHA256_DIGEST_LEN],
        trusted_key_digest: &[u8; SHA256_DIGEST_LEN],
    ) -> SbootResult<VerifiedDigest> {
        let block = &sector.blocks[0];
        if !block.magic_valid() {
            error!(
                "bad signature block magic 0x{:02x} version 0x{:02x}",
                block.magic_byte, block.version
            );
            return Err(SbootError::RSA_SIG_BLOCK_BAD_MAGIC);
        }
        if !block.verify() {
            error!("signature block CRC mismatch");
            return Err(SbootError::RSA_SIG_BLOCK_BAD_CRC);
        }

        let key_digest = self.rsa_key_digest(&block.key);
        if !constant_time_eq_32(&key_digest, trusted_key_digest) {
            error!("public key digest {} is not trusted", HexBytes(&key_digest));
            return Err(SbootError::RSA_KEY_DIGEST_MISMATCH);
        }
        if !constant_time_eq_32(&block.image_digest, image_digest) {
            error!(
                "image digest {} does not match signed digest {}",
                HexBytes(image_digest),
                HexBytes(&block.image_digest)
            );
            return Err(SbootError::RSA_IMAGE_DIGEST_MISMATCH);
        }

        self.crypto
            .rsa_pss_sha256_verify(&block.key, image_digest, &block.signature)
            .inspect_err(|_| error!("image signature verification failed"))?;
        debug!("signature verified for digest {}", HexBytes(image_digest));
        Ok(VerifiedDigest(*image_digest))
    }

    #[deprecated(note = "use verify_ecdsa_signature_block")]
    pub fn verify_signature_block(
        &self,
        block: &EcdsaSigBlock,
        image_digest: &[u8; SHA256_DIGEST_LEN],
    ) -> SbootResult<()> {
        self.verify_ecdsa_signature_block(block, image_digest)
            .map(|_| ())
    }
}
