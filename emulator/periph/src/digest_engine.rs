/*++

Licensed under the Apache-2.0 license.

File Name:

    digest_engine.rs

Abstract:

    Software model of the V1 secure boot digest engine: AES-256-ECB over the
    IV and image, the ciphertext fed through SHA-512.

--*/

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{BOOTLOADER_DIGEST_LEN, IV_LEN};
use sboot_rom::digest::{DigestEngine, DIGEST_BLOCK_LEN};
use sboot_rom::{CodingScheme, RawFuses, KEY_BLOCK_LEN};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

#[derive(Default)]
pub struct SoftDigestEngine {
    cipher: Option<Aes256>,
    sha: Sha512,
}

impl SoftDigestEngine {
    /// The 256-bit AES key the engine uses for a raw key block. Under 3/4
    /// coding only 192 bits are stored and bytes 8..16 are appended.
    pub fn expand_key(key_block: &[u8; KEY_BLOCK_LEN], coding: CodingScheme) -> [u8; 32] {
        let mut key = *key_block;
        if coding == CodingScheme::ThreeFour {
            key.copy_within(8..16, 24);
        }
        key
    }

    /// Digest of `iv` and `image` as the ROM computes it on every boot. The
    /// image is padded with erased flash to whole 128 byte blocks.
    pub fn bootloader_digest(
        key: &[u8; 32],
        iv: &[u8; IV_LEN],
        image: &[u8],
    ) -> SbootResult<[u8; BOOTLOADER_DIGEST_LEN]> {
        let mut engine = SoftDigestEngine::default();
        engine.start_with_key(key, iv)?;
        for chunk in image.chunks(DIGEST_BLOCK_LEN) {
            let mut block = [0xff; DIGEST_BLOCK_LEN];
            block[..chunk.len()].copy_from_slice(chunk);
            engine.update(&block)?;
        }
        engine.finish()
    }

    fn start_with_key(&mut self, key: &[u8; 32], iv: &[u8; IV_LEN]) -> SbootResult<()> {
        let cipher = Aes256::new_from_slice(key).map_err(|_| SbootError::DIGEST_ENGINE_FAILED)?;
        self.cipher = Some(cipher);
        self.sha = Sha512::new();
        self.absorb(iv)
    }

    /// Each 16 byte block is reversed going into and coming out of AES, and
    /// each ciphertext word is byte swapped before hashing.
    fn absorb(&mut self, data: &[u8]) -> SbootResult<()> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or(SbootError::DIGEST_ENGINE_FAILED)?;
        for chunk in data.chunks_exact(16) {
            let mut block = Block::clone_from_slice(chunk);
            block.reverse();
            cipher.encrypt_block(&mut block);
            block.reverse();
            for word in block.chunks_exact(4) {
                self.sha.update([word[3], word[2], word[1], word[0]]);
            }
        }
        Ok(())
    }
}

impl DigestEngine for SoftDigestEngine {
    fn start(&mut self, fuses: &dyn RawFuses, iv: &[u8; IV_LEN]) -> SbootResult<()> {
        let mut key_block = [0u8; KEY_BLOCK_LEN];
        fuses.read_key_block(&mut key_block)?;
        let mut key = Self::expand_key(&key_block, fuses.coding_scheme());
        let result = self.start_with_key(&key, iv);
        key_block.zeroize();
        key.zeroize();
        result
    }

    fn update(&mut self, block: &[u8; DIGEST_BLOCK_LEN]) -> SbootResult<()> {
        self.absorb(block)
    }

    fn finish(&mut self) -> SbootResult<[u8; BOOTLOADER_DIGEST_LEN]> {
        if self.cipher.take().is_none() {
            return Err(SbootError::DIGEST_ENGINE_FAILED);
        }
        let hash = self.sha.finalize_reset();
        let mut digest = [0u8; BOOTLOADER_DIGEST_LEN];
        for (dst, src) in digest.chunks_exact_mut(4).zip(hash.chunks_exact(4)) {
            dst.copy_from_slice(&[src[3], src[2], src[1], src[0]]);
        }
        Ok(digest)
    }
}
