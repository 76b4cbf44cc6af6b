// Licensed under the Apache-2.0 license
#![no_std]

//! On-flash records written and consumed by secure boot.
//!
//! All multi-byte integers are little-endian.

use core::mem::{offset_of, size_of};

use zerocopy::{byteorder::little_endian::U32, FromBytes, Immutable, IntoBytes, KnownLayout};

/// The only supported [`EcdsaSigBlock::version`].
pub const ECDSA_SIG_BLOCK_VERSION: u32 = 1;
pub const ECDSA_SIG_LEN: usize = 64;

pub const IV_LEN: usize = 128;
pub const BOOTLOADER_DIGEST_LEN: usize = 64;

pub const RSA_SIG_BLOCK_MAGIC: u8 = 0xE7;
pub const RSA_SIG_BLOCK_VERSION: u8 = 0x02;
pub const RSA_KEY_LEN: usize = 384;
pub const RSA_SIG_BLOCKS_PER_SECTOR: usize = 3;
pub const SIG_SECTOR_LEN: usize = 4096;

/// Signature appended to an app image under secure boot V1.
///
/// `signature` is the P-256 `r || s` pair, each big-endian.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Clone, Copy, Immutable, KnownLayout)]
pub struct EcdsaSigBlock {
    pub version: U32,
    pub signature: [u8; ECDSA_SIG_LEN],
}

impl EcdsaSigBlock {
    pub fn new(signature: [u8; ECDSA_SIG_LEN]) -> Self {
        EcdsaSigBlock {
            version: ECDSA_SIG_BLOCK_VERSION.into(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.version.get() == ECDSA_SIG_BLOCK_VERSION
    }
}

/// IV and keyed digest of the bootloader, read by ROM on every V1 boot.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Clone, Copy, Immutable, KnownLayout)]
pub struct IvDigest {
    pub iv: [u8; IV_LEN],
    pub digest: [u8; BOOTLOADER_DIGEST_LEN],
}

impl IvDigest {
    /// True if the record still reads as erased flash.
    pub fn is_erased(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0xff)
    }
}

/// RSA-3072 public key as stored in a V2 signature block.
///
/// `n` is little-endian. `rinv` and `mdash` are Montgomery constants used by
/// the ROM's hardware RSA engine.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Clone, Copy, Immutable, KnownLayout)]
pub struct RsaPublicKeyBlock {
    pub n: [u8; RSA_KEY_LEN],
    pub e: U32,
    pub rinv: [u8; RSA_KEY_LEN],
    pub mdash: U32,
}

/// A single secure boot V2 signature block.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Clone, Copy, Immutable, KnownLayout)]
pub struct RsaSigBlock {
    pub magic_byte: u8,
    pub version: u8,
    pub reserved: [u8; 2],
    /// SHA-256 of the signed image.
    pub image_digest: [u8; 32],
    pub key: RsaPublicKeyBlock,
    /// RSA-PSS signature, little-endian.
    pub signature: [u8; RSA_KEY_LEN],
    /// CRC-32 of all preceding bytes of the block.
    pub block_crc: U32,
    pub padding: [u8; 16],
}

impl RsaSigBlock {
    pub fn compute_crc(&self) -> u32 {
        crc32fast::hash(&self.as_bytes()[..offset_of!(RsaSigBlock, block_crc)])
    }

    /// Sets the header fields and the CRC. Called after the payload is filled in.
    pub fn seal(&mut self) {
        self.magic_byte = RSA_SIG_BLOCK_MAGIC;
        self.version = RSA_SIG_BLOCK_VERSION;
        self.block_crc = self.compute_crc().into();
    }

    pub fn magic_valid(&self) -> bool {
        self.magic_byte == RSA_SIG_BLOCK_MAGIC && self.version == RSA_SIG_BLOCK_VERSION
    }

    pub fn verify(&self) -> bool {
        self.magic_valid() && self.block_crc.get() == self.compute_crc()
    }
}

/// Flash sector appended to a V2 signed image.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Clone, Copy, Immutable, KnownLayout)]
pub struct RsaSignatureSector {
    pub blocks: [RsaSigBlock; RSA_SIG_BLOCKS_PER_SECTOR],
    pub padding: [u8; SIG_SECTOR_LEN - RSA_SIG_BLOCKS_PER_SECTOR * size_of::<RsaSigBlock>()],
}

const _: () = assert!(size_of::<EcdsaSigBlock>() == 68);
const _: () = assert!(size_of::<IvDigest>() == 192);
const _: () = assert!(size_of::<RsaPublicKeyBlock>() == 776);
const _: () = assert!(size_of::<RsaSigBlock>() == 1216);
const _: () = assert!(offset_of!(RsaSigBlock, block_crc) == 1196);
const _: () = assert!(size_of::<RsaSignatureSector>() == SIG_SECTOR_LEN);
