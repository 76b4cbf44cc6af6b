/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Error codes reported by the secure boot ROM libraries.

--*/
#![cfg_attr(not(test), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Secure boot error type.
///
/// The upper 16 bits of the code select the [`ErrorKind`], the lower 16 bits
/// identify the failing check.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SbootError(pub NonZeroU32);

/// Broad classification of a [`SbootError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed signature block: wrong version, length, magic or variant.
    #[error("structural error")]
    Structural,
    /// Digest, block CRC or signature check failed over the block contents.
    #[error("authentication failure")]
    Authentication,
    /// Fuse state is contradictory or only partially burned.
    #[error("hardware inconsistency")]
    HardwareInconsistency,
    /// Flash, fuse, entropy or digest engine access failed.
    #[error("i/o failure")]
    Io,
    /// Operation invoked from the wrong context or out of sequence.
    #[error("usage error")]
    Usage,
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: SbootError = SbootError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl SbootError {
    /// Create an error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. Use `SbootError::try_from()` for runtime values.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("SbootError cannot be 0"),
        }
    }

    define_error_constants![
        // Structural
        (
            SIG_BLOCK_VERSION_MISMATCH,
            0x0001_0001,
            "ECDSA signature block version is not supported"
        ),
        (
            SIG_BLOCK_INVALID_LENGTH,
            0x0001_0002,
            "Signature block has the wrong length for its scheme"
        ),
        (
            SIG_BLOCK_WRONG_SCHEME,
            0x0001_0003,
            "Signature block variant does not match the active scheme"
        ),
        (
            RSA_SIG_BLOCK_BAD_MAGIC,
            0x0001_0004,
            "RSA signature block magic byte or version is wrong"
        ),
        (
            RSA_SIG_BLOCK_INVALID_KEY,
            0x0001_0006,
            "RSA public key embedded in the signature block is malformed"
        ),
        (
            IMAGE_REGION_INVALID,
            0x0001_0007,
            "Signed region is empty or does not fit in flash"
        ),
        (
            BOOTLOADER_IMAGE_INVALID,
            0x0001_0008,
            "Bootloader image region is empty or too short"
        ),
        // Authentication
        (
            ECDSA_VERIFY_FAILED,
            0x0002_0001,
            "ECDSA signature did not verify against the image digest"
        ),
        (
            RSA_KEY_DIGEST_MISMATCH,
            0x0002_0002,
            "RSA public key digest does not match the fused key digest"
        ),
        (
            RSA_IMAGE_DIGEST_MISMATCH,
            0x0002_0003,
            "Image digest in the RSA signature block does not match the image"
        ),
        (
            RSA_PSS_VERIFY_FAILED,
            0x0002_0004,
            "RSA-PSS signature did not verify against the image digest"
        ),
        (
            ECDSA_PUBLIC_KEY_INVALID,
            0x0002_0005,
            "Compiled-in ECDSA public key is missing or not a curve point"
        ),
        (
            RSA_SIG_BLOCK_BAD_CRC,
            0x0002_0006,
            "RSA signature block contents do not match the block CRC"
        ),
        // Hardware inconsistency
        (
            FUSE_PARTIAL_BURN,
            0x0003_0001,
            "Key protection fuses are set but the scheme enable fuse is not"
        ),
        (
            FUSE_BOTH_SCHEMES_ACTIVE,
            0x0003_0002,
            "Both secure boot scheme enable fuses are set"
        ),
        (
            FUSE_OTHER_SCHEME_ACTIVE,
            0x0003_0003,
            "The other secure boot scheme is already enabled"
        ),
        (
            FUSE_BURN_NOT_APPLIED,
            0x0003_0004,
            "Fuse read-back after burning does not show the enable bit"
        ),
        (
            FUSE_KEY_DIGEST_CONFLICT,
            0x0003_0005,
            "Key block already holds a different public key digest"
        ),
        (
            FUSE_CODING_SCHEME_UNSUPPORTED,
            0x0003_0006,
            "Key block coding scheme is not supported"
        ),
        // I/O
        (FLASH_READ_FAILED, 0x0004_0001, "Flash read failed"),
        (FLASH_WRITE_FAILED, 0x0004_0002, "Flash write failed"),
        (
            FLASH_VERIFY_FAILED,
            0x0004_0003,
            "Flash contents differ from what was just written"
        ),
        (FUSE_BURN_FAILED, 0x0004_0005, "Fuse burn failed"),
        (ENTROPY_FAILED, 0x0004_0006, "Entropy source failed"),
        (
            DIGEST_ENGINE_FAILED,
            0x0004_0007,
            "Secure boot digest engine failed"
        ),
        // Usage
        (
            NOT_BOOTLOADER_CONTEXT,
            0x0005_0001,
            "Operation is only permitted in the bootloader"
        ),
        (
            DIGEST_NOT_GENERATED,
            0x0005_0002,
            "Bootloader digest must be generated before enabling secure boot V1"
        ),
        (
            NO_ACTIVE_SCHEME,
            0x0005_0003,
            "No secure boot scheme is enabled or configured"
        ),
        (
            KEY_BLOCK_READ_PROTECTED,
            0x0005_0004,
            "Key block is read protected"
        ),
        (
            DIGEST_ENGINE_UNAVAILABLE,
            0x0005_0005,
            "Secure boot V1 needs a digest engine and entropy source"
        ),
    ];

    /// Returns the class of failure this code belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self.0.get() >> 16 {
            0x0001 => ErrorKind::Structural,
            0x0002 => ErrorKind::Authentication,
            0x0003 => ErrorKind::HardwareInconsistency,
            0x0005 => ErrorKind::Usage,
            _ => ErrorKind::Io,
        }
    }

    /// True when the image must not be trusted: the signature block was
    /// malformed or did not authenticate.
    pub const fn is_untrusted_image(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Structural | ErrorKind::Authentication
        )
    }
}

impl core::fmt::Display for SbootError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (0x{:08x})", self.kind(), self.0.get())
    }
}

impl core::error::Error for SbootError {}

impl From<core::num::NonZeroU32> for crate::SbootError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::SbootError(val)
    }
}

impl From<SbootError> for core::num::NonZeroU32 {
    fn from(val: SbootError) -> Self {
        val.0
    }
}

impl From<SbootError> for u32 {
    fn from(val: SbootError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for SbootError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(SbootError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type SbootResult<T> = Result<T, SbootError>;
