// Licensed under the Apache-2.0 license

//! Cryptographic primitives used by secure boot.
//!
//! The ROM code only depends on the traits in this module. The `rustcrypto`
//! feature provides software implementations; targets with hardware SHA or
//! RSA accelerators implement the traits themselves.

use rand::{CryptoRng, RngCore};
use sboot_error::{SbootError, SbootResult};
use sboot_flash_image::{RsaPublicKeyBlock, ECDSA_SIG_LEN, RSA_KEY_LEN};

pub const SHA256_DIGEST_LEN: usize = 32;
pub const ECDSA_PUBLIC_KEY_LEN: usize = 64;

/// Streaming SHA-256.
pub trait Sha256Engine {
    /// Discards any previous state.
    fn start(&mut self);
    fn update(&mut self, data: &[u8]);
    fn finish(&mut self) -> [u8; SHA256_DIGEST_LEN];

    fn digest(&mut self, data: &[u8]) -> [u8; SHA256_DIGEST_LEN] {
        self.start();
        self.update(data);
        self.finish()
    }
}

/// Public key signature checks over a precomputed SHA-256 digest.
pub trait SignatureCrypto {
    /// `public_key` is the uncompressed point `x || y`, `signature` is `r || s`.
    ///
    /// Fails with `ECDSA_PUBLIC_KEY_INVALID` if the key is not on the curve and
    /// `ECDSA_VERIFY_FAILED` for any signature problem.
    fn ecdsa_p256_verify(
        &self,
        public_key: &[u8; ECDSA_PUBLIC_KEY_LEN],
        digest: &[u8; SHA256_DIGEST_LEN],
        signature: &[u8; ECDSA_SIG_LEN],
    ) -> SbootResult<()>;

    /// RSA-PSS with MGF1-SHA-256 and a 32 byte salt. `signature` is little-endian.
    ///
    /// Fails with `RSA_SIG_BLOCK_INVALID_KEY` for an unusable key and
    /// `RSA_PSS_VERIFY_FAILED` if the signature does not match.
    fn rsa_pss_sha256_verify(
        &self,
        key: &RsaPublicKeyBlock,
        digest: &[u8; SHA256_DIGEST_LEN],
        signature: &[u8; RSA_KEY_LEN],
    ) -> SbootResult<()>;
}

/// Source of key material and IVs. Must be cryptographically secure.
pub trait EntropySource {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> SbootResult<()>;
}

/// Adapts a `rand` generator. The `CryptoRng` bound keeps non-cryptographic
/// generators out of key generation.
pub struct RngEntropy<R: RngCore + CryptoRng>(pub R);

impl<R: RngCore + CryptoRng> EntropySource for RngEntropy<R> {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> SbootResult<()> {
        self.0
            .try_fill_bytes(dest)
            .map_err(|_| SbootError::ENTROPY_FAILED)
    }
}

#[cfg(feature = "rustcrypto")]
pub use rustcrypto::{RustCryptoSha256, RustCryptoVerifier};

#[cfg(feature = "rustcrypto")]
mod rustcrypto {
    use super::*;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use rsa::{BigUint, Pss, RsaPublicKey};
    use sha2::{Digest, Sha256};

    #[derive(Default)]
    pub struct RustCryptoSha256 {
        hasher: Sha256,
    }

    impl Sha256Engine for RustCryptoSha256 {
        fn start(&mut self) {
            self.hasher = Sha256::new();
        }

        fn update(&mut self, data: &[u8]) {
            Digest::update(&mut self.hasher, data);
        }

        fn finish(&mut self) -> [u8; SHA256_DIGEST_LEN] {
            self.hasher.finalize_reset().into()
        }
    }

    #[derive(Default)]
    pub struct RustCryptoVerifier;

    impl SignatureCrypto for RustCryptoVerifier {
        fn ecdsa_p256_verify(
            &self,
            public_key: &[u8; ECDSA_PUBLIC_KEY_LEN],
            digest: &[u8; SHA256_DIGEST_LEN],
            signature: &[u8; ECDSA_SIG_LEN],
        ) -> SbootResult<()> {
            let mut sec1 = [0u8; 1 + ECDSA_PUBLIC_KEY_LEN];
            sec1[0] = 0x04;
            sec1[1..].copy_from_slice(public_key);
            let key = VerifyingKey::from_sec1_bytes(&sec1)
                .map_err(|_| SbootError::ECDSA_PUBLIC_KEY_INVALID)?;
            let signature =
                Signature::from_slice(signature).map_err(|_| SbootError::ECDSA_VERIFY_FAILED)?;
            key.verify_prehash(digest, &signature)
                .map_err(|_| SbootError::ECDSA_VERIFY_FAILED)
        }

        fn rsa_pss_sha256_verify(
            &self,
            key: &RsaPublicKeyBlock,
            digest: &[u8; SHA256_DIGEST_LEN],
            signature: &[u8; RSA_KEY_LEN],
        ) -> SbootResult<()> {
            let n = BigUint::from_bytes_le(&key.n);
            let e = BigUint::from(key.e.get());
            let public_key =
                RsaPublicKey::new(n, e).map_err(|_| SbootError::RSA_SIG_BLOCK_INVALID_KEY)?;

            let mut signature_be = *signature;
            signature_be.reverse();
            public_key
                .verify(Pss::new::<Sha256>(), digest, &signature_be)
                .map_err(|_| SbootError::RSA_PSS_VERIFY_FAILED)
        }
    }
}
