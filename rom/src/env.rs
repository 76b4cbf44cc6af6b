/*++

Licensed under the Apache-2.0 license.

File Name:

    env.rs

Abstract:

    Secure boot environment - the configuration and peripherals shared by
    every secure boot operation.

--*/

use crate::crypto::{Sha256Engine, SignatureCrypto};
use crate::flash::FlashStorage;
use crate::fuses::{FuseSnapshot, RawFuses};
use crate::verify::SignatureVerifier;
use log::error;
use sboot_config::{ExecContext, SecureBootConfig};
use sboot_error::{SbootError, SbootResult};

pub struct SecureBootEnv<'a> {
    pub config: &'a SecureBootConfig,
    pub fuses: &'a mut dyn RawFuses,
    pub flash: &'a dyn FlashStorage,
    pub sha256: &'a mut dyn Sha256Engine,
    pub crypto: &'a dyn SignatureCrypto,
}

impl<'a> SecureBootEnv<'a> {
    pub fn new(
        config: &'a SecureBootConfig,
        fuses: &'a mut dyn RawFuses,
        flash: &'a dyn FlashStorage,
        sha256: &'a mut dyn Sha256Engine,
        crypto: &'a dyn SignatureCrypto,
    ) -> Self {
        Self {
            config,
            fuses,
            flash,
            sha256,
            crypto,
        }
    }

    /// Fails unless running in the second stage bootloader.
    pub fn require_bootloader(&self) -> SbootResult<()> {
        match self.config.context {
            ExecContext::Bootloader => Ok(()),
            ExecContext::Application => {
                error!("secure boot provisioning is only allowed in the bootloader");
                Err(SbootError::NOT_BOOTLOADER_CONTEXT)
            }
        }
    }

    pub fn snapshot(&self) -> FuseSnapshot {
        FuseSnapshot::read(&*self.fuses)
    }

    pub fn verifier(&mut self) -> SignatureVerifier<'_> {
        SignatureVerifier::new(
            &mut *self.sha256,
            self.crypto,
            &*self.fuses,
            self.config.ecdsa_public_key.as_ref(),
        )
    }
}
