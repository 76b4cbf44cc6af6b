/*++

Licensed under the Apache-2.0 license.

File Name:

    boot.rs

Abstract:

    Bootloader secure boot flow: provision, enable, then check the app.

--*/

use crate::digest::DigestGenerator;
use crate::enable::EnableSequencer;
use crate::env::SecureBootEnv;
use crate::fatal_error;
use crate::image_verifier::{ImageRegion, ImageVerifier};
use crate::verify::VerifiedDigest;
use core::fmt::Write;
use log::{error, info};
use sboot_config::SecureBootVersion;
use sboot_error::{SbootError, SbootResult};
use sboot_romtime::HexWord;

pub struct SecureBootParams<'a> {
    /// Length of the bootloader image at the configured bootloader offset.
    pub bootloader_len: u32,
    pub app: ImageRegion,
    /// Needed for V1 only.
    pub digest: Option<DigestGenerator<'a>>,
}

/// Trait for secure boot flows run by the bootloader.
pub trait BootFlow {
    /// Execute the boot flow
    fn run(env: &mut SecureBootEnv, params: SecureBootParams) -> SbootResult<VerifiedDigest>;

    /// Runs the flow and stops the boot through the fatal error handler if
    /// anything fails.
    fn run_or_halt(env: &mut SecureBootEnv, params: SecureBootParams) -> VerifiedDigest {
        match Self::run(env, params) {
            Ok(digest) => digest,
            Err(err) => {
                error!("secure boot failed: {}", err);
                sboot_romtime::println!("[sboot-rom] Fatal error {}", HexWord(err.into()));
                fatal_error(err.into())
            }
        }
    }
}

pub struct SecureBootFlow {}

impl BootFlow for SecureBootFlow {
    fn run(env: &mut SecureBootEnv, params: SecureBootParams) -> SbootResult<VerifiedDigest> {
        let scheme = env.config.version;
        info!("secure boot {:?} flow starting", scheme);

        match scheme {
            SecureBootVersion::V1 => {
                let Some(mut generator) = params.digest else {
                    error!("secure boot V1 needs a digest engine");
                    return Err(SbootError::DIGEST_ENGINE_UNAVAILABLE);
                };
                let bootloader =
                    ImageRegion::new(env.config.layout.bootloader_offset, params.bootloader_len);
                generator.generate_digest(env, &bootloader)?;
                EnableSequencer::new(env).permanently_enable_v1()?;
            }
            SecureBootVersion::V2 => {
                EnableSequencer::new(env).permanently_enable_v2(&params.app)?;
            }
        }

        let digest = env.verify_region(params.app.start_addr, params.app.image_len)?;
        info!("app at 0x{:x} verified", params.app.start_addr);
        Ok(digest)
    }
}
