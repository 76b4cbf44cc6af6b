/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Secure boot enablement and image signature checks for the second stage
    bootloader and the application.

--*/

#![cfg_attr(not(test), no_std)]

pub mod boot;
pub use boot::{BootFlow, SecureBootFlow, SecureBootParams};
pub mod crypto;
pub use crypto::*;
pub mod digest;
pub use digest::{DigestEngine, DigestGenerator};
pub mod enable;
pub use enable::{EnableSequencer, EnableState};
mod env;
pub use env::*;
pub mod flash;
pub use flash::*;
mod fuses;
pub use fuses::*;
pub mod image_verifier;
pub use image_verifier::{ImageRegion, ImageVerifier};
pub mod verify;
pub use verify::{SignatureBlock, SignatureVerifier, VerifiedDigest};

pub use sboot_config::{ExecContext, FlashLayout, SecureBootConfig, SecureBootVersion};
pub use sboot_error::{ErrorKind, SbootError, SbootResult};

#[cfg(test)]
mod testing;

pub trait FatalErrorHandler {
    fn fatal_error(&mut self, code: u32) -> !;
}

static mut FATAL_ERROR_HANDLER: Option<&'static mut dyn FatalErrorHandler> = None;

/// Set the fatal error handler.
///
/// SAFETY: it is important that the passed fatal handler is never used otherwise
/// and no other references exist to it. It is recommended to create a single instance
/// of the struct and pass it in immediatly, and never use it otherwise.
pub fn set_fatal_error_handler(handler: &'static mut dyn FatalErrorHandler) {
    unsafe {
        FATAL_ERROR_HANDLER = Some(handler);
    }
}

#[panic_handler]
#[inline(never)]
#[cfg(target_arch = "riscv32")]
fn rom_panic(_: &core::panic::PanicInfo) -> ! {
    fatal_error(0);
}

/// Stops the boot with `code`, normally a [`SbootError`] value. Never returns.
#[inline(never)]
#[allow(clippy::empty_loop)]
pub fn fatal_error(code: u32) -> ! {
    #[allow(static_mut_refs)]
    if let Some(handler) = unsafe { FATAL_ERROR_HANDLER.as_mut() } {
        handler.fatal_error(code);
    } else {
        // If no handler is set, just loop forever
        loop {}
    }
}
