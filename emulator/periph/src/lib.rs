/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Host emulation of the peripherals secure boot drives: eFuses, SPI flash
    and the V1 bootloader digest engine.

--*/

mod digest_engine;
mod efuse;
mod flash;

pub use digest_engine::SoftDigestEngine;
pub use efuse::{EfuseArgs, EmuEfuse};
pub use flash::EmuFlash;
