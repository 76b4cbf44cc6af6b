// Licensed under the Apache-2.0 license


#[cfg(test)]
mod test {
    use log::LevelFilter;
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use p256::ecdsa::{Signature, SigningKey};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::traits::PublicKeyParts;
    use rsa::{BigUint, Pss, RsaPrivateKey};
    use sboot_emulator_periph::{EfuseArgs, EmuEfuse, EmuFlash, SoftDigestEngine};
    use sboot_flash_image::{
        EcdsaSigBlock, IvDigest, RsaPublicKeyBlock, RsaSigBlock, RsaSignatureSector,
    };
    use sboot_rom::{
        BootFlow, DigestGenerator, ImageRegion, ImageVerifier, RawFuses, RngEntropy,
        RustCryptoSha256, RustCryptoVerifier, SbootResult, SecureBootConfig, SecureBootEnv,
        SecureBootFlow, SecureBootParams, VerifiedDigest,
    };
    use sha2::{Digest, Sha256};
    use simple_logger::SimpleLogger;
    use std::mem::size_of;
    use std::sync::Once;
    use tempfile::NamedTempFile;
    use zerocopy::{FromBytes, FromZeros, IntoBytes};

    pub const FLASH_SIZE: usize = 0x40000;
    pub const BOOTLOADER_LEN: u32 = 0x3456;
    pub const APP: ImageRegion = ImageRegion::new(0x10000, 0x1000);
    pub const SECTOR_SIZE: u32 = 0x1000;

    static LOGGER: Once = Once::new();

    pub fn init_logger() {
        LOGGER.call_once(|| {
            let _ = SimpleLogger::new().with_level(LevelFilter::Info).init();
        });
    }

    pub fn sha256(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn pattern(len: u32, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    /// An emulated device: flash, eFuses kept in a file, and the build config.
    pub struct Device {
        pub config: SecureBootConfig,
        pub flash: EmuFlash,
        pub efuse: EmuEfuse,
        pub app: ImageRegion,
        efuse_args: EfuseArgs,
        boots: u64,
        _efuse_file: NamedTempFile,
    }

    impl Device {
        pub fn new(config: SecureBootConfig) -> Self {
            Self::with_efuse_args(config, EfuseArgs::default())
        }

        pub fn with_efuse_args(config: SecureBootConfig, args: EfuseArgs) -> Self {
            init_logger();
            let efuse_file = NamedTempFile::new().unwrap();
            let efuse_args = EfuseArgs {
                file_name: Some(efuse_file.path().to_path_buf()),
                ..args
            };
            let flash = EmuFlash::new(FLASH_SIZE);
            flash.program(
                config.layout.bootloader_offset as usize,
                &pattern(BOOTLOADER_LEN, 0x17),
            );
            Self {
                config,
                flash,
                efuse: EmuEfuse::new(efuse_args.clone()).unwrap(),
                app: APP,
                efuse_args,
                boots: 0,
                _efuse_file: efuse_file,
            }
        }

        /// Programs an app of `len` bytes at the app address.
        pub fn program_app(&mut self, len: u32) -> Vec<u8> {
            self.app = ImageRegion::new(APP.start_addr, len);
            let image = pattern(len, 0x5a);
            self.flash.program(APP.start_addr as usize, &image);
            image
        }

        /// Drops the eFuse controller and opens it again from its backing file.
        pub fn power_cycle(&mut self) {
            self.efuse.save_to_file().unwrap();
            self.efuse = EmuEfuse::new(self.efuse_args.clone()).unwrap();
        }

        fn with_env<T>(
            &mut self,
            f: impl FnOnce(&mut SecureBootEnv, SecureBootParams) -> T,
        ) -> T {
            self.boots += 1;
            let mut sha = RustCryptoSha256::default();
            let mut env = SecureBootEnv::new(
                &self.config,
                &mut self.efuse,
                &self.flash,
                &mut sha,
                &RustCryptoVerifier,
            );
            let mut engine = SoftDigestEngine::default();
            let mut entropy = RngEntropy(StdRng::seed_from_u64(self.boots));
            let params = SecureBootParams {
                bootloader_len: BOOTLOADER_LEN,
                app: self.app,
                digest: Some(DigestGenerator::new(&mut engine, &mut entropy)),
            };
            f(&mut env, params)
        }

        pub fn boot(&mut self) -> SbootResult<VerifiedDigest> {
            self.with_env(|env, params| SecureBootFlow::run(env, params))
        }

        pub fn boot_or_halt(&mut self) -> VerifiedDigest {
            self.with_env(|env, params| SecureBootFlow::run_or_halt(env, params))
        }

        /// Checks the app signature the way a running app checks an update.
        pub fn verify_app(&mut self) -> SbootResult<VerifiedDigest> {
            let app = self.app;
            self.with_env(|env, _| env.verify_region(app.start_addr, app.image_len))
        }

        /// Repeats the check the ROM makes on the bootloader digest record.
        pub fn rom_accepts_bootloader(&self) -> bool {
            let record = self.flash.contents(0, size_of::<IvDigest>());
            let record = IvDigest::read_from_bytes(&record).unwrap();
            let key = SoftDigestEngine::expand_key(
                &self.efuse.key_block_raw(),
                self.efuse.coding_scheme(),
            );
            let bootloader = ImageRegion::new(self.config.layout.bootloader_offset, BOOTLOADER_LEN);
            let len = bootloader.digest_len().unwrap() as usize;
            let image = self.flash.contents(bootloader.start_addr as usize, len);
            SoftDigestEngine::bootloader_digest(&key, &record.iv, &image).unwrap() == record.digest
        }
    }

    pub fn ecdsa_key() -> SigningKey {
        SigningKey::from_slice(&[0x5c; 32]).unwrap()
    }

    pub fn ecdsa_public_key(key: &SigningKey) -> [u8; 64] {
        let point = key.verifying_key().to_encoded_point(false);
        point.as_bytes()[1..].try_into().unwrap()
    }

    /// Appends a version 1 ECDSA block over the region and returns the signed digest.
    pub fn ecdsa_sign_region(
        flash: &EmuFlash,
        key: &SigningKey,
        region: ImageRegion,
    ) -> [u8; 32] {
        let image = flash.contents(region.start_addr as usize, region.image_len as usize);
        let digest = sha256(&image);
        let signature: Signature = key.sign_prehash(&digest).unwrap();
        let block = EcdsaSigBlock::new(signature.to_bytes().as_slice().try_into().unwrap());
        flash.program(
            (region.start_addr + region.image_len) as usize,
            block.as_bytes(),
        );
        digest
    }

    pub fn rsa_key() -> RsaPrivateKey {
        RsaPrivateKey::from_pkcs8_pem(include_str!("../fixtures/rsa3072.pem")).unwrap()
    }

    /// The public key as laid out in a signature block, including the
    /// Montgomery parameters the ROM accelerator uses.
    pub fn rsa_key_block(key: &RsaPrivateKey) -> RsaPublicKeyBlock {
        let mut block = RsaPublicKeyBlock::new_zeroed();
        let n = key.n().to_bytes_le();
        block.n[..n.len()].copy_from_slice(&n);

        let mut e = [0u8; 4];
        let e_bytes = key.e().to_bytes_le();
        e[..e_bytes.len()].copy_from_slice(&e_bytes);
        block.e.set(u32::from_le_bytes(e));

        let r_squared = (BigUint::from(1u8) << (2 * 8 * block.n.len())) % key.n();
        let rinv = r_squared.to_bytes_le();
        block.rinv[..rinv.len()].copy_from_slice(&rinv);

        // -n^-1 mod 2^32 by Newton iteration on the low word.
        let n0 = u32::from_le_bytes([n[0], n[1], n[2], n[3]]);
        let mut inv = n0;
        for _ in 0..5 {
            inv = inv.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inv)));
        }
        block.mdash.set(inv.wrapping_neg());
        block
    }

    pub fn rsa_key_digest(key: &RsaPrivateKey) -> [u8; 32] {
        sha256(rsa_key_block(key).as_bytes())
    }

    pub fn signature_sector_addr(region: ImageRegion) -> usize {
        region.image_len.next_multiple_of(SECTOR_SIZE) as usize + region.start_addr as usize
    }

    /// Appends a signature sector over the region, padded to the next sector,
    /// and returns the signed digest.
    pub fn rsa_sign_region(
        flash: &EmuFlash,
        key: &RsaPrivateKey,
        region: ImageRegion,
    ) -> [u8; 32] {
        let sector_addr = signature_sector_addr(region);
        let start = region.start_addr as usize;
        let digest = sha256(&flash.contents(start, sector_addr - start));

        let mut rng = StdRng::seed_from_u64(0x5b);
        let mut signature = key
            .sign_with_rng(&mut rng, Pss::new::<Sha256>(), &digest)
            .unwrap();
        signature.reverse();

        let mut sector = RsaSignatureSector::new_zeroed();
        sector.as_mut_bytes()[size_of::<RsaSigBlock>()..].fill(0xff);
        let block = &mut sector.blocks[0];
        block.image_digest = digest;
        block.key = rsa_key_block(key);
        block.signature.copy_from_slice(&signature);
        block.seal();
        flash.program(sector_addr, sector.as_bytes());
        digest
    }

    pub fn read_signature_sector(flash: &EmuFlash, region: ImageRegion) -> RsaSignatureSector {
        let bytes = flash.contents(
            signature_sector_addr(region),
            size_of::<RsaSignatureSector>(),
        );
        RsaSignatureSector::read_from_bytes(&bytes).unwrap()
    }
}
