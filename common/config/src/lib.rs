// Licensed under the Apache-2.0 license

#![cfg_attr(not(feature = "std"), no_std)]

/// Secure boot scheme generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum SecureBootVersion {
    /// Symmetric bootloader digest checked by ROM, ECDSA P-256 signed apps.
    V1 = 1,
    /// Fused RSA-3072 key digest, RSA-PSS signed bootloader and apps.
    V2 = 2,
}

/// Where the code calling into the secure boot library is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum ExecContext {
    Bootloader,
    Application,
}

/// Fixed flash locations used by secure boot.
/// These are the defaults that can be overridden and provided to the bootloader build.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, deny_unknown_fields))]
pub struct FlashLayout {
    /// Offset of the 128 byte IV + 64 byte digest record read by ROM.
    pub iv_digest_offset: u32,
    /// Offset of the second stage bootloader image.
    pub bootloader_offset: u32,
    /// Erase sector size. V2 signature sectors are aligned to it.
    pub sector_size: u32,
}

impl Default for FlashLayout {
    fn default() -> Self {
        FlashLayout {
            iv_digest_offset: 0x0,
            bootloader_offset: 0x1000,
            sector_size: 0x1000,
        }
    }
}

impl FlashLayout {
    #[cfg(feature = "std")]
    pub fn hash_map(&self) -> std::collections::HashMap<String, String> {
        let mut map = std::collections::HashMap::new();
        map.insert(
            "IV_DIGEST_OFFSET".to_string(),
            format!("0x{:x}", self.iv_digest_offset),
        );
        map.insert(
            "BOOTLOADER_OFFSET".to_string(),
            format!("0x{:x}", self.bootloader_offset),
        );
        map.insert(
            "SECTOR_SIZE".to_string(),
            format!("0x{:x}", self.sector_size),
        );
        map
    }
}

/// Build-time secure boot settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, deny_unknown_fields))]
pub struct SecureBootConfig {
    /// Scheme the bootloader enables on first boot.
    pub version: SecureBootVersion,
    pub context: ExecContext,
    /// Leave the JTAG disable fuse alone when enabling.
    pub allow_jtag: bool,
    /// Leave the ROM BASIC console disable fuse alone when enabling.
    pub allow_rom_basic: bool,
    /// Scheme used to check app signatures while no scheme is fused yet.
    pub signed_apps_scheme: Option<SecureBootVersion>,
    /// Uncompressed P-256 point (`x || y`) trusted for V1 app signatures.
    #[cfg_attr(feature = "std", serde(deserialize_with = "de::public_key"))]
    pub ecdsa_public_key: Option<[u8; 64]>,
    pub layout: FlashLayout,
}

impl Default for SecureBootConfig {
    fn default() -> Self {
        SecureBootConfig {
            version: SecureBootVersion::V2,
            context: ExecContext::Bootloader,
            allow_jtag: false,
            allow_rom_basic: false,
            signed_apps_scheme: None,
            ecdsa_public_key: None,
            layout: FlashLayout::default(),
        }
    }
}

#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid secure boot config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(feature = "std")]
impl SecureBootConfig {
    /// Parses a TOML override file. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(feature = "std")]
mod de {
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn public_key<'de, D>(deserializer: D) -> Result<Option<[u8; 64]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = hex::decode(s.trim()).map_err(D::Error::custom)?;
        let key: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"64 bytes"))?;
        Ok(Some(key))
    }
}
