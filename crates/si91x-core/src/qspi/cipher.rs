//! Inline AES unit
//!
//! The controller decrypts auto-mode reads on the fly once a key is loaded
//! and a secure segment is enabled ([`Qspi::load_key`],
//! [`Qspi::seg_sec_en`]). The same engine can also be driven block by block
//! through the lockbox registers ([`Qspi::aes_encrypt_decrypt_standalone`]),
//! which is how images are encrypted before they are written.

use super::Qspi;
use crate::error::{Error, Result};
use crate::regs::qspi::*;

/// AES block size in bytes
pub const AES_BLOCK: usize = 16;
/// Number of secure segments
pub const SECURE_SEGMENTS: u8 = 4;

/// Cipher mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AesMode {
    /// Counter mode
    Ctr,
    /// XEX tweakable block cipher with ciphertext stealing
    Xts,
}

impl AesMode {
    fn config(self) -> AesConfig {
        match self {
            Self::Ctr => AesConfig::CTR_MODE,
            Self::Xts => AesConfig::XTS_MODE,
        }
    }
}

/// Direction of a standalone operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AesDirection {
    /// Plaintext in, ciphertext out
    #[default]
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}

/// Key length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeyLen {
    /// 128-bit keys
    #[default]
    K128,
    /// 256-bit keys
    K256,
}

impl KeyLen {
    /// Key length in 32-bit words
    pub const fn words(self) -> usize {
        match self {
            Self::K128 => 4,
            Self::K256 => 8,
        }
    }
}

/// Where the key material comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeySource {
    /// Fetched by hardware from the keyholder; firmware never sees it
    Keyholder,
    /// Written through the key registers
    Supplied {
        /// Data key; only the first four words are used for 128-bit keys
        key1: [u32; 8],
        /// Tweak key, required for XTS
        key2: Option<[u32; 8]>,
    },
}

/// Key length plus key source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CipherKey {
    /// Key length, also applied to keyholder keys
    pub len: KeyLen,
    /// Key material
    pub source: KeySource,
}

impl CipherKey {
    /// Key supplied through registers
    pub fn supplied(len: KeyLen, key1: [u32; 8], key2: Option<[u32; 8]>) -> Self {
        Self {
            len,
            source: KeySource::Supplied { key1, key2 },
        }
    }

    /// Reject a supplied XTS key without its tweak half
    fn validate(&self, mode: AesMode) -> Result<()> {
        match self.source {
            KeySource::Supplied { key2: None, .. } if mode == AesMode::Xts => {
                Err(Error::InvalidParameters)
            }
            _ => Ok(()),
        }
    }
}

/// Standalone (lockbox) cipher request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandaloneAes {
    /// Mode
    pub mode: AesMode,
    /// Direction
    pub direction: AesDirection,
    /// Key
    pub key: CipherKey,
    /// Flash byte address of the first block; advances by 16 per block
    pub iv: u32,
    /// Flip 32-bit endianness of the lockbox data
    pub flip_data: bool,
}

/// Word `i` of a key lives at `base + 4 * (7 - i)`
fn key_reg(base: usize, word: usize) -> usize {
    base + 4 * (7 - word)
}

impl Qspi<'_> {
    /// Write key words and set the matching valid bits
    ///
    /// Returns the AES_KEY_IV_VALID value written.
    fn program_key(&mut self, mode: AesMode, key: &CipherKey, kh_bits: u32) -> Result<u32> {
        let wide = key.len == KeyLen::K256;
        match key.source {
            KeySource::Keyholder => {
                self.regs
                    .set_bits(QSPI_AES_SEC_KEY_FRM_KH, LOAD_SEC_KEY_FRM_KH);
                self.wait_clear(QSPI_AES_SEC_KEY_FRM_KH, LOAD_SEC_KEY_FRM_KH)?;
                self.regs.set_bits(OCTA_SPI_BUS_CONTROLLER2, kh_bits);
            }
            KeySource::Supplied { key1, key2 } => {
                for (i, word) in key1.iter().take(key.len.words()).enumerate() {
                    self.regs.write32(key_reg(QSPI_AES_KEY1_0_3, i), *word);
                }
                if mode == AesMode::Xts {
                    let key2 = key2.ok_or(Error::InvalidParameters)?;
                    for (i, word) in key2.iter().take(key.len.words()).enumerate() {
                        self.regs.write32(key_reg(QSPI_AES_KEY2_0_3, i), *word);
                    }
                }
            }
        }

        let mut valid = LB_IV_VALID | if wide { KEY1_VALID_256 } else { KEY1_VALID_128 };
        self.regs.write32(QSPI_AES_KEY_IV_VALID, valid);
        if mode == AesMode::Xts {
            valid |= if wide { KEY2_VALID_256 } else { KEY2_VALID_128 };
            self.regs.write32(QSPI_AES_KEY_IV_VALID, valid);
        }
        Ok(valid)
    }

    /// Load the inline decryption key and enable security
    pub fn load_key(&mut self, mode: AesMode, key: &CipherKey) -> Result<()> {
        key.validate(mode)?;
        log::debug!("loading {:?} {:?} key from {:?}", mode, key.len, key.source_kind());

        let mut config = mode.config() | AesConfig::KEY_FLIP_FOR_REG_INTF | AesConfig::KEY_FLIP_FOR_KH_INTF;
        if key.len == KeyLen::K256 {
            config |= AesConfig::KEY_SIZE_256;
        }
        self.regs.write32(QSPI_AES_CONFIG, config.bits());

        let kh_bits = CTRL2_EN_KH_KEY | CTRL2_EN_SECURITY;
        self.program_key(mode, key, kh_bits)?;
        if matches!(key.source, KeySource::Supplied { .. }) {
            self.regs
                .set_bits(OCTA_SPI_BUS_CONTROLLER2, CTRL2_EN_SECURITY);
        }
        if mode == AesMode::Xts {
            self.regs
                .set_bits(QSPI_AES_CONFIG, AesConfig::DECRYPT_KEY_CAL.bits());
        }
        Ok(())
    }

    /// Enable inline decryption for `start..end` as secure segment `segment`
    pub fn seg_sec_en(&mut self, segment: u8, start: u32, end: u32) -> Result<()> {
        if segment >= SECURE_SEGMENTS {
            return Err(Error::InvalidParameters);
        }
        self.regs.set_bits(
            OCTA_SPI_BUS_CONTROLLER2,
            (1 << segment) << CTRL2_EN_SEG_SEC_OFF,
        );
        let pair = QSPI_AES_SEC_SEG_ADDR + segment as usize * 8;
        self.regs.write32(pair, start);
        self.regs.write32(pair + 4, end);
        log::debug!("secure segment {}: {:#010x}..{:#010x}", segment, start, end);
        Ok(())
    }

    /// Run `input` through the AES engine block by block
    ///
    /// `input.len()` must be a non-zero multiple of 16 and `output` at least
    /// as long; nothing is touched otherwise. AES_CONFIG is restored
    /// afterwards so inline decryption keeps working.
    pub fn aes_encrypt_decrypt_standalone(
        &mut self,
        ctx: &StandaloneAes,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<()> {
        if input.is_empty() || input.len() % AES_BLOCK != 0 || output.len() < input.len() {
            return Err(Error::InvalidParameters);
        }
        ctx.key.validate(ctx.mode)?;

        let decrypt = ctx.direction == AesDirection::Decrypt;
        let saved = self.regs.read32(QSPI_AES_CONFIG);

        let mut config = ctx.mode.config()
            | AesConfig::KEY_FLIP_FOR_REG_INTF
            | AesConfig::KEY_FLIP_FOR_KH_INTF
            | AesConfig::EN_STANDALONE_AES;
        if decrypt {
            config |= AesConfig::DECRYPT;
        }
        if ctx.flip_data {
            config |= AesConfig::FLIP_IN_LB;
        }
        if ctx.key.len == KeyLen::K256 {
            config |= AesConfig::KEY_SIZE_256;
        }
        if ctx.mode == AesMode::Xts && decrypt {
            config |= AesConfig::DECRYPT_KEY_CAL;
        }
        self.regs.write32(QSPI_AES_CONFIG, config.bits());

        self.program_key(ctx.mode, &ctx.key, CTRL2_EN_KH_KEY)?;
        if ctx.mode == AesMode::Xts && decrypt {
            // The decrypt key schedule is computed once, not per block
            self.regs.write32(QSPI_AES_KEY_IV_VALID, LB_IV_VALID);
        }

        let blocks = input.len() / AES_BLOCK;
        log::debug!(
            "standalone {:?} {:?}: {} blocks from iv {:#x}",
            ctx.mode,
            ctx.direction,
            blocks,
            ctx.iv
        );

        let lanes = [
            QSPI_AES_LB_DATA_C_F,
            QSPI_AES_LB_DATA_8_B,
            QSPI_AES_LB_DATA_4_7,
            QSPI_AES_LB_DATA_0_3,
        ];
        let mut iv = ctx.iv;
        for (src, dst) in input
            .chunks_exact(AES_BLOCK)
            .zip(output.chunks_exact_mut(AES_BLOCK))
        {
            self.regs.write32(QSPI_AES_IV1_0_3, iv);
            self.wait_set(QSPI_LB_STATUS, LB_STATUS_DIN_READY)?;
            for (reg, word) in lanes.iter().zip(src.chunks_exact(4)) {
                let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                self.regs.write32(*reg, value);
            }

            self.regs
                .clear_bits(QSPI_AES_CONFIG, AesConfig::DECRYPT_KEY_CAL.bits());
            self.regs.set_bits(QSPI_LB_STATUS, LB_STATUS_FW_READY);
            self.wait_set(QSPI_LB_STATUS, LB_STATUS_DOUT_VALID)?;

            for (reg, word) in lanes.iter().zip(dst.chunks_exact_mut(4)) {
                word.copy_from_slice(&self.regs.read32(*reg).to_le_bytes());
            }
            iv = iv.wrapping_add(AES_BLOCK as u32);
        }

        self.regs.write32(QSPI_AES_CONFIG, saved);
        Ok(())
    }
}

impl CipherKey {
    fn source_kind(&self) -> &'static str {
        match self.source {
            KeySource::Keyholder => "keyholder",
            KeySource::Supplied { .. } => "registers",
        }
    }
}
