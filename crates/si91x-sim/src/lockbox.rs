//! AES unit model
//!
//! Real AES is not reproduced. Each 16-byte block is XORed with a keystream
//! block derived from SHA-256 over the mode, the active keys and the block's
//! flash address. That keeps the register protocol observable (key
//! placement, valid bits, IV stepping) and makes encrypt and decrypt
//! inverse operations, which is all the driver can tell apart.

use sha2::{Digest, Sha256};

use si91x_core::regs::qspi::*;

/// Key material the controller would see for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyState {
    pub xts: bool,
    pub key1: [u32; 8],
    pub key2: [u32; 8],
}

impl KeyState {
    /// Collect keys from the register block
    pub fn from_regs(regs: &[u32], keyholder: &[u32; 8]) -> Self {
        let word = |off: usize| regs[off / 4];
        let config = word(QSPI_AES_CONFIG);
        let wide = config & AesConfig::KEY_SIZE_256.bits() != 0;
        let xts = config & AesConfig::XTS_MODE.bits() != 0;
        let use_kh = word(OCTA_SPI_BUS_CONTROLLER2) & CTRL2_EN_KH_KEY != 0;

        let words = if wide { 8 } else { 4 };
        let mut key1 = [0u32; 8];
        let mut key2 = [0u32; 8];
        for i in 0..words {
            if use_kh {
                key1[i] = keyholder[i];
                key2[i] = keyholder[7 - i];
            } else {
                key1[i] = word(QSPI_AES_KEY1_0_3 + 4 * (7 - i));
                key2[i] = word(QSPI_AES_KEY2_0_3 + 4 * (7 - i));
            }
        }
        if !xts {
            key2 = [0; 8];
        }
        Self { xts, key1, key2 }
    }

    /// Keystream block for the block at flash address `iv`
    pub fn keystream(&self, iv: u32) -> [u8; 16] {
        let mut hasher = Sha256::new();
        hasher.update(if self.xts { b"xts" } else { b"ctr" });
        for w in self.key1.iter().chain(self.key2.iter()) {
            hasher.update(w.to_le_bytes());
        }
        hasher.update((iv & !0xF).to_le_bytes());
        let digest = hasher.finalize();
        let mut block = [0u8; 16];
        block.copy_from_slice(&digest[..16]);
        block
    }
}

/// Lockbox lane registers in block word order
pub(crate) const LANES: [usize; 4] = [
    QSPI_AES_LB_DATA_C_F,
    QSPI_AES_LB_DATA_8_B,
    QSPI_AES_LB_DATA_4_7,
    QSPI_AES_LB_DATA_0_3,
];

/// Run one standalone block in place on the register array
///
/// Returns false when the unit is not in standalone mode.
pub(crate) fn process_block(regs: &mut [u32], keyholder: &[u32; 8]) -> bool {
    let config = regs[QSPI_AES_CONFIG / 4];
    if config & AesConfig::EN_STANDALONE_AES.bits() == 0 {
        log::warn!("lockbox: block submitted without standalone mode");
        return false;
    }
    let keys = KeyState::from_regs(regs, keyholder);
    let iv = regs[QSPI_AES_IV1_0_3 / 4];
    let stream = keys.keystream(iv);
    for (i, lane) in LANES.iter().enumerate() {
        let ks = u32::from_le_bytes([
            stream[i * 4],
            stream[i * 4 + 1],
            stream[i * 4 + 2],
            stream[i * 4 + 3],
        ]);
        regs[lane / 4] ^= ks;
    }
    log::trace!("lockbox: block at iv {:#x}", iv);
    true
}

/// Apply inline decryption to bytes read from flash at `flash_addr`
pub(crate) fn inline_decrypt(regs: &[u32], keyholder: &[u32; 8], flash_addr: u32, buf: &mut [u8]) {
    let ctrl2 = regs[OCTA_SPI_BUS_CONTROLLER2 / 4];
    if ctrl2 & CTRL2_EN_SECURITY == 0 {
        return;
    }
    let keys = KeyState::from_regs(regs, keyholder);
    for (i, byte) in buf.iter_mut().enumerate() {
        let addr = flash_addr.wrapping_add(i as u32);
        let covered = (0..4u32).any(|seg| {
            let enabled = ctrl2 & (1 << (CTRL2_EN_SEG_SEC_OFF + seg)) != 0;
            let start = regs[(QSPI_AES_SEC_SEG_ADDR + seg as usize * 8) / 4];
            let end = regs[(QSPI_AES_SEC_SEG_ADDR + seg as usize * 8 + 4) / 4];
            enabled && (start..end).contains(&addr)
        });
        if covered {
            *byte ^= keys.keystream(addr)[(addr & 0xF) as usize];
        }
    }
}
