//! eFUSE macro model
//!
//! A bit burns on the rising edge of the strobe while the direct path is
//! enabled and both active-low lines (chip select, program enable) are
//! driven low. Anything else on the strobe is recorded as a misordered
//! program attempt.

use si91x_core::regs::efuse::*;

/// Number of rows
pub const ROWS: usize = ADDRESS_MAX as usize + 1;

/// eFUSE controller and array
pub struct EfuseModel {
    regs: Vec<u32>,
    fuses: [u8; ROWS],
    /// Control lines currently driven high
    lines: u32,
    misordered: usize,
}

impl Default for EfuseModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EfuseModel {
    /// Unprogrammed array
    pub fn new() -> Self {
        Self {
            regs: vec![0; EFUSE_REG_SIZE / 4],
            fuses: [0; ROWS],
            lines: DA_PGENB | DA_CSB,
            misordered: 0,
        }
    }

    /// Array contents
    pub fn fuses(&self) -> &[u8; ROWS] {
        &self.fuses
    }

    /// Strobes that did not follow the program sequence
    pub fn misordered(&self) -> usize {
        self.misordered
    }

    fn strobe(&mut self) {
        let direct = self.regs[EFUSE_CTRL / 4] & CTRL_DIRECT_PATH_ENABLE != 0;
        if !direct || self.lines & (DA_PGENB | DA_CSB) != 0 {
            log::warn!("efuse: strobe outside the program sequence");
            self.misordered += 1;
            return;
        }
        let addr = self.regs[EFUSE_DA_ADDR / 4];
        let row = (addr >> 3) as usize;
        if row < ROWS {
            self.fuses[row] |= 1 << (addr & 0x7);
            log::debug!("efuse: burned row {:#04x} bit {}", row, addr & 0x7);
        }
    }

    pub(crate) fn read32(&mut self, offset: usize) -> u32 {
        if offset >= EFUSE_MEM_MAP_WINDOW {
            let base = offset - EFUSE_MEM_MAP_WINDOW;
            let mut word = [0u8; 4];
            for (i, b) in word.iter_mut().enumerate() {
                *b = self.fuses.get(base + i).copied().unwrap_or(0);
            }
            return u32::from_le_bytes(word);
        }
        match offset {
            EFUSE_STATUS => self.regs[offset / 4] & !STATUS_BUSY,
            _ => self.regs[offset / 4],
        }
    }

    pub(crate) fn write32(&mut self, offset: usize, value: u32) {
        match offset {
            EFUSE_DA_CTRL_SET => {
                let rising = value & !self.lines;
                self.lines |= value;
                if rising & DA_STROBE != 0 {
                    self.strobe();
                }
            }
            EFUSE_DA_CTRL_CLEAR => self.lines &= !value,
            EFUSE_DA_CLR_STROBE => self.lines &= !(value & DA_STROBE),
            EFUSE_READ_ADDR if value & READ_ADDR_DO_FSM_READ != 0 => {
                let row = (value & 0x3F) as usize;
                self.regs[EFUSE_READ_DATA / 4] = self.fuses.get(row).copied().unwrap_or(0) as u32;
                self.regs[EFUSE_STATUS / 4] |= STATUS_FSM_DONE;
                self.regs[offset / 4] = value & !READ_ADDR_DO_FSM_READ;
            }
            _ if offset < EFUSE_MEM_MAP_WINDOW => self.regs[offset / 4] = value,
            _ => {}
        }
    }
}
