//! QSPI controller model
//!
//! Registers are plain storage except for the ones with side effects:
//!
//! - MANUAL_CONFIG: write and read triggers shift bytes to or from the flash,
//!   setting CSN_ACTIVE releases chip select. Trigger bits self-clear.
//! - MANUAL_RD_WR_DATA: reads pop the receive FIFO at the programmed hsize.
//! - QSPI_STATUS: synthesised. Shifts complete instantly, so BUSY never sets.
//! - AES keyholder load and lockbox handshake.
//!
//! Write phases go out MSB first unless the chip select's swap bit is set in
//! MANUAL_CONFIG_2, in which case the value is sent low byte first. Read
//! data is packed low byte first.

use std::collections::VecDeque;

use si91x_core::qspi::BusMode;
use si91x_core::regs::qspi::*;

use crate::flash::FlashModel;
use crate::lockbox;
use crate::trace::{Trace, Transaction};

/// Key the simulated keyholder hands out
pub const DEFAULT_KEYHOLDER_KEY: [u32; 8] = [
    0x2B7E_1516,
    0x28AE_D2A6,
    0xABF7_1588,
    0x09CF_4F3C,
    0x603D_EB10,
    0x15CA_71BE,
    0x2B73_AEF0,
    0x857D_7781,
];

/// Controller state shared by every simulator handle
pub struct Controller {
    pub(crate) regs: Vec<u32>,
    pub(crate) fifo: VecDeque<u8>,
    pub(crate) flash: FlashModel,
    pub(crate) trace: Trace,
    current: Option<Transaction>,
    pub(crate) keyholder: [u32; 8],
    /// Bytes a DMA-fed manual write still expects
    pub(crate) dma_write_pending: usize,
}

impl Controller {
    pub(crate) fn new(flash: FlashModel) -> Self {
        let mut regs = vec![0u32; QSPI_REG_SIZE / 4];
        regs[QSPI_MANUAL_CONFIG / 4] = MANUAL_CSN_ACTIVE;
        Self {
            regs,
            fifo: VecDeque::new(),
            flash,
            trace: Trace::default(),
            current: None,
            keyholder: DEFAULT_KEYHOLDER_KEY,
            dma_write_pending: 0,
        }
    }

    fn reg(&self, offset: usize) -> u32 {
        self.regs[offset / 4]
    }

    /// Bus width currently programmed for `cs`
    fn bus_mode(&self, cs: u8) -> BusMode {
        if cs == 0 {
            BusMode::from_code((self.reg(QSPI_BUS_MODE) & BUS_MODE_WIDTH) >> BUS_MODE_WIDTH_OFF)
        } else {
            let pos = MANUAL2_CS_WIDTH_OFF + (cs as u32 - 1) * 2;
            BusMode::from_code(self.reg(QSPI_MANUAL_CONFIG_2) >> pos)
        }
    }

    fn select(&mut self, cs: u8) -> &mut Transaction {
        self.current.get_or_insert_with(|| Transaction {
            cs,
            phases: Vec::new(),
        })
    }

    fn release(&mut self) {
        if let Some(transaction) = self.current.take() {
            self.flash.deselect();
            self.trace.push(transaction);
        }
    }

    /// Shift `bits` of `value` out to the flash
    pub(crate) fn shift_write(&mut self, cs: u8, bits: u32, value: u32) {
        let mode = self.bus_mode(cs);
        let swap = self.reg(QSPI_MANUAL_CONFIG_2) & (1 << (MANUAL2_SWAP_OFF + cs as u32)) != 0;
        self.select(cs).push_write(mode, bits, value);
        let bytes = (bits / 8) as usize;
        for i in 0..bytes {
            let shift = if swap { i * 8 } else { (bytes - 1 - i) * 8 };
            self.flash.shift_in((value >> shift) as u8);
        }
    }

    /// Bytes from a DMA-fed write
    pub(crate) fn shift_write_bytes(&mut self, data: &[u8]) {
        let cs = ((self.reg(QSPI_MANUAL_CONFIG) >> MANUAL_CSN_SELECT_OFF) & 0x3) as u8;
        for byte in data {
            self.shift_write(cs, 8, *byte as u32);
        }
        self.dma_write_pending = self.dma_write_pending.saturating_sub(data.len());
    }

    fn shift_read(&mut self, cs: u8, count: u32) {
        let mode = self.bus_mode(cs);
        for _ in 0..count {
            let byte = self.flash.shift_out();
            self.select(cs).push_read(mode, byte);
            self.fifo.push_back(byte);
        }
    }

    fn manual_config_write(&mut self, value: u32) {
        let cs = ((value >> MANUAL_CSN_SELECT_OFF) & 0x3) as u8;
        self.regs[QSPI_MANUAL_CONFIG / 4] = value & !(MANUAL_WRITE_TRIGGER | MANUAL_READ_TRIGGER);

        if value & MANUAL_WRITE_TRIGGER != 0 {
            let count = decode_read_count(value) as usize;
            if value & MANUAL_TAKE_LEN_FRM_REG != 0 && count != 0 {
                // Data follows through the write FIFO
                self.select(cs);
                self.dma_write_pending = count;
            } else {
                let bits = match self.reg(QSPI_MANUAL_WRITE_DATA_2) & 0x3F {
                    0 => 32,
                    n => n,
                };
                let data = self.reg(QSPI_MANUAL_RD_WR_DATA);
                self.shift_write(cs, bits, data);
            }
        }
        if value & MANUAL_READ_TRIGGER != 0 {
            self.shift_read(cs, decode_read_count(value));
        }
        if value & MANUAL_CSN_ACTIVE != 0 {
            self.release();
        }
    }

    fn pop_fifo(&mut self) -> u32 {
        let bytes = match (self.reg(QSPI_MANUAL_CONFIG) >> MANUAL_HSIZE_OFF) & 0x3 {
            0 => 1,
            1 => 2,
            _ => 4,
        };
        let mut word = [0u8; 4];
        for slot in word.iter_mut().take(bytes) {
            match self.fifo.pop_front() {
                Some(b) => *slot = b,
                None => {
                    log::warn!("controller: read FIFO underflow");
                    break;
                }
            }
        }
        u32::from_le_bytes(word)
    }

    fn status(&self) -> u32 {
        let mut status = Status::AUTO_MODE_FSM_IDLE;
        if self.fifo.is_empty() {
            status |= Status::FIFO_EMPTY_RFIFO;
        }
        if self.reg(QSPI_BUS_MODE) & BusModeFlags::AUTO_MODE.bits() != 0 {
            status |= Status::AUTO_MODE | Status::AUTO_MODE_ENABLED;
        }
        if self.reg(QSPI_MANUAL_CONFIG) & MANUAL_HW_CTRL_MODE != 0 {
            status |= Status::HW_CTRLD_MODE;
        }
        status.bits()
    }

    pub(crate) fn read32(&mut self, offset: usize) -> u32 {
        match offset {
            QSPI_STATUS => self.status(),
            QSPI_MANUAL_RD_WR_DATA => self.pop_fifo(),
            QSPI_LB_STATUS => self.reg(offset) | LB_STATUS_DIN_READY,
            _ => self.reg(offset),
        }
    }

    pub(crate) fn write32(&mut self, offset: usize, value: u32) {
        match offset {
            QSPI_MANUAL_CONFIG => self.manual_config_write(value),
            QSPI_STATUS => {}
            QSPI_AES_SEC_KEY_FRM_KH => {
                // Keyholder transfer completes immediately
                if value & LOAD_SEC_KEY_FRM_KH != 0 {
                    log::trace!("controller: keyholder key loaded");
                }
                self.regs[offset / 4] = value & !LOAD_SEC_KEY_FRM_KH;
            }
            QSPI_LB_STATUS => {
                let mut stored = value & !(LB_STATUS_FW_READY | LB_STATUS_DIN_READY);
                if value & LB_STATUS_FW_READY != 0 {
                    let keyholder = self.keyholder;
                    if lockbox::process_block(&mut self.regs, &keyholder) {
                        stored |= LB_STATUS_DOUT_VALID;
                    }
                }
                self.regs[offset / 4] = stored;
            }
            _ => {
                // New lockbox input invalidates the previous output
                if lockbox::LANES.contains(&offset) {
                    self.regs[QSPI_LB_STATUS / 4] &= !LB_STATUS_DOUT_VALID;
                }
                self.regs[offset / 4] = value;
            }
        }
    }

    /// Serve a read of the auto-mode window
    pub(crate) fn window_read(&self, addr: u32, buf: &mut [u8]) {
        let (base, cs) = if addr >= QSPI_AUTOM_CHIP1_ADDRESS {
            (QSPI_AUTOM_CHIP1_ADDRESS, 1)
        } else {
            (QSPI_AUTOM_CHIP0_ADDRESS, 0)
        };
        if self.reg(QSPI_BUS_MODE) & BusModeFlags::AUTO_MODE.bits() == 0 {
            log::debug!("controller: window read on cs{} with auto mode off", cs);
        }
        let offset = addr.wrapping_sub(base);
        let data = self.flash.data();
        let size = data.len();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = data[(offset as usize + i) & (size - 1)];
        }
        lockbox::inline_decrypt(&self.regs, &self.keyholder, offset, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::SimFlashConfig;

    fn controller() -> Controller {
        Controller::new(FlashModel::new(SimFlashConfig::default()).unwrap())
    }

    fn phase(c: &mut Controller, bits: u32, value: u32) {
        c.write32(QSPI_MANUAL_WRITE_DATA_2, bits & 0x1F);
        c.write32(QSPI_MANUAL_RD_WR_DATA, value);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_WRITE_TRIGGER);
    }

    #[test]
    fn test_write_phases_build_transaction() {
        let mut c = controller();
        phase(&mut c, 8, 0x06);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        phase(&mut c, 8, 0x20);
        phase(&mut c, 24, 0x001000);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        // releasing an idle bus does nothing
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);

        let trace = c.trace.transactions();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].writes(), [0x20, 0x001000]);
        assert_eq!(c.reg(QSPI_MANUAL_CONFIG) & MANUAL_WRITE_TRIGGER, 0);
    }

    #[test]
    fn test_read_trigger_fills_fifo() {
        let mut c = controller();
        phase(&mut c, 8, 0x9F);
        c.write32(
            QSPI_MANUAL_CONFIG,
            MANUAL_READ_TRIGGER | manual_read_count(3) | (3 << MANUAL_HSIZE_OFF),
        );
        assert_eq!(c.read32(QSPI_STATUS) & Status::FIFO_EMPTY_RFIFO.bits(), 0);
        assert_eq!(c.read32(QSPI_MANUAL_RD_WR_DATA), 0x0016_20C2);
        assert_ne!(c.read32(QSPI_STATUS) & Status::FIFO_EMPTY_RFIFO.bits(), 0);
    }

    #[test]
    fn test_status_mirrors_modes() {
        let mut c = controller();
        c.write32(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_HW_CTRL_MODE);
        let status = Status::from_bits_retain(c.read32(QSPI_STATUS));
        assert!(status.contains(Status::AUTO_MODE_ENABLED | Status::HW_CTRLD_MODE));
        assert!(!status.contains(Status::BUSY));
    }

    #[test]
    fn test_swap_sends_low_byte_first() {
        let mut c = controller();
        c.write32(QSPI_MANUAL_CONFIG_2, 1 << MANUAL2_SWAP_OFF);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        phase(&mut c, 8, 0x06);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        phase(&mut c, 8, 0x02);
        phase(&mut c, 24, 0x000010);
        phase(&mut c, 32, 0x4433_2211);
        c.write32(QSPI_MANUAL_CONFIG, MANUAL_CSN_ACTIVE);
        // swapped address lands at 0x100000 & mask
        let at = 0x10_0000 & (c.flash.data().len() - 1);
        assert_eq!(&c.flash.data()[at..at + 4], &[0x11, 0x22, 0x33, 0x44]);
    }
}
