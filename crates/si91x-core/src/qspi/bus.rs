//! Bus-mode controller and flash command transactor
//!
//! Every byte the controller shifts out in manual mode goes through
//! [`Qspi::write_phase`]: load the length and value, fire the write trigger,
//! wait for the shifter to go idle. The bus width used for that phase is
//! whatever [`Qspi::set_bus_mode`] last programmed for the chip select.

use super::config::{BusMode, ChipSelect, FlashConfig};
use super::Qspi;
use crate::dma::Hsize;
use crate::error::Result;
use crate::regs::qspi::*;

impl Qspi<'_> {
    /// Program the manual-mode bus width for `cs`
    ///
    /// Also clears the manual read count, so a stale count never leaks into
    /// the next phase.
    pub fn set_bus_mode(&mut self, cs: ChipSelect, mode: BusMode) {
        self.regs.clear_bits(QSPI_MANUAL_CONFIG, MANUAL_BUS_SWITCH_CLEAR);
        match cs {
            ChipSelect::Cs0 => {
                self.regs.update32(
                    QSPI_BUS_MODE,
                    BUS_MODE_WIDTH,
                    mode.code() << BUS_MODE_WIDTH_OFF,
                );
            }
            _ => {
                let pos = MANUAL2_CS_WIDTH_OFF + (cs.index() as u32 - 1) * 2;
                self.regs
                    .update32(QSPI_MANUAL_CONFIG_2, 0x3 << pos, mode.code() << pos);
            }
        }
        log::trace!("bus mode {:?} on {:?}", mode, cs);
    }

    /// Manual-mode bus width currently programmed for `cs`
    pub fn bus_mode(&mut self, cs: ChipSelect) -> BusMode {
        match cs {
            ChipSelect::Cs0 => BusMode::from_code(
                (self.regs.read32(QSPI_BUS_MODE) & BUS_MODE_WIDTH) >> BUS_MODE_WIDTH_OFF,
            ),
            _ => {
                let pos = MANUAL2_CS_WIDTH_OFF + (cs.index() as u32 - 1) * 2;
                BusMode::from_code(self.regs.read32(QSPI_MANUAL_CONFIG_2) >> pos)
            }
        }
    }

    /// Shift `bits` bits of `value` out on `cs`
    ///
    /// `bits` is 8, 16, 24 or 32; the hardware encodes 32 as zero. Blocks
    /// until the shifter reports idle.
    pub fn write_phase(&mut self, bits: u32, value: u32, cs: ChipSelect) -> Result<()> {
        let len = if bits >= 32 { 0 } else { bits };
        self.regs.write32(QSPI_MANUAL_WRITE_DATA_2, len);
        self.regs.write32(QSPI_MANUAL_RD_WR_DATA, value);
        let manual = self.regs.read32(QSPI_MANUAL_CONFIG);
        self.regs.write32(
            QSPI_MANUAL_CONFIG,
            (manual & !MANUAL_WRITE_CLEAR)
                | MANUAL_WRITE_TRIGGER
                | ((cs.index() as u32) << MANUAL_CSN_SELECT_OFF),
        );
        self.wait_clear(QSPI_STATUS, Status::BUSY.bits())?;
        Ok(())
    }

    /// End the current transaction by releasing chip select
    pub fn deassert_csn(&mut self) {
        self.regs
            .update32(QSPI_MANUAL_CONFIG, MANUAL_DEASSERT_CLEAR, MANUAL_CSN_ACTIVE);
    }

    /// Start a manual read of `count` units of `hsize` on `cs`
    pub(crate) fn read_trigger(&mut self, count: u32, cs: ChipSelect, hsize: Hsize) {
        self.regs.update32(
            QSPI_MANUAL_CONFIG,
            MANUAL_READ_CLEAR,
            MANUAL_READ_TRIGGER
                | ((cs.index() as u32) << MANUAL_CSN_SELECT_OFF)
                | manual_read_count(count)
                | (hsize.code() << MANUAL_HSIZE_OFF),
        );
    }

    /// Wait for read data and pop one `hsize` unit from the FIFO
    pub(crate) fn pop_fifo(&mut self, hsize: Hsize) -> Result<u32> {
        self.wait_clear(QSPI_STATUS, Status::FIFO_EMPTY_RFIFO.bits())?;
        let word = self.regs.read32(QSPI_MANUAL_RD_WR_DATA);
        Ok(match hsize {
            Hsize::Byte => word & 0xFF,
            Hsize::HalfWord => word & 0xFFFF,
            Hsize::Word => word,
        })
    }

    /// Route transactions to both flashes of a dual-flash pair, or only the
    /// primary one. No-op unless dual-flash mode is configured.
    pub(crate) fn dual_both(&mut self, config: &FlashConfig, both: bool) {
        if !config.dual_flash_mode {
            return;
        }
        if both {
            self.regs
                .set_bits(OCTA_SPI_BUS_CONTROLLER2, CTRL2_DUAL_FLASH_BOTH);
        } else {
            self.regs
                .clear_bits(OCTA_SPI_BUS_CONTROLLER2, CTRL2_DUAL_FLASH_BOTH);
        }
    }

    /// Leave auto mode if it is on, returning whether it was
    pub(crate) fn suspend_auto(&mut self) -> Result<bool> {
        if self.regs.read32(QSPI_BUS_MODE) & BusModeFlags::AUTO_MODE.bits() == 0 {
            return Ok(false);
        }
        self.regs
            .clear_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
        self.wait_clear(QSPI_STATUS, Status::AUTO_MODE_ENABLED.bits())?;
        log::trace!("auto mode suspended");
        Ok(true)
    }

    /// Re-enter auto mode if [`suspend_auto`](Self::suspend_auto) left it
    pub(crate) fn resume_auto(&mut self, was_on: bool) -> Result<()> {
        if was_on {
            self.regs.set_bits(QSPI_BUS_MODE, BusModeFlags::AUTO_MODE.bits());
            self.wait_set(QSPI_STATUS, Status::AUTO_MODE_ENABLED.bits())?;
            log::trace!("auto mode resumed");
        }
        Ok(())
    }

    /// Hand the clock to hardware control or take it back
    pub(crate) fn set_hw_ctrl(&mut self, on: bool) -> Result<()> {
        if on {
            self.regs.set_bits(QSPI_MANUAL_CONFIG, MANUAL_HW_CTRL_MODE);
            self.wait_set(QSPI_STATUS, Status::HW_CTRLD_MODE.bits())?;
        } else {
            self.regs.clear_bits(QSPI_MANUAL_CONFIG, MANUAL_HW_CTRL_MODE);
            self.wait_clear(QSPI_STATUS, Status::HW_CTRLD_MODE.bits())?;
        }
        Ok(())
    }

    /// Pause continue-fetch for the duration of a manual sequence
    pub(crate) fn continue_fetch(&mut self, config: &FlashConfig, on: bool) {
        if !config.continue_fetch_en {
            return;
        }
        if on {
            self.regs
                .set_bits(QSPI_AUTO_CONTINUE_FETCH_CTRL, CONTINUE_FETCH_EN);
        } else {
            self.regs
                .clear_bits(QSPI_AUTO_CONTINUE_FETCH_CTRL, CONTINUE_FETCH_EN);
        }
    }
}
