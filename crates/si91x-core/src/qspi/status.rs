//! Flash status polling and register writes

use super::config::{BusMode, ChipSelect, FlashConfig, FlashType};
use super::opcodes::*;
use super::Qspi;
use crate::dma::Hsize;
use crate::error::{Error, Result};
use crate::poll::PollBudget;
use crate::regs::qspi::QSPI_MANUAL_RD_WR_DATA;

/// Width of the value sent by [`Qspi::status_reg_write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusWidth {
    /// 16 bits for Winbond and GigaDevice parts, 8 bits otherwise
    #[default]
    Auto,
    /// Two status registers in one write
    Bits16,
    /// Three status registers in one write
    Bits24,
}

/// Options for a status register write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusWrite {
    /// Data width
    pub width: StatusWidth,
    /// Write the non-volatile copy (skips the SST/GigaDevice EWSR path)
    pub non_volatile: bool,
}

impl StatusWrite {
    /// 16-bit write
    pub const BITS16: Self = Self {
        width: StatusWidth::Bits16,
        non_volatile: false,
    };
}

impl Qspi<'_> {
    /// Length and value of a configured 8/16-bit command on the current bus
    fn command_phase(&self, config: &FlashConfig, cmd: u16, bus: BusMode) -> (u32, u32) {
        if config.uses_16bit_cmd() {
            if bus == BusMode::Octa {
                (16, cmd as u32)
            } else {
                (8, (cmd >> 8) as u32)
            }
        } else {
            (8, cmd as u32 & 0xFF)
        }
    }

    /// Poll the flash status register until the busy bit clears
    ///
    /// Returns the last status value read. The bus width of the chip select
    /// is the same on return as on entry. A `busy_bit_pos` past the status
    /// width is rejected with [`Error::InvalidParameters`] before any
    /// register access.
    pub fn wait_flash_idle(&mut self, config: &FlashConfig) -> Result<u32> {
        // Dual flash reads one status byte from each part
        let limit = if config.dual_flash_mode { 8 } else { 32 };
        if config.busy_bit_pos >= limit {
            return Err(Error::InvalidParameters);
        }
        let cs = config.cs_no;
        let bus = self.bus_mode(cs);

        let busy = if config.dual_flash_mode {
            let pos = config.busy_bit_pos as u32;
            if pos < 4 {
                (1 << pos) | (1 << (pos + 4))
            } else {
                ((1 << (pos - 4)) | (1 << pos)) << 8
            }
        } else {
            1u32 << config.busy_bit_pos
        };

        self.deassert_csn();

        let (len, cmd) = self.command_phase(config, config.status_reg_read_cmd, bus);
        self.write_phase(len, cmd, cs)?;
        if config.flash_type == FlashType::MacronixOcta && bus == BusMode::Octa {
            self.write_phase(32, 0, cs)?;
        }
        if matches!(bus, BusMode::Quad | BusMode::Octa) {
            self.dummy_writes(config.dummy_bytes_for_rdsr as u32, cs)?;
        }

        if config.dual_flash_mode {
            self.dual_both(config, false);
            self.set_bus_mode(cs, BusMode::Octa);
        }

        let (count, hsize) = if config.dual_flash_mode {
            (2, Hsize::HalfWord)
        } else {
            (1, Hsize::Byte)
        };
        let mut status;
        let mut polls = 0u32;
        loop {
            self.read_trigger(count, cs, hsize);
            status = self.pop_fifo(hsize)?;
            if status & busy == 0 {
                break;
            }
            polls += 1;
            if let PollBudget::Iterations(limit) = self.budget {
                if polls >= limit {
                    log::warn!("flash on {:?} still busy after {} status reads", cs, polls);
                    return Err(Error::HardwareTimeout {
                        reg: QSPI_MANUAL_RD_WR_DATA,
                        mask: busy,
                    });
                }
            }
        }

        self.dual_both(config, true);
        self.set_bus_mode(cs, bus);
        self.deassert_csn();
        log::trace!("flash idle, status {:#x} after {} busy polls", status, polls);
        Ok(status)
    }

    /// Shift out `count` zero dummy bytes, at most four per phase
    pub(crate) fn dummy_writes(&mut self, mut count: u32, cs: ChipSelect) -> Result<()> {
        while count != 0 {
            let chunk = if count & 0x3 != 0 { count & 0x3 } else { 4 };
            self.write_phase(8 * chunk, 0, cs)?;
            count -= chunk;
        }
        Ok(())
    }

    /// Send write enable ahead of a status register write
    pub fn enable_status_reg_write(&mut self, config: &FlashConfig) -> Result<()> {
        let cs = config.cs_no;
        let bus = self.bus_mode(cs);
        self.write_phase(8, WREN as u32, cs)?;
        if config.uses_16bit_cmd() && bus == BusMode::Octa {
            self.write_phase(8, WREN2 as u32, cs)?;
        }
        self.deassert_csn();
        Ok(())
    }

    /// Write the flash status register(s) and wait for completion
    pub fn status_reg_write(
        &mut self,
        config: &FlashConfig,
        value: u32,
        opts: StatusWrite,
        delay_us: u32,
    ) -> Result<()> {
        let cs = config.cs_no;
        let bus = self.bus_mode(cs);
        log::debug!("status write {:#x} ({:?}) on {:?}", value, opts, cs);

        self.dual_both(config, true);

        let ewsr_path = matches!(config.flash_type, FlashType::SstSpi | FlashType::GigaDevice);
        if ewsr_path && !opts.non_volatile {
            self.write_phase(8, EWSR as u32, cs)?;
            self.deassert_csn();
        } else {
            self.enable_status_reg_write(config)?;
        }

        let (len, cmd) = self.command_phase(config, config.status_reg_write_cmd, bus);
        self.write_phase(len, cmd, cs)?;
        if config.flash_type == FlashType::MacronixOcta && bus == BusMode::Octa {
            self.write_phase(32, 0, cs)?;
        }

        let data_bits = match opts.width {
            StatusWidth::Bits24 => 24,
            StatusWidth::Bits16 => 16,
            StatusWidth::Auto => match config.flash_type {
                FlashType::WinbondQuad | FlashType::GigaDevice => 16,
                _ => 8,
            },
        };
        self.write_phase(data_bits, value, cs)?;
        self.deassert_csn();

        self.wait_flash_idle(config)?;
        self.dual_both(config, false);
        self.sleep_us(delay_us);
        Ok(())
    }

    /// Read a one or two byte flash register with an 8-bit command
    pub fn flash_reg_read(&mut self, cmd: u8, cs: ChipSelect, two_bytes: bool) -> Result<u32> {
        let count = if two_bytes { 2 } else { 1 };
        self.write_phase(8, cmd as u32, cs)?;
        self.read_trigger(count, cs, Hsize::Byte);
        let mut value = 0;
        for _ in 0..count {
            value = (value << 8) | self.pop_fifo(Hsize::Byte)?;
        }
        self.deassert_csn();
        log::trace!("reg {:#04x} = {:#x}", cmd, value);
        Ok(value)
    }

    /// Write enable followed by a 16-bit `cmd | value` register write
    pub fn flash_reg_write(
        &mut self,
        cmd: u8,
        value: u32,
        cs: ChipSelect,
        delay_us: u32,
    ) -> Result<()> {
        self.write_phase(8, WREN as u32, cs)?;
        self.deassert_csn();
        self.write_phase(16, ((cmd as u32) << 8) | (value & 0xFF), cs)?;
        self.deassert_csn();
        self.sleep_us(delay_us);
        Ok(())
    }

    /// Addressed status/control register write (Adesto, Macronix octal)
    pub fn status_control_reg_write(
        &mut self,
        config: &FlashConfig,
        cmd: u8,
        addr: u32,
        value: u8,
        delay_us: u32,
    ) -> Result<()> {
        let cs = config.cs_no;
        self.write_phase(8, WREN as u32, cs)?;
        self.deassert_csn();
        self.write_phase(8, cmd as u32, cs)?;
        if config.flash_type == FlashType::MacronixOcta {
            self.write_phase(32, addr, cs)?;
        } else {
            self.write_phase(8, addr & 0xFF, cs)?;
        }
        self.write_phase(8, value as u32, cs)?;
        self.deassert_csn();
        if config.flash_type == FlashType::AdestoOcta {
            self.wait_flash_idle(config)?;
        }
        self.sleep_us(delay_us);
        Ok(())
    }

    /// Write the SST26 block protection register
    pub fn write_block_protect(
        &mut self,
        cs: ChipSelect,
        protect: u8,
        num_bytes: u8,
        delay_us: u32,
    ) -> Result<()> {
        self.write_phase(8, WREN as u32, cs)?;
        self.deassert_csn();
        self.write_phase(8, WBPR as u32, cs)?;
        for _ in 0..num_bytes {
            self.write_phase(8, protect as u32, cs)?;
        }
        self.deassert_csn();
        self.sleep_us(delay_us);
        Ok(())
    }
}
