//! Block protection bits

use super::config::{FlashConfig, FlashType};
use super::opcodes::{ADESTO_PROTECT, ADESTO_SECTOR_SIZE, ADESTO_UNPROTECT, SR2_READ, WREN};
use super::status::StatusWrite;
use super::Qspi;
use crate::error::Result;

impl Qspi<'_> {
    /// Program the block protection field of the status register
    ///
    /// `prot` is the raw field value, `valid_prot_bits` wide, placed at
    /// status bit 2. Nothing is written when the field already matches.
    /// Adesto octal parts use [`protect_adesto`](Self::protect_adesto)
    /// instead.
    pub fn flash_protection(&mut self, config: &FlashConfig, prot: u32, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let mask = (1u32 << config.valid_prot_bits.min(31)) - 1;

        let previous = self.bus_mode(cs);
        if previous != config.inst_mode {
            self.set_bus_mode(cs, config.inst_mode);
        }

        match config.flash_type {
            FlashType::AdestoOcta => self.protect_adesto(config, prot)?,
            FlashType::GigaDevice => {
                let status = self.wait_flash_idle(config)?;
                if (status >> 2) & mask != prot {
                    let sr2 = self.flash_reg_read(SR2_READ, cs, false)?;
                    let value = (((status << 8) | sr2) & !(mask << 10)) | ((prot << 10) & (mask << 10));
                    let opts = StatusWrite {
                        non_volatile: true,
                        ..Default::default()
                    };
                    self.status_reg_write(config, value, opts, delay_us)?;
                }
            }
            _ => {
                let status = self.wait_flash_idle(config)?;
                if (status >> 2) & mask != prot {
                    let value = (status & !(mask << 2)) | ((prot << 2) & (mask << 2));
                    self.status_reg_write(config, value, StatusWrite::default(), delay_us)?;
                }
            }
        }

        self.set_bus_mode(cs, previous);
        Ok(())
    }

    /// Adesto sector protection walk
    ///
    /// `0` clears and `0xFF` sets the whole status register. Otherwise the
    /// low nibble counts 256 KiB sectors to protect from address zero and the
    /// high nibble counts the sectors after them to unprotect.
    pub fn protect_adesto(&mut self, config: &FlashConfig, prot: u32) -> Result<()> {
        let cs = config.cs_no;
        match prot {
            0 | 0xFF => {
                return self.status_reg_write(config, prot, StatusWrite::default(), 0);
            }
            _ => {}
        }

        let protect = prot & 0xF;
        let unprotect = (prot >> 4) & 0xF;
        log::debug!("adesto: protect {} sectors, unprotect {}", protect, unprotect);

        let walk = core::iter::repeat(ADESTO_PROTECT)
            .take(protect as usize)
            .chain(core::iter::repeat(ADESTO_UNPROTECT).take(unprotect as usize));
        let mut addr = 0u32;
        for cmd in walk {
            self.command(8, WREN as u32, cs)?;
            self.write_phase(8, cmd as u32, cs)?;
            self.write_phase(32, addr, cs)?;
            self.deassert_csn();
            addr = addr.wrapping_add(ADESTO_SECTOR_SIZE);
        }
        Ok(())
    }
}
