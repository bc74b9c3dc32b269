//! Winbond, GigaDevice and XMC: quad enable lives in status register 2

use super::{qpi_read_params, FamilyInitializer};
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::{QUAD_EN, SET_READ_PARAMS, SR2_READ, SR2_WRITE};
use crate::qspi::status::{StatusWidth, StatusWrite};
use crate::qspi::Qspi;

/// Winbond and GigaDevice quad parts
pub struct Winbond;

impl FamilyInitializer for Winbond {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let quad = config.data_mode == BusMode::Quad;

        let sr1 = qspi.wait_flash_idle(config)? & 0xFF;
        let sr2 = qspi.flash_reg_read(SR2_READ, cs, false)?;
        if quad != (sr2 & QUAD_EN != 0) {
            let sr2 = if quad { sr2 | QUAD_EN } else { sr2 & !QUAD_EN };
            log::debug!("QE -> {}", quad);
            let opts = StatusWrite {
                width: StatusWidth::Bits16,
                non_volatile: true,
            };
            qspi.status_reg_write(config, (sr1 << 8) | sr2, opts, delay_us)?;
        }

        if config.inst_mode == BusMode::Quad {
            qspi.set_flash_mode(config.flash_type, BusMode::Quad, cs)?;
            qspi.flash_reg_write(
                SET_READ_PARAMS,
                qpi_read_params(config, false),
                cs,
                delay_us,
            )?;
        }
        Ok(())
    }
}

/// XMC quad parts
pub struct Xmc;

impl FamilyInitializer for Xmc {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let quad = config.data_mode == BusMode::Quad;

        let sr2 = qspi.flash_reg_read(SR2_READ, cs, false)?;
        if quad != (sr2 & QUAD_EN != 0) {
            qspi.flash_reg_write(SR2_WRITE, sr2 ^ QUAD_EN, cs, delay_us)?;
            qspi.wait_flash_idle(config)?;
        }

        if config.inst_mode == BusMode::Quad {
            qspi.set_flash_mode(config.flash_type, BusMode::Quad, cs)?;
            qspi.flash_reg_write(
                SET_READ_PARAMS,
                qpi_read_params(config, true),
                cs,
                delay_us,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::config::{ChipSelect, FlashType};
    use crate::qspi::testutil::{controller, data_writes, phase_lengths, retention, NoDelay};
    use crate::regs::qspi::QSPI_MANUAL_RD_WR_DATA;

    fn quad_config(flash_type: FlashType) -> FlashConfig {
        FlashConfig {
            flash_type,
            inst_mode: BusMode::Quad,
            data_mode: BusMode::Quad,
            dummy_bytes: 2,
            extra_byte_en: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_winbond_sets_qe_and_enters_qpi() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        // SR1, SR2, status poll after the write
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x1C),
            (QSPI_MANUAL_RD_WR_DATA, 0x40),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = quad_config(FlashType::WinbondQuad);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
            assert_eq!(qspi.bus_mode(ChipSelect::Cs0), BusMode::Quad);
        }
        assert_eq!(
            data_writes(&regs),
            [0xFF, 0xFF, 0x05, 0x35, 0x06, 0x01, 0x1C42, 0x05, 0x38, 0x06, 0xC020]
        );
        assert_eq!(phase_lengths(&regs)[6], 16);
    }

    #[test]
    fn test_winbond_qe_already_set() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x02),
        ]);
        let config = FlashConfig {
            inst_mode: BusMode::Single,
            ..quad_config(FlashType::GigaDevice)
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        assert_eq!(data_writes(&regs), [0xFF, 0xFF, 0x05, 0x35]);
    }

    #[test]
    fn test_xmc_clears_qe_and_skips_qpi() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x03),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            flash_type: FlashType::Xmc,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        assert_eq!(data_writes(&regs), [0xFF, 0xFF, 0x35, 0x06, 0x3101, 0x05]);
    }

    #[test]
    fn test_xmc_two_dummy_params() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.push((QSPI_MANUAL_RD_WR_DATA, 0x02));
        let config = FlashConfig {
            extra_byte_en: false,
            ..quad_config(FlashType::Xmc)
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        assert_eq!(data_writes(&regs), [0xFF, 0xFF, 0x35, 0x38, 0x06, 0xC010]);
    }
}
