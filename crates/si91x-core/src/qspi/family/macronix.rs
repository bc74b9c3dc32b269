//! Macronix quad and octal parts

use super::FamilyInitializer;
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::{MX_READ_CONFIG, WCFG2};
use crate::qspi::status::{StatusWidth, StatusWrite};
use crate::qspi::Qspi;

/// Quad enable in status register 1
const MX_QE: u32 = 1 << 6;
/// Top/bottom protection in configuration register 1
const MX_TB: u32 = 1 << 3;
/// High performance mode in configuration register 2
const MX_HP: u32 = 1 << 1;

/// Configuration register 2 address of the dummy cycle field
const CR2_DUMMY_ADDR: u32 = 0x300;
/// Configuration register 2 address of the STR/DTR field
const CR2_MODE_ADDR: u32 = 0;

/// Macronix quad (MX25 series)
///
/// Quad enable, top/bottom protection and high performance mode share one
/// status write covering SR1 and, when needed, CR1 and CR2.
pub struct MacronixQuad;

impl FamilyInitializer for MacronixQuad {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let quad = config.data_mode == BusMode::Quad;
        let top_bottom = config.prot_top_bottom;
        let high_perf = config.high_perf_mode_en;

        if quad || top_bottom || high_perf {
            let mut status = qspi.wait_flash_idle(config)? & 0xFF;
            let mut write = (status & MX_QE != 0) != quad;
            status = (status & !MX_QE) | if quad { MX_QE } else { 0 };
            let mut width = StatusWidth::Auto;

            if top_bottom || high_perf {
                let config_regs = qspi.flash_reg_read(MX_READ_CONFIG, cs, true)?;
                status = (status << 16) | config_regs;
                if high_perf {
                    status |= MX_HP;
                    width = StatusWidth::Bits24;
                    write = true;
                } else {
                    status >>= 8;
                }
                if top_bottom {
                    status |= MX_TB << if high_perf { 8 } else { 0 };
                    if !high_perf {
                        width = StatusWidth::Bits16;
                    }
                    write = true;
                }
            }

            if write {
                let opts = StatusWrite {
                    width,
                    non_volatile: false,
                };
                qspi.status_reg_write(config, status, opts, delay_us)?;
            }
        }

        if config.inst_mode == BusMode::Quad {
            qspi.set_flash_mode(config.flash_type, BusMode::Quad, cs)?;
        }
        Ok(())
    }
}

/// Macronix octal (MX25UM series)
pub struct MacronixOcta;

impl FamilyInitializer for MacronixOcta {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let str_dtr = (config.data_mode == BusMode::Octa) as u8;
        let dummy_code = match config.dummy_count() {
            0..=8 => 6,
            9..=16 => 2,
            _ => 0,
        };

        if config.prot_top_bottom {
            let status = qspi.wait_flash_idle(config)? & 0xFF;
            let cr = qspi.flash_reg_read(MX_READ_CONFIG, cs, false)?;
            if cr & MX_TB == 0 {
                qspi.status_reg_write(config, (status << 8) | 0xF, StatusWrite::BITS16, delay_us)?;
            }
        }

        qspi.status_control_reg_write(config, WCFG2, CR2_DUMMY_ADDR, dummy_code, delay_us)?;
        qspi.status_control_reg_write(config, WCFG2, CR2_MODE_ADDR, str_dtr, delay_us)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::config::FlashType;
    use crate::qspi::testutil::{controller, data_writes, phase_lengths, retention, NoDelay};
    use crate::regs::qspi::QSPI_MANUAL_RD_WR_DATA;

    #[test]
    fn test_quad_enable_only() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            flash_type: FlashType::MacronixQuad,
            data_mode: BusMode::Quad,
            inst_mode: BusMode::Quad,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        // RDSR, WREN, WRSR 0x40, RDSR poll, enable QPI
        assert_eq!(
            data_writes(&regs),
            [0xFF, 0xFF, 0x05, 0x06, 0x01, 0x40, 0x05, 0x35]
        );
    }

    #[test]
    fn test_high_perf_and_top_bottom_share_one_write() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        // SR1 with QE already set, CR1 = 0x00, CR2 = 0x00, poll
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x40),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            flash_type: FlashType::MacronixQuad,
            data_mode: BusMode::Quad,
            prot_top_bottom: true,
            high_perf_mode_en: true,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        let data = data_writes(&regs);
        assert_eq!(&data[2..4], &[0x05, 0x15]);
        assert_eq!(data[6], 0x40_08_02);
        assert_eq!(phase_lengths(&regs)[6], 24);
    }

    #[test]
    fn test_top_bottom_without_high_perf() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x20),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            flash_type: FlashType::MacronixQuad,
            prot_top_bottom: true,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        let data = data_writes(&regs);
        assert_eq!(data[6], 0x00_28);
        assert_eq!(phase_lengths(&regs)[6], 16);
    }

    #[test]
    fn test_octa_dummy_and_mode_writes() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            flash_type: FlashType::MacronixOcta,
            data_mode: BusMode::Octa,
            dummy_bytes: 10,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        assert_eq!(
            data_writes(&regs),
            [0xFF, 0xFF, 0x06, 0x72, 0x300, 0x02, 0x06, 0x72, 0x0, 0x01]
        );
        assert_eq!(&phase_lengths(&regs)[4..6], &[0, 8]);
    }
}
