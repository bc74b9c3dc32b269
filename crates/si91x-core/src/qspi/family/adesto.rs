//! Adesto quad and octal parts
//!
//! Both take their settings through the addressed status/control register
//! write (0x71).

use super::FamilyInitializer;
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::{STS_BYT2, STS_CTRL};
use crate::qspi::Qspi;

/// Adesto quad
pub struct AdestoQuad;

impl FamilyInitializer for AdestoQuad {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        if config.data_mode == BusMode::Quad {
            qspi.status_control_reg_write(config, STS_CTRL, 2, 1 << 1, delay_us)?;
        }
        if config.xip_mode {
            let wrap = (config.wrap_code() | 8) as u8;
            qspi.status_control_reg_write(config, STS_CTRL, 4, wrap, delay_us)?;
        }
        if config.dummy_cycles_for_controller != 0 {
            let cycles = config.dummy_cycles_for_controller << 4;
            qspi.status_control_reg_write(config, STS_CTRL, 5, cycles, delay_us)?;
        }
        Ok(())
    }
}

/// Adesto octal (ATXP series)
pub struct AdestoOcta;

impl FamilyInitializer for AdestoOcta {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let opi_qpi: u32 = match config.inst_mode {
            BusMode::Octa => 1 << 3,
            BusMode::Quad => 1 << 2,
            _ => 0,
        };
        let clocks = match opi_qpi {
            0 => 0,
            _ if config.dummy_mode == BusMode::Octa => config.dummy_bytes as u32,
            _ => config.dummy_bytes as u32 * 2,
        };
        let clocks = match clocks {
            0..=8 => 0,
            9..=16 => 4,
            other => other,
        };
        let value = (clocks | (config.wrap_code() << 5)) as u8;
        qspi.status_control_reg_write(config, STS_CTRL, 3, value, delay_us)?;

        if opi_qpi != 0 {
            qspi.flash_reg_write(STS_BYT2, opi_qpi, config.cs_no, delay_us)?;
        }
        Ok(())
    }
}
