//! Micron quad parts

use super::FamilyInitializer;
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::{DIS_XIP, WR_ENHN_VOL_CON_REG, WR_VOL_CON_REG};
use crate::qspi::Qspi;

/// Micron N25Q/MT25Q
///
/// Dummy clocks, XIP and wrap go to the volatile configuration register; the
/// protocol (quad, dual, extended SPI) goes to the enhanced one.
pub struct Micron;

impl FamilyInitializer for Micron {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let xip = if config.xip_mode { 0 } else { DIS_XIP };
        let clocks_per_byte = match config.dummy_mode {
            BusMode::Dual => 4,
            BusMode::Quad => 2,
            _ => 8,
        };
        let clocks = config.dummy_bytes as u32 * clocks_per_byte;
        qspi.flash_reg_write(
            WR_VOL_CON_REG,
            (clocks << 4) | xip | config.wrap_code(),
            cs,
            delay_us,
        )?;

        let protocol = match config.data_mode {
            BusMode::Quad => 0x5F,
            BusMode::Dual => 0x9F,
            _ => 0xDF,
        };
        qspi.flash_reg_write(WR_ENHN_VOL_CON_REG, protocol, cs, delay_us)
    }
}
