//! Atmel quad parts

use super::FamilyInitializer;
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::{ATMEL_QEN, WCON};
use crate::qspi::Qspi;

/// Atmel quad: set QEN in the configuration register
pub struct AtmelQuad;

impl FamilyInitializer for AtmelQuad {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        if config.data_mode == BusMode::Quad {
            qspi.flash_reg_write(WCON, ATMEL_QEN, config.cs_no, delay_us)?;
        }
        Ok(())
    }
}
