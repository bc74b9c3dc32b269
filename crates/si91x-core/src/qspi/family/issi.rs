//! ISSI quad parts

use super::FamilyInitializer;
use crate::error::Result;
use crate::qspi::config::{BusMode, FlashConfig};
use crate::qspi::opcodes::SET_READ_PARAMS;
use crate::qspi::status::StatusWrite;
use crate::qspi::Qspi;

/// Quad enable in status register 1
const ISSI_QE: u32 = 1 << 6;

/// ISSI IS25 series
pub struct Issi;

impl FamilyInitializer for Issi {
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        let cs = config.cs_no;
        let quad = config.data_mode == BusMode::Quad;

        let status = qspi.wait_flash_idle(config)? & 0xFF;
        if quad != (status & ISSI_QE != 0) {
            qspi.status_reg_write(config, status ^ ISSI_QE, StatusWrite::default(), delay_us)?;
        }

        if config.inst_mode == BusMode::Quad {
            qspi.set_flash_mode(config.flash_type, BusMode::Quad, cs)?;
        }

        let clocks_per_byte = match config.dummy_mode {
            BusMode::Quad => 2,
            BusMode::Dual => 4,
            _ => 8,
        };
        let clocks = (config.dummy_bytes as u32 + config.extra_byte_en as u32) * clocks_per_byte
            + config.dummy_cycles_for_controller as u32;
        qspi.flash_reg_write(SET_READ_PARAMS, clocks << 3, cs, delay_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::config::FlashType;
    use crate::qspi::testutil::{controller, data_writes, retention, NoDelay};
    use crate::regs::qspi::QSPI_MANUAL_RD_WR_DATA;

    #[test]
    fn test_qe_and_read_params() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        regs.scripted.extend([
            (QSPI_MANUAL_RD_WR_DATA, 0x02),
            (QSPI_MANUAL_RD_WR_DATA, 0x00),
        ]);
        let config = FlashConfig {
            flash_type: FlashType::Issi,
            data_mode: BusMode::Quad,
            dummy_mode: BusMode::Quad,
            dummy_bytes: 2,
            extra_byte_en: true,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
        }
        // (2 + 1) * 2 = 6 clocks in bits 6:3
        assert_eq!(
            data_writes(&regs),
            [0xFF, 0xFF, 0x05, 0x06, 0x01, 0x42, 0x05, 0x06, 0xC030]
        );
    }
}
