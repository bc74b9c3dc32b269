//! eFUSE controller
//!
//! One-time-programmable bits are burned through the direct-access path:
//! the controller routes the macro's chip select, program enable and strobe
//! lines to registers and software drives them in a fixed order. Reads go
//! either through the read FSM or through the memory-mapped window. Both need
//! the read timing register programmed for the current SoC clock.
//!
//! A misordered program sequence permanently corrupts the cell, so
//! [`Efuse::write_bit`] checks every argument before the first register
//! access.

use embedded_hal::delay::DelayNs;

use crate::error::{Error, Result};
use crate::poll::{self, PollBudget};
use crate::regs::efuse::*;
use crate::regs::RegisterFile;

/// Clock cycles needed to cover `ns` at `hz`, at least one
fn cycles(ns: u32, hz: u32) -> u32 {
    let cycles = (ns as u64 * hz as u64).div_ceil(1_000_000_000);
    cycles.max(1) as u32
}

/// Read timing register value for `soc_clk`
///
/// Fails with [`Error::InvalidClock`] outside 1 MHz to 180 MHz.
pub fn read_timing(soc_clk: u32) -> Result<u32> {
    if !(SOC_CLK_MIN..=SOC_CLK_MAX).contains(&soc_clk) {
        return Err(Error::InvalidClock { hz: soc_clk });
    }
    let strobe = cycles(READ_STROBE_NS, soc_clk).min(RD_TMNG_STROBE_MASK);
    let edge = cycles(READ_EDGE_NS, soc_clk).min(RD_TMNG_EDGE_MASK);
    Ok((strobe << RD_TMNG_STROBE_OFF) | (edge << RD_TMNG_SETUP_OFF) | (edge << RD_TMNG_HOLD_OFF))
}

fn check_address(address: u16) -> Result<()> {
    if address > ADDRESS_MAX {
        return Err(Error::InvalidAddress { address });
    }
    Ok(())
}

/// Handle on the eFUSE controller
pub struct Efuse<'a> {
    regs: &'a mut dyn RegisterFile,
    delay: &'a mut dyn DelayNs,
    budget: PollBudget,
}

impl<'a> Efuse<'a> {
    /// Create a driver over the controller registers
    pub fn new(regs: &'a mut dyn RegisterFile, delay: &'a mut dyn DelayNs) -> Self {
        Self {
            regs,
            delay,
            budget: PollBudget::default(),
        }
    }

    /// Replace the poll budget
    pub fn set_budget(&mut self, budget: PollBudget) {
        self.budget = budget;
    }

    /// Turn the controller on
    pub fn enable(&mut self) {
        self.regs.set_bits(EFUSE_CTRL, CTRL_EFUSE_ENABLE);
    }

    /// Turn the controller off
    pub fn disable(&mut self) {
        self.regs.clear_bits(EFUSE_CTRL, CTRL_EFUSE_ENABLE);
    }

    /// Set the direct-access address
    pub fn set_address(&mut self, address: u16) -> Result<()> {
        check_address(address)?;
        self.regs.write32(EFUSE_DA_ADDR, address as u32);
        Ok(())
    }

    /// Current direct-access address
    pub fn get_address(&mut self) -> u16 {
        self.regs.read32(EFUSE_DA_ADDR) as u16
    }

    /// Burn one bit
    ///
    /// `hold_us` is how long the program strobe stays asserted. The sequence
    /// is: direct path on, control lines cleared (asserting the active-low
    /// chip select and program enable), bit address, strobe, hold, strobe
    /// off through the strobe-clear register. The control lines are released and the direct path turned off
    /// afterwards.
    pub fn write_bit(&mut self, address: u16, bit: u8, hold_us: u32) -> Result<()> {
        check_address(address)?;
        if bit > BIT_POS_MAX {
            return Err(Error::InvalidBitPosition { bit });
        }
        self.wait_idle()?;
        log::debug!("efuse: burning row {:#04x} bit {}", address, bit);

        self.regs.set_bits(EFUSE_CTRL, CTRL_DIRECT_PATH_ENABLE);
        self.regs
            .write32(EFUSE_DA_CTRL_CLEAR, DA_PGENB | DA_CSB | DA_LOAD | DA_STROBE);
        self.regs
            .write32(EFUSE_DA_ADDR, ((address as u32) << 3) | bit as u32);
        self.regs.write32(EFUSE_DA_CTRL_SET, DA_STROBE);
        self.delay.delay_us(hold_us);
        self.regs.write32(EFUSE_DA_CLR_STROBE, DA_STROBE);

        self.regs.write32(EFUSE_DA_CTRL_SET, DA_PGENB | DA_CSB);
        self.regs.clear_bits(EFUSE_CTRL, CTRL_DIRECT_PATH_ENABLE);
        Ok(())
    }

    /// Read one row through the read FSM
    pub fn fsm_read_byte(&mut self, address: u16, soc_clk: u32) -> Result<u8> {
        check_address(address)?;
        let timing = read_timing(soc_clk)?;
        self.wait_idle()?;

        self.regs.write32(EFUSE_RD_TMNG_PARAM, timing);
        self.regs
            .write32(EFUSE_READ_ADDR, address as u32 | READ_ADDR_DO_FSM_READ);
        poll::wait_set(&mut *self.regs, self.budget, EFUSE_STATUS, STATUS_FSM_DONE)?;
        Ok(self.regs.read32(EFUSE_READ_DATA) as u8)
    }

    /// Read one row through the memory-mapped window
    pub fn memory_mapped_read_byte(&mut self, address: u16, soc_clk: u32) -> Result<u8> {
        check_address(address)?;
        self.prepare_window(MEM_MAP_BYTE, soc_clk)?;
        Ok(self.window_byte(address))
    }

    /// Read rows `address` and `address + 1` as a little-endian half word
    pub fn memory_mapped_read_word(&mut self, address: u16, soc_clk: u32) -> Result<u16> {
        check_address(address.saturating_add(1))?;
        self.prepare_window(MEM_MAP_WORD, soc_clk)?;
        let lo = self.window_byte(address) as u16;
        let hi = self.window_byte(address + 1) as u16;
        Ok(lo | (hi << 8))
    }

    fn prepare_window(&mut self, length: u32, soc_clk: u32) -> Result<()> {
        let timing = read_timing(soc_clk)?;
        self.wait_idle()?;
        self.regs.write32(EFUSE_MEM_MAP_LENGTH, length);
        self.regs.write32(EFUSE_RD_TMNG_PARAM, timing);
        Ok(())
    }

    fn window_byte(&mut self, address: u16) -> u8 {
        let offset = EFUSE_MEM_MAP_WINDOW + address as usize;
        let word = self.regs.read32(offset & !3);
        (word >> ((offset & 3) * 8)) as u8
    }

    fn wait_idle(&mut self) -> Result<()> {
        poll::wait_clear(&mut *self.regs, self.budget, EFUSE_STATUS, STATUS_BUSY).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::testutil::NoDelay;
    use crate::regs::mock::{Access, MockRegisters};

    fn controller() -> MockRegisters {
        MockRegisters::new(EFUSE_REG_SIZE)
    }

    #[test]
    fn test_write_bit_order() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        {
            let mut efuse = Efuse::new(&mut regs, &mut delay);
            efuse.write_bit(0x31, 7, 5).unwrap();
        }
        let writes = regs.writes();
        assert_eq!(
            writes,
            [
                (EFUSE_CTRL, CTRL_DIRECT_PATH_ENABLE),
                (EFUSE_DA_CTRL_CLEAR, DA_PGENB | DA_CSB | DA_LOAD | DA_STROBE),
                (EFUSE_DA_ADDR, (0x31 << 3) | 7),
                (EFUSE_DA_CTRL_SET, DA_STROBE),
                (EFUSE_DA_CLR_STROBE, DA_STROBE),
                (EFUSE_DA_CTRL_SET, DA_PGENB | DA_CSB),
                (EFUSE_CTRL, 0),
            ]
        );
        assert_eq!(delay.total_ns, 5_000);
    }

    #[test]
    fn test_write_bit_bounds_touch_nothing() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        {
            let mut efuse = Efuse::new(&mut regs, &mut delay);
            assert_eq!(
                efuse.write_bit(0x32, 0, 5),
                Err(Error::InvalidAddress { address: 0x32 })
            );
            assert_eq!(
                efuse.write_bit(0x10, 8, 5),
                Err(Error::InvalidBitPosition { bit: 8 })
            );
        }
        assert!(regs.log.is_empty());
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn test_write_bit_times_out_on_busy() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        regs.poke(EFUSE_STATUS, STATUS_BUSY);
        let mut efuse = Efuse::new(&mut regs, &mut delay);
        efuse.set_budget(PollBudget::Iterations(10));
        assert_eq!(
            efuse.write_bit(0, 0, 5),
            Err(Error::HardwareTimeout {
                reg: EFUSE_STATUS,
                mask: STATUS_BUSY
            })
        );
    }

    #[test]
    fn test_read_timing_bounds() {
        assert_eq!(read_timing(0), Err(Error::InvalidClock { hz: 0 }));
        assert_eq!(
            read_timing(180_000_001),
            Err(Error::InvalidClock { hz: 180_000_001 })
        );
        // 50 ns strobe, 10 ns edges
        assert_eq!(read_timing(180_000_000), Ok(9 | (2 << 8) | (2 << 12)));
        assert_eq!(read_timing(1_000_000), Ok(1 | (1 << 8) | (1 << 12)));
    }

    #[test]
    fn test_fsm_read_byte() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        regs.poke(EFUSE_STATUS, STATUS_FSM_DONE);
        regs.poke(EFUSE_READ_DATA, 0x1A5);
        let byte = {
            let mut efuse = Efuse::new(&mut regs, &mut delay);
            efuse.fsm_read_byte(0x05, 20_000_000).unwrap()
        };
        assert_eq!(byte, 0xA5);
        assert_eq!(regs.peek(EFUSE_READ_ADDR), 0x05 | READ_ADDR_DO_FSM_READ);
    }

    #[test]
    fn test_bad_clock_touches_nothing() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        {
            let mut efuse = Efuse::new(&mut regs, &mut delay);
            assert!(efuse.fsm_read_byte(0, 200_000_000).is_err());
            assert!(efuse.memory_mapped_read_word(0x31, 20_000_000).is_err());
        }
        assert!(regs.log.is_empty());
    }

    #[test]
    fn test_memory_mapped_reads() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        regs.poke(EFUSE_MEM_MAP_WINDOW + 4, 0x4433_2211);
        {
            let mut efuse = Efuse::new(&mut regs, &mut delay);
            assert_eq!(efuse.memory_mapped_read_byte(6, 20_000_000), Ok(0x33));
            assert_eq!(efuse.memory_mapped_read_word(5, 20_000_000), Ok(0x3322));
        }
        assert_eq!(regs.peek(EFUSE_MEM_MAP_LENGTH), MEM_MAP_WORD);
        assert!(regs
            .log
            .contains(&Access::Read(EFUSE_MEM_MAP_WINDOW + 4, 0x4433_2211)));
    }

    #[test]
    fn test_enable_and_address() {
        let mut regs = controller();
        let mut delay = NoDelay::default();
        let mut efuse = Efuse::new(&mut regs, &mut delay);
        efuse.enable();
        efuse.set_address(0x20).unwrap();
        assert_eq!(efuse.get_address(), 0x20);
        assert_eq!(efuse.set_address(0x40), Err(Error::InvalidAddress { address: 0x40 }));
        efuse.disable();
    }
}
