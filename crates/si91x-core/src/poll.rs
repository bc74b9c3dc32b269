//! Bounded register polling
//!
//! The controller has no completion interrupts in manual mode, so every
//! "wait until bit clears" is a spin on a status register. All of those spins
//! go through this module so that a stuck or absent peripheral surfaces as
//! [`Error::HardwareTimeout`] instead of hanging the caller.

use crate::error::{Error, Result};
use crate::regs::RegisterFile;

/// Default number of register reads before a poll gives up
pub const DEFAULT_POLL_ITERATIONS: u32 = 1_000_000;

/// How long a register poll may spin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PollBudget {
    /// Give up after this many reads
    Iterations(u32),
    /// Spin until the condition holds
    Infinite,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::Iterations(DEFAULT_POLL_ITERATIONS)
    }
}

impl PollBudget {
    /// Call `done` until it returns true or the budget runs out
    ///
    /// `reg` and `mask` only label the timeout error.
    pub fn run<F>(self, reg: usize, mask: u32, mut done: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        match self {
            Self::Infinite => loop {
                if done()? {
                    return Ok(());
                }
            },
            Self::Iterations(limit) => {
                for _ in 0..limit.max(1) {
                    if done()? {
                        return Ok(());
                    }
                }
                log::warn!(
                    "poll of register {:#05x} mask {:#010x} exhausted after {} reads",
                    reg,
                    mask,
                    limit
                );
                Err(Error::HardwareTimeout { reg, mask })
            }
        }
    }
}

/// Spin until all `mask` bits of the register at `offset` are clear
///
/// Returns the last value read.
pub fn wait_clear<R: RegisterFile + ?Sized>(
    regs: &mut R,
    budget: PollBudget,
    offset: usize,
    mask: u32,
) -> Result<u32> {
    let mut last = 0;
    budget.run(offset, mask, || {
        last = regs.read32(offset);
        Ok(last & mask == 0)
    })?;
    Ok(last)
}

/// Spin until any of the `mask` bits of the register at `offset` is set
///
/// Returns the last value read.
pub fn wait_set<R: RegisterFile + ?Sized>(
    regs: &mut R,
    budget: PollBudget,
    offset: usize,
    mask: u32,
) -> Result<u32> {
    let mut last = 0;
    budget.run(offset, mask, || {
        last = regs.read32(offset);
        Ok(last & mask != 0)
    })?;
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::mock::MockRegisters;

    #[test]
    fn test_wait_clear_after_scripted_busy() {
        let mut regs = MockRegisters::new(0x40);
        regs.scripted.extend([(0x20, 1), (0x20, 1), (0x20, 1)]);
        let last = wait_clear(&mut regs, PollBudget::Iterations(10), 0x20, 1).unwrap();
        assert_eq!(last, 0);
        assert_eq!(regs.log.len(), 4);
    }

    #[test]
    fn test_budget_exhausted() {
        let mut regs = MockRegisters::new(0x40);
        regs.poke(0x20, 1);
        let err = wait_clear(&mut regs, PollBudget::Iterations(5), 0x20, 1).unwrap_err();
        assert_eq!(err, Error::HardwareTimeout { reg: 0x20, mask: 1 });
        assert_eq!(regs.log.len(), 5);
    }

    #[test]
    fn test_wait_set() {
        let mut regs = MockRegisters::new(0x40);
        regs.scripted.push((0x18, 0));
        regs.poke(0x18, 0x8000);
        assert_eq!(
            wait_set(&mut regs, PollBudget::default(), 0x18, 0x8000).unwrap(),
            0x8000
        );
    }
}
