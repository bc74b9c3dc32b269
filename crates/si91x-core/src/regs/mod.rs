//! Register access layer
//!
//! Every driver in this crate talks to hardware through [`RegisterFile`], a
//! small capability object exposing 32-bit reads and writes at byte offsets
//! from a peripheral base. On target this is [`MmioRegisters`]; in tests it is
//! a simulated register file that records every access.
//!
//! Offsets and bit definitions live in the per-peripheral submodules.

pub mod efuse;
pub mod qspi;

/// 32-bit register file of one peripheral instance
///
/// Reads take `&mut self` because reading a data port has side effects on
/// real hardware (FIFO pops) and simulators need to model them.
pub trait RegisterFile {
    /// Read the register at `offset`
    fn read32(&mut self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`
    fn write32(&mut self, offset: usize, value: u32);

    /// Read-modify-write: clear `clear`, then set `set`
    fn update32(&mut self, offset: usize, clear: u32, set: u32) {
        let value = self.read32(offset);
        self.write32(offset, (value & !clear) | set);
    }

    /// Set `mask` bits in the register at `offset`
    fn set_bits(&mut self, offset: usize, mask: u32) {
        self.update32(offset, 0, mask);
    }

    /// Clear `mask` bits in the register at `offset`
    fn clear_bits(&mut self, offset: usize, mask: u32) {
        self.update32(offset, mask, 0);
    }
}

impl<T: RegisterFile + ?Sized> RegisterFile for &mut T {
    fn read32(&mut self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Memory-mapped register block at a fixed physical address
///
/// # Safety
///
/// Accessing MMIO is inherently unsafe; [`MmioRegisters::new`] is the only
/// place where the caller vouches for the address.
pub struct MmioRegisters {
    base: usize,
    size: usize,
}

impl MmioRegisters {
    /// Wrap the register block at `base` spanning `size` bytes
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `base..base + size` is a valid, mapped MMIO region
    /// - No other code accesses the same region while this value lives
    pub const unsafe fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Base address of this block
    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterFile for MmioRegisters {
    #[inline]
    fn read32(&mut self, offset: usize) -> u32 {
        debug_assert!(offset + 4 <= self.size);
        debug_assert!(offset & 3 == 0, "unaligned 32-bit read");
        // SAFETY: the region was vouched for in `new` and the offset is in range
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write32(&mut self, offset: usize, value: u32) {
        debug_assert!(offset + 4 <= self.size);
        debug_assert!(offset & 3 == 0, "unaligned 32-bit write");
        // SAFETY: the region was vouched for in `new` and the offset is in range
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Minimal register file for unit tests: a flat array plus an access log.

    extern crate std;
    use std::vec::Vec;

    use super::RegisterFile;

    /// One recorded access
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Access {
        Read(usize, u32),
        Write(usize, u32),
    }

    pub struct MockRegisters {
        pub regs: Vec<u32>,
        pub log: Vec<Access>,
        /// Values returned for reads of a given offset, consumed in order
        /// before falling back to the stored value
        pub scripted: Vec<(usize, u32)>,
    }

    impl MockRegisters {
        pub fn new(size: usize) -> Self {
            Self {
                regs: std::vec![0; size / 4],
                log: Vec::new(),
                scripted: Vec::new(),
            }
        }

        pub fn writes(&self) -> Vec<(usize, u32)> {
            self.log
                .iter()
                .filter_map(|a| match a {
                    Access::Write(off, v) => Some((*off, *v)),
                    Access::Read(..) => None,
                })
                .collect()
        }

        pub fn peek(&self, offset: usize) -> u32 {
            self.regs[offset / 4]
        }

        pub fn poke(&mut self, offset: usize, value: u32) {
            self.regs[offset / 4] = value;
        }
    }

    impl RegisterFile for MockRegisters {
        fn read32(&mut self, offset: usize) -> u32 {
            let value = match self.scripted.iter().position(|(off, _)| *off == offset) {
                Some(idx) => self.scripted.remove(idx).1,
                None => self.regs[offset / 4],
            };
            self.log.push(Access::Read(offset, value));
            value
        }

        fn write32(&mut self, offset: usize, value: u32) {
            self.regs[offset / 4] = value;
            self.log.push(Access::Write(offset, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockRegisters;
    use super::*;

    #[test]
    fn test_update_preserves_other_bits() {
        let mut regs = MockRegisters::new(0x10);
        regs.poke(0x4, 0xF0F0_0000);
        regs.update32(0x4, 0xF000_0000, 0x0000_000F);
        assert_eq!(regs.peek(0x4), 0x00F0_000F);
    }

    #[test]
    fn test_set_clear_bits() {
        let mut regs = MockRegisters::new(0x10);
        regs.set_bits(0x8, 1 << 6);
        assert_eq!(regs.peek(0x8), 0x40);
        regs.clear_bits(0x8, 1 << 6);
        assert_eq!(regs.peek(0x8), 0);
    }
}
