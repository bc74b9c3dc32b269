//! QSPI flash controller driver
//!
//! The controller runs in one of two modes. In *manual* mode software drives
//! every phase of a flash transaction (command, address, dummies, data) by
//! programming the bus width and triggering shifts; in *auto* mode the
//! controller maps flash into the CPU address space and issues reads itself.
//!
//! [`Qspi`] holds only borrowed collaborators and a poll budget. All protocol
//! state lives in the controller registers, and every operation takes the
//! [`FlashConfig`] of the flash it talks to.
//!
//! Sequences are not transactional: if a poll times out halfway through, the
//! error is returned and the controller is left where the sequence stopped.

mod bus;
pub mod cipher;
pub mod config;
mod engine;
pub mod family;
pub mod opcodes;
mod protection;
mod reset;
mod status;

use embedded_hal::delay::DelayNs;

pub use cipher::{AesDirection, AesMode, CipherKey, KeyLen, KeySource, StandaloneAes};
pub use config::{
    AddressWidth, BusMode, ChipSelect, Command16, DummyDirection, FlashConfig, FlashType,
    FullDuplex, Protection, ResetType,
};
pub use engine::{EraseKind, EraseOptions, ReadOptions, WriteOptions};
pub use family::{FamilyInitializer, FamilyRegistry};
pub use reset::{FlashResetCommands, ResetPins};
pub use status::{StatusWidth, StatusWrite};

use crate::error::Result;
use crate::poll::{self, PollBudget};
use crate::regs::RegisterFile;

/// Handle on one QSPI controller instance
pub struct Qspi<'a> {
    regs: &'a mut dyn RegisterFile,
    retention: &'a mut dyn RegisterFile,
    delay: &'a mut dyn DelayNs,
    budget: PollBudget,
    reset_pins: Option<&'a mut dyn ResetPins>,
    reset_commands: Option<FlashResetCommands>,
}

impl<'a> Qspi<'a> {
    /// Create a driver over the controller registers
    ///
    /// `retention` is the NPSS block holding the battery-backed word that
    /// records the flash operating mode across resets.
    pub fn new(
        regs: &'a mut dyn RegisterFile,
        retention: &'a mut dyn RegisterFile,
        delay: &'a mut dyn DelayNs,
    ) -> Self {
        Self {
            regs,
            retention,
            delay,
            budget: PollBudget::default(),
            reset_pins: None,
            reset_commands: None,
        }
    }

    /// Poll budget used by every register spin
    pub fn budget(&self) -> PollBudget {
        self.budget
    }

    /// Replace the poll budget
    pub fn set_budget(&mut self, budget: PollBudget) {
        self.budget = budget;
    }

    /// GPIO lines pulsed by reset types 8 and 9
    pub fn set_reset_pins(&mut self, pins: &'a mut dyn ResetPins) {
        self.reset_pins = Some(pins);
    }

    /// Command list sent by reset type 11
    pub fn set_reset_commands(&mut self, commands: FlashResetCommands) {
        self.reset_commands = Some(commands);
    }

    /// Direct access to the controller registers
    pub fn registers(&mut self) -> &mut dyn RegisterFile {
        &mut *self.regs
    }

    pub(crate) fn sleep_us(&mut self, us: u32) {
        if us != 0 {
            self.delay.delay_us(us);
        }
    }

    pub(crate) fn wait_clear(&mut self, offset: usize, mask: u32) -> Result<u32> {
        poll::wait_clear(&mut *self.regs, self.budget, offset, mask)
    }

    pub(crate) fn wait_set(&mut self, offset: usize, mask: u32) -> Result<u32> {
        poll::wait_set(&mut *self.regs, self.budget, offset, mask)
    }
}

#[cfg(feature = "alloc")]
impl Qspi<'_> {
    /// [`spi_read`](Self::spi_read) into a freshly allocated buffer, polled
    pub fn read_vec(
        &mut self,
        config: &FlashConfig,
        addr: u32,
        len: usize,
        opts: ReadOptions,
        window: &mut dyn crate::window::FlashWindow,
    ) -> Result<alloc::vec::Vec<u8>> {
        let mut buf = alloc::vec![0u8; len];
        self.spi_read(config, addr, &mut buf, opts, window, None)?;
        Ok(buf)
    }
}
