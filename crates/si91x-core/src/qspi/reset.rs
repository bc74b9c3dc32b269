//! Flash reset and bus-mode entry
//!
//! The reset strategy is not taken from the [`FlashConfig`] of the caller but
//! from the retention register, because a warm boot has to put the flash
//! back into single mode before the configuration is even known.
//! [`Qspi::update_operating_mode`] records it after every init.

use super::config::{BusMode, ChipSelect, FlashType};
use super::opcodes::*;
use super::Qspi;
use crate::error::Result;
use crate::regs::qspi::BBFF_STORAGE2;

/// Post-reset delay with the long-delay flag set
const RESET_DELAY_LONG_US: u32 = 150;
/// Default post-reset delay
const RESET_DELAY_US: u32 = 50;

/// GPIO lines wired to the flash reset pin
pub trait ResetPins {
    /// Configure `pin` as a GPIO output and drive it to `high`
    fn drive(&mut self, pin: u8, high: bool);
}

/// Reset command list stored in eFUSE (reset type 11)
///
/// Word 0 packs the command count in bits 1:0, a 2-bit length code per
/// command from bit 2 upward (0 = 32 bits, 1 = 8 bits, 2 = 16 bits), the
/// delay in bits 12:8 and the delay unit in bit 13 (set: 1 ms, clear: 16 us).
/// Words 1 and 2 are the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashResetCommands {
    /// Raw eFUSE words
    pub words: [u16; 3],
}

impl FlashResetCommands {
    /// Decode from the six eFUSE bytes (little endian words)
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            words: [
                u16::from_le_bytes([bytes[0], bytes[1]]),
                u16::from_le_bytes([bytes[2], bytes[3]]),
                u16::from_le_bytes([bytes[4], bytes[5]]),
            ],
        }
    }

    /// `(bits, command)` pairs to send
    pub fn commands(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let count = (self.words[0] & 0x3) as usize;
        (0..count).filter_map(move |i| {
            let code = ((self.words[0] >> ((i + 1) * 2)) & 0x3) as u32;
            self.words.get(i + 1).map(|cmd| (8 * code, *cmd as u32))
        })
    }

    /// Delay to wait after the commands, in microseconds
    pub fn delay_us(&self) -> u32 {
        let ticks = ((self.words[0] >> 8) & 0x1F) as u32;
        if self.words[0] & (1 << 13) != 0 {
            ticks * 1000
        } else {
            ticks * 16
        }
    }
}

impl Qspi<'_> {
    /// Record the flash operating mode and reset type in retention storage
    ///
    /// `op` is `bus_mode << 5 | long_delay << 4 | reset_type`.
    pub fn update_operating_mode(&mut self, op: u8) {
        self.retention.update32(BBFF_STORAGE2, 0xFF, op as u32);
        log::debug!("operating mode/reset type {:#04x} recorded", op);
    }

    /// Bring the flash on `cs` back to single-bit mode
    ///
    /// The sequence depends on the reset type recorded by the last
    /// [`update_operating_mode`](Self::update_operating_mode). The chip
    /// select is always left in single mode.
    pub fn reset_flash(&mut self, cs: ChipSelect) -> Result<()> {
        let op = self.retention.read32(BBFF_STORAGE2);
        let reset_type = op & 0xF;
        let mode = BusMode::from_code(op >> 5);
        let settle = if op & (1 << 4) != 0 {
            RESET_DELAY_LONG_US
        } else {
            RESET_DELAY_US
        };
        log::debug!("flash reset type {} from {:?} on {:?}", reset_type, mode, cs);

        if reset_type == 0 {
            // Unknown state: try both single and quad
            self.set_bus_mode(cs, BusMode::Single);
            self.command(8, RSTQIO as u32, cs)?;
            self.set_bus_mode(cs, BusMode::Quad);
            self.command(8, RSTQIO as u32, cs)?;
        } else {
            self.set_bus_mode(cs, mode);
            let single = mode == BusMode::Single;
            match reset_type {
                // Flash LDO cycling is done by the power driver
                1 => {}
                2 => {
                    self.command(8, 0xFF, cs)?;
                    self.command(16, 0xFFFF, cs)?;
                }
                3 => self.command(8, 0xFF, cs)?,
                4 if !single => {
                    self.command(8, MX_RESET_QPI as u32, cs)?;
                    self.sleep_us(settle);
                }
                5 => {
                    self.command(8, WREN as u32, cs)?;
                    self.command(8, 0xFF, cs)?;
                }
                6 if !single => {
                    self.command(8, RESET_ENABLE as u32, cs)?;
                    self.command(8, RESET_DEVICE as u32, cs)?;
                    self.sleep_us(settle);
                }
                7 if !single => {
                    self.command(16, 0x6699, cs)?;
                    self.command(16, 0x9966, cs)?;
                    self.sleep_us(settle);
                }
                8 | 9 => {
                    let pin = if reset_type == 8 { 13 } else { 14 };
                    if let Some(pins) = self.reset_pins.as_deref_mut() {
                        pins.drive(pin, false);
                        self.sleep_us(settle);
                        if let Some(pins) = self.reset_pins.as_deref_mut() {
                            pins.drive(pin, true);
                        }
                    } else {
                        log::warn!("reset type {} needs reset pins, none attached", reset_type);
                    }
                }
                10 => {
                    self.command(8, 0xFF, cs)?;
                    self.command(8, MX_RESET_QPI as u32, cs)?;
                }
                11 => match self.reset_commands {
                    Some(commands) => {
                        for (bits, cmd) in commands.commands() {
                            self.command(bits, cmd, cs)?;
                        }
                        self.sleep_us(commands.delay_us());
                    }
                    None => log::warn!("reset type 11 without eFUSE reset commands"),
                },
                _ => {}
            }
        }

        self.set_bus_mode(cs, BusMode::Single);
        Ok(())
    }

    /// Enter `mode` on the flash, or reset it back to single mode
    ///
    /// Only quad mode has an entry command; any other mode goes through
    /// [`reset_flash`](Self::reset_flash).
    pub fn set_flash_mode(
        &mut self,
        flash_type: FlashType,
        mode: BusMode,
        cs: ChipSelect,
    ) -> Result<()> {
        if mode == BusMode::Quad {
            let enable = match flash_type {
                FlashType::MacronixQuad => MX_ENABLE_QPI,
                FlashType::MacronixOcta => 0,
                _ => EQIO,
            };
            self.command(8, enable as u32, cs)?;
            self.set_bus_mode(cs, mode);
            Ok(())
        } else {
            self.reset_flash(cs)
        }
    }

    /// One-phase command terminated by chip select release
    pub(crate) fn command(&mut self, bits: u32, value: u32, cs: ChipSelect) -> Result<()> {
        self.write_phase(bits, value, cs)?;
        self.deassert_csn();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::testutil::{controller, data_writes as sent, retention, NoDelay};
    use crate::regs::RegisterFile;
    use std::vec::Vec;

    #[derive(Default)]
    struct Pins {
        events: Vec<(u8, bool)>,
    }

    impl ResetPins for Pins {
        fn drive(&mut self, pin: u8, high: bool) {
            self.events.push((pin, high));
        }
    }

    #[test]
    fn test_reset_type_zero_tries_single_and_quad() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.reset_flash(ChipSelect::Cs0).unwrap();
            assert_eq!(qspi.bus_mode(ChipSelect::Cs0), BusMode::Single);
        }
        assert_eq!(sent(&regs), [0xFF, 0xFF]);
    }

    #[test]
    fn test_reset_octal_macronix() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        npss.write32(BBFF_STORAGE2, 0xAB00 | (3 << 5) | (1 << 4) | 7);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.reset_flash(ChipSelect::Cs0).unwrap();
        }
        assert_eq!(sent(&regs), [0x6699, 0x9966]);
        assert_eq!(delay.total_ns, 150_000);
    }

    #[test]
    fn test_reset_skipped_in_single_mode() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        npss.write32(BBFF_STORAGE2, 6);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.reset_flash(ChipSelect::Cs1).unwrap();
        }
        assert!(sent(&regs).is_empty());
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn test_reset_pin_pulse() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let mut pins = Pins::default();
        npss.write32(BBFF_STORAGE2, 9);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.set_reset_pins(&mut pins);
            qspi.reset_flash(ChipSelect::Cs0).unwrap();
        }
        assert_eq!(pins.events, [(14, false), (14, true)]);
        assert_eq!(delay.total_ns, 50_000);
    }

    #[test]
    fn test_efuse_reset_commands() {
        // two commands: 8-bit 0x66, 16-bit 0x9966; 3 x 16 us
        let word0 = 2 | (1 << 2) | (2 << 4) | (3 << 8);
        let commands = FlashResetCommands {
            words: [word0, 0x66, 0x9966],
        };
        assert_eq!(
            commands.commands().collect::<Vec<_>>(),
            [(8, 0x66), (16, 0x9966)]
        );
        assert_eq!(commands.delay_us(), 48);

        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        npss.write32(BBFF_STORAGE2, 11);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.set_reset_commands(commands);
            qspi.reset_flash(ChipSelect::Cs0).unwrap();
        }
        assert_eq!(sent(&regs), [0x66, 0x9966]);
        assert_eq!(delay.total_ns, 48_000);
    }

    #[test]
    fn test_update_operating_mode_keeps_upper_bits() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        npss.write32(BBFF_STORAGE2, 0x1234_56FF);
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.update_operating_mode((2 << 5) | 4);
        }
        assert_eq!(npss.peek(BBFF_STORAGE2), 0x1234_5644);
    }

    #[test]
    fn test_set_flash_mode_quad_macronix() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.set_flash_mode(FlashType::MacronixQuad, BusMode::Quad, ChipSelect::Cs0)
                .unwrap();
            assert_eq!(qspi.bus_mode(ChipSelect::Cs0), BusMode::Quad);
        }
        assert_eq!(sent(&regs), [0x35]);
    }
}
