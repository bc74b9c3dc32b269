//! Vendor-specific flash initialisation
//!
//! Each flash family needs a different handful of register writes before
//! quad or octal reads work: a quad-enable bit, a dummy-cycle setting, a QPI
//! entry command. Those sequences are [`FamilyInitializer`] strategies looked
//! up by [`FlashType`] in a [`FamilyRegistry`].
//!
//! A flash type without a registry entry is left untouched.

mod adesto;
mod atmel;
mod issi;
mod macronix;
mod micron;
mod winbond;

pub use adesto::{AdestoOcta, AdestoQuad};
pub use atmel::AtmelQuad;
pub use issi::Issi;
pub use macronix::{MacronixOcta, MacronixQuad};
pub use micron::Micron;
pub use winbond::{Winbond, Xmc};

use super::config::{BusMode, FlashConfig, FlashType};
use super::Qspi;
use crate::error::{Error, Result};

/// Maximum number of families a registry can hold
pub const MAX_FAMILIES: usize = 16;

/// Initialisation sequence for one flash family
pub trait FamilyInitializer: Sync {
    /// Bring the flash described by `config` into the configured modes
    ///
    /// Runs after the flash has been reset to single mode.
    fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()>;
}

/// SST parts: nothing beyond the shared reset
pub struct Sst;

impl FamilyInitializer for Sst {
    fn init(&self, _qspi: &mut Qspi<'_>, _config: &FlashConfig, _delay_us: u32) -> Result<()> {
        Ok(())
    }
}

/// Flash type to initializer map
pub struct FamilyRegistry {
    entries: heapless::Vec<(FlashType, &'static dyn FamilyInitializer), MAX_FAMILIES>,
}

impl FamilyRegistry {
    /// Empty registry
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Registry with every supported family
    pub fn standard() -> Self {
        let table: [(FlashType, &'static dyn FamilyInitializer); 13] = [
            (FlashType::SstSpi, &Sst),
            (FlashType::SstDual, &Sst),
            (FlashType::SstQuad, &Sst),
            (FlashType::AtmelQuad, &AtmelQuad),
            (FlashType::MacronixQuad, &MacronixQuad),
            (FlashType::MacronixOcta, &MacronixOcta),
            (FlashType::MicronQuad, &Micron),
            (FlashType::WinbondQuad, &Winbond),
            (FlashType::GigaDevice, &Winbond),
            (FlashType::AdestoQuad, &AdestoQuad),
            (FlashType::AdestoOcta, &AdestoOcta),
            (FlashType::Issi, &Issi),
            (FlashType::Xmc, &Xmc),
        ];
        let mut registry = Self::new();
        for (flash_type, init) in table {
            // The table is smaller than the capacity
            let _ = registry.entries.push((flash_type, init));
        }
        registry
    }

    /// Add or replace the initializer for `flash_type`
    ///
    /// Fails with [`Error::InvalidParameters`] when the registry is full.
    pub fn register(
        &mut self,
        flash_type: FlashType,
        init: &'static dyn FamilyInitializer,
    ) -> Result<()> {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == flash_type) {
            entry.1 = init;
            return Ok(());
        }
        self.entries
            .push((flash_type, init))
            .map_err(|_| Error::InvalidParameters)
    }

    /// Initializer registered for `flash_type`
    pub fn get(&self, flash_type: FlashType) -> Option<&'static dyn FamilyInitializer> {
        self.entries
            .iter()
            .find(|(t, _)| *t == flash_type)
            .map(|(_, init)| *init)
    }

    /// Number of registered families
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Qspi<'_> {
    /// Run the family initialisation for `config.flash_type`
    pub fn flash_init(&mut self, config: &FlashConfig, delay_us: u32) -> Result<()> {
        self.flash_init_with(&FamilyRegistry::standard(), config, delay_us)
    }

    /// [`flash_init`](Self::flash_init) against a caller-built registry
    ///
    /// The flash is reset to single mode and the operating mode recorded
    /// before the family sequence runs. Unregistered types return `Ok(())`
    /// without touching a register.
    pub fn flash_init_with(
        &mut self,
        registry: &FamilyRegistry,
        config: &FlashConfig,
        delay_us: u32,
    ) -> Result<()> {
        let Some(family) = registry.get(config.flash_type) else {
            log::warn!(
                "no initializer for flash type {:?}, leaving flash as is",
                config.flash_type
            );
            return Ok(());
        };

        log::debug!("initialising {:?} flash on {:?}", config.flash_type, config.cs_no);
        self.set_flash_mode(config.flash_type, BusMode::Single, config.cs_no)?;
        let op = (config.inst_mode.code() << 5) | config.reset_type.bits();
        self.update_operating_mode(op as u8);

        family.init(self, config, delay_us)
    }
}

/// Read-parameter byte for the dummy count used by GigaDevice, Winbond and
/// XMC parts in QPI mode
pub(crate) fn qpi_read_params(config: &FlashConfig, allow_two: bool) -> u32 {
    match config.dummy_bytes as u32 + config.extra_byte_en as u32 {
        4 => 3 << 4,
        3 => 2 << 4,
        2 if allow_two => 1 << 4,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qspi::config::{ChipSelect, Protection, ResetType};
    use crate::qspi::testutil::{controller, data_writes, retention, NoDelay};
    use crate::regs::qspi::BBFF_STORAGE2;

    struct Marker;

    impl FamilyInitializer for Marker {
        fn init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, _delay_us: u32) -> Result<()> {
            qspi.write_phase(8, 0xA5, config.cs_no)
        }
    }

    #[test]
    fn test_unknown_type_touches_nothing() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            flash_type: FlashType::Other(42),
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 10).unwrap();
        }
        assert!(regs.log.is_empty());
        assert!(npss.log.is_empty());
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn test_eon_is_not_registered() {
        let registry = FamilyRegistry::standard();
        assert!(registry.get(FlashType::EonQuad).is_none());
        assert!(registry.get(FlashType::GigaDevice).is_some());
        assert_eq!(registry.len(), 13);
    }

    #[test]
    fn test_prologue_resets_and_records_mode() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            flash_type: FlashType::SstQuad,
            inst_mode: BusMode::Quad,
            reset_type: ResetType {
                kind: 3,
                long_delay: true,
            },
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 0).unwrap();
            assert_eq!(qspi.bus_mode(ChipSelect::Cs0), BusMode::Single);
        }
        // type 0 reset from the blank retention word
        assert_eq!(data_writes(&regs), [0xFF, 0xFF]);
        assert_eq!(npss.peek(BBFF_STORAGE2), (2 << 5) | (1 << 4) | 3);
    }

    #[test]
    fn test_sst_init_only_resets() {
        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            flash_type: FlashType::SstQuad,
            protection: Protection::Enable,
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init(&config, 5).unwrap();
        }
        assert_eq!(data_writes(&regs), [0xFF, 0xFF]);
    }

    #[test]
    fn test_custom_family() {
        static MARKER: Marker = Marker;
        let mut registry = FamilyRegistry::new();
        assert!(registry.is_empty());
        registry.register(FlashType::Other(0x40), &MARKER).unwrap();
        registry.register(FlashType::Other(0x40), &MARKER).unwrap();
        assert_eq!(registry.len(), 1);

        let mut regs = controller();
        let mut npss = retention();
        let mut delay = NoDelay::default();
        let config = FlashConfig {
            flash_type: FlashType::Other(0x40),
            ..Default::default()
        };
        {
            let mut qspi = Qspi::new(&mut regs, &mut npss, &mut delay);
            qspi.flash_init_with(&registry, &config, 0).unwrap();
        }
        assert_eq!(data_writes(&regs).last(), Some(&0xA5));
    }

    #[test]
    fn test_registry_capacity() {
        static MARKER: Marker = Marker;
        let mut registry = FamilyRegistry::new();
        for code in 0..MAX_FAMILIES as u8 {
            registry
                .register(FlashType::Other(0x80 + code), &MARKER)
                .unwrap();
        }
        assert_eq!(
            registry.register(FlashType::Other(0x20), &MARKER),
            Err(Error::InvalidParameters)
        );
    }
}
