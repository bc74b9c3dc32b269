//! ROM-or-local dispatch
//!
//! Parts of the Si91x boot ROM carry their own copy of the QSPI and eFUSE
//! drivers. Which copy a firmware image uses is a property of the target,
//! so it is described by a [`TargetProfile`] and resolved once through
//! [`qspi_api`] / [`efuse_api`]. Callers then program against the
//! [`QspiApi`] and [`EfuseApi`] traits and never care which side answers.
//!
//! ROM entry points are modelled as tables of optional function pointers.
//! An empty slot answers [`Error::RomUnavailable`].

use crate::dma::Hsize;
use crate::efuse::Efuse;
use crate::error::{Error, Result};
use crate::qspi::{
    AesMode, ChipSelect, CipherKey, EraseKind, EraseOptions, FlashConfig, Qspi, ReadOptions,
    StandaloneAes, WriteOptions,
};
use crate::window::FlashWindow;

/// Chip family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Chip {
    /// SiWx917
    #[default]
    Si917,
    /// SiWx915
    Si915,
    /// RS9116 / 9118 MCU
    Si9118,
}

/// Which peripherals are served by the boot ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TargetProfile {
    /// Chip family
    pub chip: Chip,
    /// QSPI calls go through the ROM table
    pub qspi_rom: bool,
    /// eFUSE calls go through the ROM table
    pub efuse_rom: bool,
}

impl TargetProfile {
    /// Stock profile of a chip
    ///
    /// The 9118 ROM carries both drivers. The 917 and 915 ROMs keep only the
    /// eFUSE driver in their exported table.
    pub const fn for_chip(chip: Chip) -> Self {
        match chip {
            Chip::Si9118 => Self {
                chip,
                qspi_rom: true,
                efuse_rom: true,
            },
            Chip::Si917 | Chip::Si915 => Self {
                chip,
                qspi_rom: false,
                efuse_rom: true,
            },
        }
    }
}

/// QSPI driver entry points
pub trait QspiApi {
    /// See [`Qspi::spi_init`]
    fn spi_init(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        init_flash: bool,
        delay_us: u32,
        fifo_threshold: bool,
    ) -> Result<()>;
    /// See [`Qspi::flash_init`]
    fn flash_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()>;
    /// See [`Qspi::auto_init`]
    fn auto_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig) -> Result<()>;
    /// See [`Qspi::spi_erase`]
    fn spi_erase(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        kind: EraseKind,
        addr: u32,
        opts: EraseOptions,
    ) -> Result<()>;
    /// See [`Qspi::spi_write`]; polled, without verification
    fn spi_write(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        data: &[u8],
        opts: WriteOptions,
    ) -> Result<()>;
    /// See [`Qspi::spi_read`]; polled
    fn spi_read(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        opts: ReadOptions,
        window: &mut dyn FlashWindow,
    ) -> Result<()>;
    /// See [`Qspi::flash_protection`]
    fn flash_protection(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        prot: u32,
        delay_us: u32,
    ) -> Result<()>;
    /// See [`Qspi::reset_flash`]
    fn reset_flash(&self, qspi: &mut Qspi<'_>, cs: ChipSelect) -> Result<()>;
    /// See [`Qspi::semi_auto_mode_config`]
    fn semi_auto_mode_config(
        &self,
        qspi: &mut Qspi<'_>,
        addr: u32,
        hsize: Hsize,
        bsize: u32,
        len: u32,
    ) -> Result<()>;
    /// See [`Qspi::load_key`]
    fn load_key(&self, qspi: &mut Qspi<'_>, mode: AesMode, key: &CipherKey) -> Result<()>;
    /// See [`Qspi::seg_sec_en`]
    fn seg_sec_en(&self, qspi: &mut Qspi<'_>, segment: u8, start: u32, end: u32) -> Result<()>;
    /// See [`Qspi::aes_encrypt_decrypt_standalone`]
    fn aes_standalone(
        &self,
        qspi: &mut Qspi<'_>,
        ctx: &StandaloneAes,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<()>;
}

/// eFUSE driver entry points
pub trait EfuseApi {
    /// See [`Efuse::enable`]
    fn enable(&self, efuse: &mut Efuse<'_>) -> Result<()>;
    /// See [`Efuse::disable`]
    fn disable(&self, efuse: &mut Efuse<'_>) -> Result<()>;
    /// See [`Efuse::set_address`]
    fn set_address(&self, efuse: &mut Efuse<'_>, address: u16) -> Result<()>;
    /// See [`Efuse::get_address`]
    fn get_address(&self, efuse: &mut Efuse<'_>) -> Result<u16>;
    /// See [`Efuse::write_bit`]
    fn write_bit(&self, efuse: &mut Efuse<'_>, address: u16, bit: u8, hold_us: u32) -> Result<()>;
    /// See [`Efuse::fsm_read_byte`]
    fn fsm_read_byte(&self, efuse: &mut Efuse<'_>, address: u16, soc_clk: u32) -> Result<u8>;
    /// See [`Efuse::memory_mapped_read_byte`]
    fn memory_mapped_read_byte(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u8>;
    /// See [`Efuse::memory_mapped_read_word`]
    fn memory_mapped_read_word(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u16>;
}

/// Drivers compiled into this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalImplementation;

static LOCAL: LocalImplementation = LocalImplementation;

impl QspiApi for LocalImplementation {
    fn spi_init(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        init_flash: bool,
        delay_us: u32,
        fifo_threshold: bool,
    ) -> Result<()> {
        qspi.spi_init(config, init_flash, delay_us, fifo_threshold)
    }

    fn flash_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        qspi.flash_init(config, delay_us)
    }

    fn auto_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig) -> Result<()> {
        qspi.auto_init(config)
    }

    fn spi_erase(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        kind: EraseKind,
        addr: u32,
        opts: EraseOptions,
    ) -> Result<()> {
        qspi.spi_erase(config, kind, addr, opts)
    }

    fn spi_write(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        data: &[u8],
        opts: WriteOptions,
    ) -> Result<()> {
        qspi.spi_write(config, addr, data, opts, None, None)
    }

    fn spi_read(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        opts: ReadOptions,
        window: &mut dyn FlashWindow,
    ) -> Result<()> {
        qspi.spi_read(config, addr, buf, opts, window, None)
    }

    fn flash_protection(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        prot: u32,
        delay_us: u32,
    ) -> Result<()> {
        qspi.flash_protection(config, prot, delay_us)
    }

    fn reset_flash(&self, qspi: &mut Qspi<'_>, cs: ChipSelect) -> Result<()> {
        qspi.reset_flash(cs)
    }

    fn semi_auto_mode_config(
        &self,
        qspi: &mut Qspi<'_>,
        addr: u32,
        hsize: Hsize,
        bsize: u32,
        len: u32,
    ) -> Result<()> {
        qspi.semi_auto_mode_config(addr, hsize, bsize, len)
    }

    fn load_key(&self, qspi: &mut Qspi<'_>, mode: AesMode, key: &CipherKey) -> Result<()> {
        qspi.load_key(mode, key)
    }

    fn seg_sec_en(&self, qspi: &mut Qspi<'_>, segment: u8, start: u32, end: u32) -> Result<()> {
        qspi.seg_sec_en(segment, start, end)
    }

    fn aes_standalone(
        &self,
        qspi: &mut Qspi<'_>,
        ctx: &StandaloneAes,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<()> {
        qspi.aes_encrypt_decrypt_standalone(ctx, input, output)
    }
}

impl EfuseApi for LocalImplementation {
    fn enable(&self, efuse: &mut Efuse<'_>) -> Result<()> {
        efuse.enable();
        Ok(())
    }

    fn disable(&self, efuse: &mut Efuse<'_>) -> Result<()> {
        efuse.disable();
        Ok(())
    }

    fn set_address(&self, efuse: &mut Efuse<'_>, address: u16) -> Result<()> {
        efuse.set_address(address)
    }

    fn get_address(&self, efuse: &mut Efuse<'_>) -> Result<u16> {
        Ok(efuse.get_address())
    }

    fn write_bit(&self, efuse: &mut Efuse<'_>, address: u16, bit: u8, hold_us: u32) -> Result<()> {
        efuse.write_bit(address, bit, hold_us)
    }

    fn fsm_read_byte(&self, efuse: &mut Efuse<'_>, address: u16, soc_clk: u32) -> Result<u8> {
        efuse.fsm_read_byte(address, soc_clk)
    }

    fn memory_mapped_read_byte(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u8> {
        efuse.memory_mapped_read_byte(address, soc_clk)
    }

    fn memory_mapped_read_word(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u16> {
        efuse.memory_mapped_read_word(address, soc_clk)
    }
}

/// QSPI entries exported by a boot ROM
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
#[allow(clippy::type_complexity)]
pub struct QspiRomTable {
    pub spi_init: Option<fn(&mut Qspi<'_>, &FlashConfig, bool, u32, bool) -> Result<()>>,
    pub flash_init: Option<fn(&mut Qspi<'_>, &FlashConfig, u32) -> Result<()>>,
    pub auto_init: Option<fn(&mut Qspi<'_>, &FlashConfig) -> Result<()>>,
    pub spi_erase: Option<fn(&mut Qspi<'_>, &FlashConfig, EraseKind, u32, EraseOptions) -> Result<()>>,
    pub spi_write: Option<fn(&mut Qspi<'_>, &FlashConfig, u32, &[u8], WriteOptions) -> Result<()>>,
    pub spi_read: Option<
        fn(&mut Qspi<'_>, &FlashConfig, u32, &mut [u8], ReadOptions, &mut dyn FlashWindow) -> Result<()>,
    >,
    pub flash_protection: Option<fn(&mut Qspi<'_>, &FlashConfig, u32, u32) -> Result<()>>,
    pub reset_flash: Option<fn(&mut Qspi<'_>, ChipSelect) -> Result<()>>,
    pub semi_auto_mode_config: Option<fn(&mut Qspi<'_>, u32, Hsize, u32, u32) -> Result<()>>,
    pub load_key: Option<fn(&mut Qspi<'_>, AesMode, &CipherKey) -> Result<()>>,
    pub seg_sec_en: Option<fn(&mut Qspi<'_>, u8, u32, u32) -> Result<()>>,
    pub aes_standalone: Option<fn(&mut Qspi<'_>, &StandaloneAes, &[u8], &mut [u8]) -> Result<()>>,
}

impl QspiRomTable {
    /// Table with every slot empty
    pub const EMPTY: Self = Self {
        spi_init: None,
        flash_init: None,
        auto_init: None,
        spi_erase: None,
        spi_write: None,
        spi_read: None,
        flash_protection: None,
        reset_flash: None,
        semi_auto_mode_config: None,
        load_key: None,
        seg_sec_en: None,
        aes_standalone: None,
    };
}

/// eFUSE entries exported by a boot ROM
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct EfuseRomTable {
    pub enable: Option<fn(&mut Efuse<'_>) -> Result<()>>,
    pub disable: Option<fn(&mut Efuse<'_>) -> Result<()>>,
    pub set_address: Option<fn(&mut Efuse<'_>, u16) -> Result<()>>,
    pub get_address: Option<fn(&mut Efuse<'_>) -> Result<u16>>,
    pub write_bit: Option<fn(&mut Efuse<'_>, u16, u8, u32) -> Result<()>>,
    pub fsm_read_byte: Option<fn(&mut Efuse<'_>, u16, u32) -> Result<u8>>,
    pub memory_mapped_read_byte: Option<fn(&mut Efuse<'_>, u16, u32) -> Result<u8>>,
    pub memory_mapped_read_word: Option<fn(&mut Efuse<'_>, u16, u32) -> Result<u16>>,
}

impl EfuseRomTable {
    /// Table with every slot empty
    pub const EMPTY: Self = Self {
        enable: None,
        disable: None,
        set_address: None,
        get_address: None,
        write_bit: None,
        fsm_read_byte: None,
        memory_mapped_read_byte: None,
        memory_mapped_read_word: None,
    };
}

/// Driver that forwards every call into a ROM table
#[derive(Debug, Clone, Copy)]
pub struct RomBacked<T: 'static> {
    table: &'static T,
}

impl<T: 'static> RomBacked<T> {
    /// Wrap a ROM table
    pub const fn new(table: &'static T) -> Self {
        Self { table }
    }
}

fn entry<F>(slot: Option<F>, name: &str) -> Result<F> {
    slot.ok_or_else(|| {
        log::warn!("ROM table has no entry for {}", name);
        Error::RomUnavailable
    })
}

impl QspiApi for RomBacked<QspiRomTable> {
    fn spi_init(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        init_flash: bool,
        delay_us: u32,
        fifo_threshold: bool,
    ) -> Result<()> {
        entry(self.table.spi_init, "spi_init")?(qspi, config, init_flash, delay_us, fifo_threshold)
    }

    fn flash_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig, delay_us: u32) -> Result<()> {
        entry(self.table.flash_init, "flash_init")?(qspi, config, delay_us)
    }

    fn auto_init(&self, qspi: &mut Qspi<'_>, config: &FlashConfig) -> Result<()> {
        entry(self.table.auto_init, "auto_init")?(qspi, config)
    }

    fn spi_erase(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        kind: EraseKind,
        addr: u32,
        opts: EraseOptions,
    ) -> Result<()> {
        entry(self.table.spi_erase, "spi_erase")?(qspi, config, kind, addr, opts)
    }

    fn spi_write(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        data: &[u8],
        opts: WriteOptions,
    ) -> Result<()> {
        entry(self.table.spi_write, "spi_write")?(qspi, config, addr, data, opts)
    }

    fn spi_read(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        addr: u32,
        buf: &mut [u8],
        opts: ReadOptions,
        window: &mut dyn FlashWindow,
    ) -> Result<()> {
        entry(self.table.spi_read, "spi_read")?(qspi, config, addr, buf, opts, window)
    }

    fn flash_protection(
        &self,
        qspi: &mut Qspi<'_>,
        config: &FlashConfig,
        prot: u32,
        delay_us: u32,
    ) -> Result<()> {
        entry(self.table.flash_protection, "flash_protection")?(qspi, config, prot, delay_us)
    }

    fn reset_flash(&self, qspi: &mut Qspi<'_>, cs: ChipSelect) -> Result<()> {
        entry(self.table.reset_flash, "reset_flash")?(qspi, cs)
    }

    fn semi_auto_mode_config(
        &self,
        qspi: &mut Qspi<'_>,
        addr: u32,
        hsize: Hsize,
        bsize: u32,
        len: u32,
    ) -> Result<()> {
        entry(self.table.semi_auto_mode_config, "semi_auto_mode_config")?(
            qspi, addr, hsize, bsize, len,
        )
    }

    fn load_key(&self, qspi: &mut Qspi<'_>, mode: AesMode, key: &CipherKey) -> Result<()> {
        entry(self.table.load_key, "load_key")?(qspi, mode, key)
    }

    fn seg_sec_en(&self, qspi: &mut Qspi<'_>, segment: u8, start: u32, end: u32) -> Result<()> {
        entry(self.table.seg_sec_en, "seg_sec_en")?(qspi, segment, start, end)
    }

    fn aes_standalone(
        &self,
        qspi: &mut Qspi<'_>,
        ctx: &StandaloneAes,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<()> {
        entry(self.table.aes_standalone, "aes_standalone")?(qspi, ctx, input, output)
    }
}

impl EfuseApi for RomBacked<EfuseRomTable> {
    fn enable(&self, efuse: &mut Efuse<'_>) -> Result<()> {
        entry(self.table.enable, "efuse enable")?(efuse)
    }

    fn disable(&self, efuse: &mut Efuse<'_>) -> Result<()> {
        entry(self.table.disable, "efuse disable")?(efuse)
    }

    fn set_address(&self, efuse: &mut Efuse<'_>, address: u16) -> Result<()> {
        entry(self.table.set_address, "efuse set_address")?(efuse, address)
    }

    fn get_address(&self, efuse: &mut Efuse<'_>) -> Result<u16> {
        entry(self.table.get_address, "efuse get_address")?(efuse)
    }

    fn write_bit(&self, efuse: &mut Efuse<'_>, address: u16, bit: u8, hold_us: u32) -> Result<()> {
        entry(self.table.write_bit, "efuse write_bit")?(efuse, address, bit, hold_us)
    }

    fn fsm_read_byte(&self, efuse: &mut Efuse<'_>, address: u16, soc_clk: u32) -> Result<u8> {
        entry(self.table.fsm_read_byte, "efuse fsm_read_byte")?(efuse, address, soc_clk)
    }

    fn memory_mapped_read_byte(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u8> {
        entry(self.table.memory_mapped_read_byte, "efuse memory_mapped_read_byte")?(
            efuse, address, soc_clk,
        )
    }

    fn memory_mapped_read_word(
        &self,
        efuse: &mut Efuse<'_>,
        address: u16,
        soc_clk: u32,
    ) -> Result<u16> {
        entry(self.table.memory_mapped_read_word, "efuse memory_mapped_read_word")?(
            efuse, address, soc_clk,
        )
    }
}

/// QSPI driver selected by `profile`
pub fn qspi_api<'r>(profile: &TargetProfile, rom: &'r RomBacked<QspiRomTable>) -> &'r dyn QspiApi {
    if profile.qspi_rom {
        log::debug!("{:?}: QSPI through ROM", profile.chip);
        rom
    } else {
        &LOCAL
    }
}

/// eFUSE driver selected by `profile`
pub fn efuse_api<'r>(
    profile: &TargetProfile,
    rom: &'r RomBacked<EfuseRomTable>,
) -> &'r dyn EfuseApi {
    if profile.efuse_rom {
        log::debug!("{:?}: eFUSE through ROM", profile.chip);
        rom
    } else {
        &LOCAL
    }
}
