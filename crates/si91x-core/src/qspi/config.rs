//! Per-chip-select flash configuration
//!
//! [`FlashConfig`] is built once when a flash is attached and only read
//! afterwards. Every QSPI operation takes it by reference.

/// Bus width of one transaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusMode {
    /// 1 data line
    #[default]
    Single,
    /// 2 data lines
    Dual,
    /// 4 data lines
    Quad,
    /// 8 data lines
    Octa,
}

impl BusMode {
    /// Hardware encoding
    pub const fn code(self) -> u32 {
        match self {
            Self::Single => 0,
            Self::Dual => 1,
            Self::Quad => 2,
            Self::Octa => 3,
        }
    }

    /// Decode a 2-bit hardware field
    pub const fn from_code(code: u32) -> Self {
        match code & 0x3 {
            0 => Self::Single,
            1 => Self::Dual,
            2 => Self::Quad,
            _ => Self::Octa,
        }
    }

    /// Number of data lines
    pub const fn lines(self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
            Self::Octa => 8,
        }
    }
}

/// Chip select driven by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChipSelect {
    /// CSN0
    #[default]
    Cs0,
    /// CSN1
    Cs1,
    /// CSN2
    Cs2,
    /// CSN3
    Cs3,
}

impl ChipSelect {
    /// All chip selects in order
    pub const ALL: [ChipSelect; 4] = [Self::Cs0, Self::Cs1, Self::Cs2, Self::Cs3];

    /// Index 0..=3
    pub const fn index(self) -> u8 {
        match self {
            Self::Cs0 => 0,
            Self::Cs1 => 1,
            Self::Cs2 => 2,
            Self::Cs3 => 3,
        }
    }

    /// Position of the D3/D2 line default field in QSPI_BUS_MODE
    pub const fn d3d2_pos(self) -> u32 {
        match self {
            Self::Cs0 => 10,
            Self::Cs1 => 14,
            Self::Cs2 => 26,
            Self::Cs3 => 30,
        }
    }

    /// Position of the D7..D4 line default field in OCTA_SPI_BUS_CONTROLLER
    pub const fn d7d4_pos(self) -> u32 {
        self.index() as u32 * 8
    }
}

/// Flash vendor family, by its hardware type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlashType {
    /// SST25 single-bit
    SstSpi,
    /// SST dual
    SstDual,
    /// SST26 quad
    SstQuad,
    /// Winbond quad
    WinbondQuad,
    /// Atmel quad
    AtmelQuad,
    /// Macronix quad
    MacronixQuad,
    /// EON quad
    EonQuad,
    /// Micron quad
    MicronQuad,
    /// GigaDevice quad
    GigaDevice,
    /// Macronix octal
    MacronixOcta,
    /// Adesto octal
    AdestoOcta,
    /// Adesto quad
    AdestoQuad,
    /// ISSI
    Issi,
    /// XMC
    Xmc,
    /// Any other type code; configured out of band
    Other(u8),
}

impl FlashType {
    /// Hardware type code
    pub const fn code(self) -> u8 {
        match self {
            Self::SstSpi => 0,
            Self::SstDual => 1,
            Self::SstQuad => 2,
            Self::WinbondQuad => 3,
            Self::AtmelQuad => 4,
            Self::MacronixQuad => 5,
            Self::EonQuad => 6,
            Self::MicronQuad => 7,
            Self::GigaDevice => 8,
            Self::MacronixOcta => 9,
            Self::AdestoOcta => 10,
            Self::AdestoQuad => 11,
            Self::Issi => 12,
            Self::Xmc => 13,
            Self::Other(code) => code,
        }
    }

    /// Decode a hardware type code
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::SstSpi,
            1 => Self::SstDual,
            2 => Self::SstQuad,
            3 => Self::WinbondQuad,
            4 => Self::AtmelQuad,
            5 => Self::MacronixQuad,
            6 => Self::EonQuad,
            7 => Self::MicronQuad,
            8 => Self::GigaDevice,
            9 => Self::MacronixOcta,
            10 => Self::AdestoOcta,
            11 => Self::AdestoQuad,
            12 => Self::Issi,
            13 => Self::Xmc,
            other => Self::Other(other),
        }
    }
}

/// Address width of the flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressWidth {
    /// 8-bit
    Bits8,
    /// 9-bit; A8 travels in bit 3 of the read command
    Bits9,
    /// 16-bit
    Bits16,
    /// 24-bit
    #[default]
    Bits24,
    /// 32-bit
    Bits32,
}

impl AddressWidth {
    /// Hardware encoding
    pub const fn code(self) -> u32 {
        match self {
            Self::Bits8 => 0,
            Self::Bits9 => 1,
            Self::Bits16 => 2,
            Self::Bits24 => 3,
            Self::Bits32 => 4,
        }
    }

    /// Length of the manual-mode address phase in bits
    ///
    /// The hardware code doubles as a byte count, so 9-bit addressing sends
    /// a single byte here and A8 is folded into the command.
    pub const fn phase_bits(self) -> u32 {
        match self {
            Self::Bits8 => 8,
            other => other.code() * 8,
        }
    }

    /// Mask applied to every address before it reaches the bus
    ///
    /// 32-bit addressing is limited to the 26-bit window unless the caller
    /// asks for the full range.
    pub const fn mask(self, full_32bit: bool) -> u32 {
        match self {
            Self::Bits32 if full_32bit => u32::MAX,
            Self::Bits32 => 0x03FF_FFFF,
            other => (1u32 << (other.code() * 8)) - 1,
        }
    }
}

/// Whether dummy cycles are clocked as reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DummyDirection {
    /// Read and discard
    Reads,
    /// Drive zeros
    #[default]
    Writes,
}

/// Write protection requested at init
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protection {
    /// Leave the current protection
    #[default]
    Leave,
    /// Remove protection
    Remove,
    /// Enable protection
    Enable,
}

/// Full-duplex bit handling at init
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FullDuplex {
    /// Clear the bit
    Disable,
    /// Set the bit
    Enable,
    /// Do not touch it
    #[default]
    Leave,
}

/// Second opcode bytes for parts that take 16-bit commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command16 {
    /// Low byte sent after the read command
    pub read_msb: u8,
    /// Low byte sent after the write command
    pub write_msb: u8,
}

/// Flash reset strategy recorded in the retention register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResetType {
    /// Reset kind 0..=11
    pub kind: u8,
    /// Use the long (150 us) post-reset delay
    pub long_delay: bool,
}

impl ResetType {
    /// Low nibble plus delay flag, as stored in the retention register
    pub const fn bits(self) -> u32 {
        (self.kind as u32 & 0xF) | if self.long_delay { 1 << 4 } else { 0 }
    }
}

/// Complete configuration for one attached flash
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlashConfig {
    /// Vendor family
    pub flash_type: FlashType,
    /// Chip select
    pub cs_no: ChipSelect,
    /// Address width
    pub addr_width: AddressWidth,

    // Read path bus modes
    /// Instruction phase
    pub inst_mode: BusMode,
    /// Address phase
    pub addr_mode: BusMode,
    /// Data phase
    pub data_mode: BusMode,
    /// Dummy phase
    pub dummy_mode: BusMode,
    /// Extra (mode) byte phase
    pub extra_byte_mode: BusMode,

    // Write path bus modes
    /// Write instruction phase
    pub wr_inst_mode: BusMode,
    /// Write address phase
    pub wr_addr_mode: BusMode,
    /// Write data phase
    pub wr_data_mode: BusMode,

    // Dummy cycles
    /// Dummy bytes (low nibble)
    pub dummy_bytes: u8,
    /// Dummy bytes (high nibble)
    pub ms_dummy_bytes: u8,
    /// Extra cycles the controller needs after the flash dummies
    pub dummy_cycles_for_controller: u8,
    /// How dummy cycles are clocked
    pub dummy_direction: DummyDirection,
    /// Dummy bytes after a status read command in quad/octal mode
    pub dummy_bytes_for_rdsr: u8,
    /// Dummy bytes during wrap reads
    pub dummy_bytes_wrap: u8,
    /// Dummy bytes for jump reads
    pub dummys_4_jump: u8,

    // Read behaviour
    /// Continuous read mode
    pub continuous: bool,
    /// Send the extra (mode) byte after the address
    pub extra_byte_en: bool,
    /// Wrap-burst length code, `None` for no wrap
    pub wrap_len: Option<u8>,
    /// Double data rate
    pub ddr_mode_en: bool,
    /// Execute-in-place
    pub xip_mode: bool,
    /// High performance mode (Macronix)
    pub high_perf_mode_en: bool,

    // Dual flash
    /// Two flashes side by side as one channel
    pub dual_flash_mode: bool,
    /// Secondary chip select in dual-flash mode
    pub secondary_csn: u8,

    // Opcodes
    /// Read command
    pub read_cmd: u8,
    /// 16-bit two-part commands, if the part uses them
    pub cmd_16bit: Option<Command16>,
    /// Page program command
    pub wr_cmd: u8,
    /// Sector erase
    pub sector_erase_cmd: u16,
    /// Block erase
    pub block_erase_cmd: u16,
    /// Chip erase
    pub chip_erase_cmd: u16,
    /// Status read (high byte used on an 8-bit bus when 16-bit commands apply)
    pub status_reg_read_cmd: u16,
    /// Status write
    pub status_reg_write_cmd: u16,

    // Status and protection
    /// Busy bit position in the status register
    pub busy_bit_pos: u8,
    /// Number of valid block protection bits
    pub valid_prot_bits: u8,
    /// Protect from top/bottom (Macronix)
    pub prot_top_bottom: bool,
    /// Protection requested at init
    pub protection: Protection,
    /// Reset strategy
    pub reset_type: ResetType,

    // Controller
    /// Enable auto (memory-mapped) mode after init
    pub auto_mode: bool,
    /// Prefetch in auto mode
    pub prefetch_en: bool,
    /// Stream read data through DMA
    pub dma_mode: bool,
    /// Stream write data through DMA
    pub dma_write: bool,
    /// Byte swap read data
    pub swap_en: bool,
    /// Word swap in auto mode
    pub word_swap_en: bool,
    /// Full duplex handling
    pub full_duplex: FullDuplex,
    /// Sample on the negative edge
    pub neg_edge_sampling: bool,
    /// QSPI clock enable
    pub clk_en: bool,
    /// Clock polarity mode 3
    pub polarity_mode: bool,
    /// Loopback
    pub loop_back_en: bool,
    /// Continue fetch in auto mode
    pub continue_fetch_en: bool,
    /// Auto-mode chip select chosen by address
    pub auto_csn_based_addr_en: bool,
    /// Idle levels for D3/D2
    pub d3d2_data: u8,
    /// Idle levels for D7..D4
    pub d7_d4_data: u8,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            flash_type: FlashType::Other(0xFF),
            cs_no: ChipSelect::Cs0,
            addr_width: AddressWidth::Bits24,
            inst_mode: BusMode::Single,
            addr_mode: BusMode::Single,
            data_mode: BusMode::Single,
            dummy_mode: BusMode::Single,
            extra_byte_mode: BusMode::Single,
            wr_inst_mode: BusMode::Single,
            wr_addr_mode: BusMode::Single,
            wr_data_mode: BusMode::Single,
            dummy_bytes: 0,
            ms_dummy_bytes: 0,
            dummy_cycles_for_controller: 0,
            dummy_direction: DummyDirection::Writes,
            dummy_bytes_for_rdsr: 0,
            dummy_bytes_wrap: 0,
            dummys_4_jump: 0,
            continuous: false,
            extra_byte_en: false,
            wrap_len: None,
            ddr_mode_en: false,
            xip_mode: false,
            high_perf_mode_en: false,
            dual_flash_mode: false,
            secondary_csn: 0,
            read_cmd: 0x03,
            cmd_16bit: None,
            wr_cmd: 0x02,
            sector_erase_cmd: 0x20,
            block_erase_cmd: 0xD8,
            chip_erase_cmd: 0xC7,
            status_reg_read_cmd: 0x05,
            status_reg_write_cmd: 0x01,
            busy_bit_pos: 0,
            valid_prot_bits: 4,
            prot_top_bottom: false,
            protection: Protection::Leave,
            reset_type: ResetType::default(),
            auto_mode: false,
            prefetch_en: false,
            dma_mode: false,
            dma_write: false,
            swap_en: false,
            word_swap_en: false,
            full_duplex: FullDuplex::Leave,
            neg_edge_sampling: false,
            clk_en: true,
            polarity_mode: false,
            loop_back_en: false,
            continue_fetch_en: false,
            auto_csn_based_addr_en: false,
            d3d2_data: 3,
            d7_d4_data: 0xF,
        }
    }
}

impl FlashConfig {
    /// Combined dummy byte count (`ms << 4 | ls`)
    pub fn dummy_count(&self) -> u32 {
        self.dummy_bytes as u32 | ((self.ms_dummy_bytes as u32) << 4)
    }

    /// Wrap code as programmed into the flash (7 means no wrap)
    pub fn wrap_code(&self) -> u32 {
        self.wrap_len.map_or(7, |len| len as u32 & 0x7)
    }

    /// Mask `addr` to the configured address width
    pub fn mask_address(&self, addr: u32, full_32bit: bool) -> u32 {
        addr & self.addr_width.mask(full_32bit)
    }

    /// Whether 16-bit two-part commands are in use
    pub fn uses_16bit_cmd(&self) -> bool {
        self.cmd_16bit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_idempotent() {
        let widths = [
            AddressWidth::Bits8,
            AddressWidth::Bits9,
            AddressWidth::Bits16,
            AddressWidth::Bits24,
            AddressWidth::Bits32,
        ];
        for width in widths {
            let config = FlashConfig {
                addr_width: width,
                ..Default::default()
            };
            for addr in [0u32, 0x1F3, 0x00AB_CDEF, 0xFFFF_FFFF, 0x1234_5678] {
                let once = config.mask_address(addr, false);
                assert_eq!(config.mask_address(once, false), once);
            }
        }
    }

    #[test]
    fn test_mask_values() {
        assert_eq!(AddressWidth::Bits24.mask(false), 0x00FF_FFFF);
        assert_eq!(AddressWidth::Bits16.mask(false), 0xFFFF);
        assert_eq!(AddressWidth::Bits8.mask(false), 0xFF);
        assert_eq!(AddressWidth::Bits32.mask(false), 0x03FF_FFFF);
        assert_eq!(AddressWidth::Bits32.mask(true), u32::MAX);
    }

    #[test]
    fn test_phase_bits() {
        assert_eq!(AddressWidth::Bits8.phase_bits(), 8);
        assert_eq!(AddressWidth::Bits9.phase_bits(), 8);
        assert_eq!(AddressWidth::Bits24.phase_bits(), 24);
        assert_eq!(AddressWidth::Bits32.phase_bits(), 32);
    }

    #[test]
    fn test_flash_type_codes() {
        for code in 0..=20u8 {
            assert_eq!(FlashType::from_code(code).code(), code);
        }
        assert_eq!(FlashType::from_code(9), FlashType::MacronixOcta);
    }

    #[test]
    fn test_dummy_count_and_wrap() {
        let config = FlashConfig {
            dummy_bytes: 4,
            ms_dummy_bytes: 1,
            wrap_len: Some(3),
            ..Default::default()
        };
        assert_eq!(config.dummy_count(), 0x14);
        assert_eq!(config.wrap_code(), 3);
        assert_eq!(FlashConfig::default().wrap_code(), 7);
    }
}
