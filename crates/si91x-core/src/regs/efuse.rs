//! eFUSE controller register definitions

/// Physical base of the eFUSE controller
pub const EFUSE_BASE: usize = 0x4000_C000;
/// Size of the register block including the memory-mapped read window
pub const EFUSE_REG_SIZE: usize = 0x900;

/// Direct-access bit address (`row << 3 | bit`)
pub const EFUSE_DA_ADDR: usize = 0x00;
/// Direct-access control set
pub const EFUSE_DA_CTRL_SET: usize = 0x04;
/// Direct-access control clear
pub const EFUSE_DA_CTRL_CLEAR: usize = 0x08;
/// Controller control
pub const EFUSE_CTRL: usize = 0x0C;
/// FSM read address
pub const EFUSE_READ_ADDR: usize = 0x10;
/// FSM read data
pub const EFUSE_READ_DATA: usize = 0x14;
/// Controller status
pub const EFUSE_STATUS: usize = 0x18;
/// Read timing parameters
pub const EFUSE_RD_TMNG_PARAM: usize = 0x1C;
/// Memory-mapped read length (byte or word)
pub const EFUSE_MEM_MAP_LENGTH: usize = 0x24;
/// Default (reset) address
pub const EFUSE_DA_ADDR_DEFAULT: usize = 0x2C;
/// Direct-access strobe clear
pub const EFUSE_DA_CLR_STROBE: usize = 0x34;
/// Memory-mapped read window, one byte of eFUSE per byte offset
pub const EFUSE_MEM_MAP_WINDOW: usize = 0x800;

// EFUSE_CTRL bits
/// Controller enable
pub const CTRL_EFUSE_ENABLE: u32 = 1 << 0;
/// Route direct-access signals to the macro
pub const CTRL_DIRECT_PATH_ENABLE: u32 = 1 << 1;

// EFUSE_DA_CTRL_SET/CLEAR bits
/// Program enable (active low)
pub const DA_PGENB: u32 = 1 << 0;
/// Chip select (active low)
pub const DA_CSB: u32 = 1 << 1;
/// Load
pub const DA_LOAD: u32 = 1 << 2;
/// Program/read strobe
pub const DA_STROBE: u32 = 1 << 3;

// EFUSE_STATUS bits
/// Controller busy
pub const STATUS_BUSY: u32 = 0x0400;
/// FSM read complete
pub const STATUS_FSM_DONE: u32 = 1 << 15;

// EFUSE_READ_ADDR bits
/// Start an FSM read
pub const READ_ADDR_DO_FSM_READ: u32 = 1 << 15;

/// Last programmable row
pub const ADDRESS_MAX: u16 = 0x31;
/// Last bit within a row
pub const BIT_POS_MAX: u8 = 7;

// EFUSE_RD_TMNG_PARAM fields, in SoC clock cycles
/// Strobe width field offset
pub const RD_TMNG_STROBE_OFF: u32 = 0;
/// Strobe width field mask (unshifted)
pub const RD_TMNG_STROBE_MASK: u32 = 0xFF;
/// Chip-select setup field offset
pub const RD_TMNG_SETUP_OFF: u32 = 8;
/// Chip-select hold field offset
pub const RD_TMNG_HOLD_OFF: u32 = 12;
/// Setup and hold field mask (unshifted)
pub const RD_TMNG_EDGE_MASK: u32 = 0xF;

/// Minimum read strobe width in nanoseconds
pub const READ_STROBE_NS: u32 = 50;
/// Minimum chip-select setup and hold time in nanoseconds
pub const READ_EDGE_NS: u32 = 10;

/// Slowest SoC clock the read timing can be derived for
pub const SOC_CLK_MIN: u32 = 1_000_000;
/// Fastest SoC clock the read timing can be derived for
pub const SOC_CLK_MAX: u32 = 180_000_000;

// EFUSE_MEM_MAP_LENGTH values
/// Byte-wide memory-mapped reads
pub const MEM_MAP_BYTE: u32 = 0;
/// 16-bit memory-mapped reads
pub const MEM_MAP_WORD: u32 = 1;
