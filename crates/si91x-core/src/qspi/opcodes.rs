//! Serial NOR flash opcodes used by the driver
//!
//! Only the commands the controller sequences itself are listed; read, write
//! and erase opcodes come from [`FlashConfig`](super::FlashConfig).

// Common
/// Write enable
pub const WREN: u8 = 0x06;
/// Second byte of the 16-bit write enable
pub const WREN2: u8 = 0xF9;
/// Write disable
pub const WRDI: u8 = 0x04;
/// Second byte of the 16-bit write disable
pub const WRDI2: u8 = 0xFB;
/// Read status register
pub const RDSR: u8 = 0x05;
/// Write status register
pub const WRSR: u8 = 0x01;
/// Sector erase
pub const SECTOR_ERASE: u8 = 0x20;
/// Block erase
pub const BLOCK_ERASE: u8 = 0xD8;
/// Chip erase
pub const CHIP_ERASE: u8 = 0xC7;
/// Page program
pub const PAGE_PROGRAM: u8 = 0x02;
/// Normal read
pub const READ: u8 = 0x03;
/// Fast read
pub const FAST_READ: u8 = 0x0B;

// SST25 / SST26
/// Enable write status register
pub const EWSR: u8 = 0x50;
/// Auto address increment program
pub const AAI: u8 = 0xAF;
/// Enable quad IO
pub const EQIO: u8 = 0x38;
/// Reset quad IO
pub const RSTQIO: u8 = 0xFF;
/// Set burst (wrap length)
pub const SET_BURST: u8 = 0xC0;
/// Burst read
pub const READ_BURST: u8 = 0x0C;
/// Write block protection register
pub const WBPR: u8 = 0x42;

// Macronix
/// Enter quad mode
pub const MX_ENABLE_QPI: u8 = 0x35;
/// Exit quad mode
pub const MX_RESET_QPI: u8 = 0xF5;
/// Read configuration register (SR3 on quad parts)
pub const MX_READ_CONFIG: u8 = 0x15;
/// Write configuration register 2
pub const WCFG2: u8 = 0x72;

// Atmel
/// Write configuration register
pub const WCON: u8 = 0x3E;
/// Quad enable bit in the Atmel configuration register
pub const ATMEL_QEN: u32 = 1 << 7;

// Micron
/// Write volatile configuration register
pub const WR_VOL_CON_REG: u8 = 0x81;
/// Write enhanced volatile configuration register
pub const WR_ENHN_VOL_CON_REG: u8 = 0x61;
/// XIP disabled in the volatile configuration register
pub const DIS_XIP: u32 = 1 << 3;

// GigaDevice / Winbond / XMC
/// Read status register 2
pub const SR2_READ: u8 = 0x35;
/// Write status register 2
pub const SR2_WRITE: u8 = 0x31;
/// Quad enable bit in status register 2
pub const QUAD_EN: u32 = 1 << 1;
/// Set read parameters
pub const SET_READ_PARAMS: u8 = 0xC0;

// Adesto
/// Write status/control register
pub const STS_CTRL: u8 = 0x71;
/// Status byte 2
pub const STS_BYT2: u8 = 0x31;
/// Protect sector
pub const ADESTO_PROTECT: u8 = 0x36;
/// Unprotect sector
pub const ADESTO_UNPROTECT: u8 = 0x39;
/// Sector size walked by the Adesto protect/unprotect sequence
pub const ADESTO_SECTOR_SIZE: u32 = 256 * 1024;

// Reset sequences
/// Reset enable
pub const RESET_ENABLE: u8 = 0x66;
/// Reset device
pub const RESET_DEVICE: u8 = 0x99;
