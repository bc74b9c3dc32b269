//! QSPI controller register definitions
//!
//! Offsets follow the SI917 register block. Bit definitions that the driver
//! tests as a group are `bitflags` types; single-purpose bits and fields are
//! plain constants.

use bitflags::bitflags;

/// Physical base of the M4 QSPI controller
pub const QSPI_BASE: usize = 0x1200_0000;
/// Size of the register block
pub const QSPI_REG_SIZE: usize = 0x200;

// ============================================================================
// Register offsets
// ============================================================================

/// Clock configuration
pub const QSPI_CLK_CONFIG: usize = 0x00;
/// Global bus mode (cs0 width, auto mode, wrap, prefetch)
pub const QSPI_BUS_MODE: usize = 0x04;
/// Auto-mode control config 1 for cs0 (cs1 is 12 words higher)
pub const QSPI_AUTO_CTRL_CONFIG_1: usize = 0x08;
/// Auto-mode control config 2 for cs0 (cs1 is 12 words higher)
pub const QSPI_AUTO_CTRL_CONFIG_2: usize = 0x0C;
/// Manual-mode config: triggers, read count, chip select
pub const QSPI_MANUAL_CONFIG: usize = 0x10;
/// Manual-mode config 2: per-cs bus width, swap, loopback
pub const QSPI_MANUAL_CONFIG_2: usize = 0x14;
/// FIFO almost-full/almost-empty thresholds
pub const QSPI_FIFO_THRESHOLD: usize = 0x1C;
/// Controller status
pub const QSPI_STATUS: usize = 0x20;
/// Manual-mode read/write data port
pub const QSPI_MANUAL_RD_WR_DATA: usize = 0x40;
/// Manual-mode write length in bits
pub const QSPI_MANUAL_WRITE_DATA_2: usize = 0x80;
/// Auto-mode config 3 for cs0
pub const QSPI_AUTO_CONFIG3: usize = 0x90;
/// Auto-mode config 3 for cs1
pub const QSPI_AUTO_CONFIG3_CSN1: usize = 0x94;
/// Octal bus controller (D7..D4 line defaults)
pub const OCTA_SPI_BUS_CONTROLLER: usize = 0xB0;
/// Auto-mode base address unmask for cs0
pub const QSPI_AUTO_BASE_ADDR_UNMASK_CSN0: usize = 0xB4;
/// Octal bus controller 2 (dual flash, security enables)
pub const OCTA_SPI_BUS_CONTROLLER2: usize = 0xC4;
/// AES engine configuration
pub const QSPI_AES_CONFIG: usize = 0xC8;
/// AES key and IV valid bits
pub const QSPI_AES_KEY_IV_VALID: usize = 0xCC;
/// Lockbox data word 0..3
pub const QSPI_AES_LB_DATA_0_3: usize = 0xD4;
/// Lockbox data word 4..7
pub const QSPI_AES_LB_DATA_4_7: usize = 0xD8;
/// Lockbox data word 8..B
pub const QSPI_AES_LB_DATA_8_B: usize = 0xDC;
/// Lockbox data word C..F
pub const QSPI_AES_LB_DATA_C_F: usize = 0xE0;
/// Secure segment address pairs (4 segments x start/end)
pub const QSPI_AES_SEC_SEG_ADDR: usize = 0xE4;
/// Semi-auto mode start address
pub const QSPI_SEMI_AUTO_ADDR: usize = 0x11C;
/// Semi-auto mode config (hsize, burst size)
pub const QSPI_SEMI_AUTO_MODE_CONFIG: usize = 0x120;
/// Semi-auto mode config 2 (length, enable)
pub const QSPI_SEMI_AUTO_MODE_CONFIG2: usize = 0x124;
/// Keyholder key load control
pub const QSPI_AES_SEC_KEY_FRM_KH: usize = 0x12C;
/// Auto-mode continue-fetch control
pub const QSPI_AUTO_CONTINUE_FETCH_CTRL: usize = 0x130;
/// First AES key-1 word; key-1 occupies eight consecutive words
pub const QSPI_AES_KEY1_0_3: usize = 0x134;
/// First AES key-2 word; key-2 occupies eight consecutive words
pub const QSPI_AES_KEY2_0_3: usize = 0x154;
/// AES IV word 0 (flash byte address for inline decryption)
pub const QSPI_AES_IV1_0_3: usize = 0x174;
/// Lockbox handshake status
pub const QSPI_LB_STATUS: usize = 0x184;

/// Distance between the cs0 and cs1 auto-mode control registers
pub const AUTO_CTRL_CS_STRIDE: usize = 12 * 4;

/// Auto-mode memory window for cs0
pub const QSPI_AUTOM_CHIP0_ADDRESS: u32 = 0x0800_0000;
/// Auto-mode memory window for cs1..cs3
pub const QSPI_AUTOM_CHIP1_ADDRESS: u32 = 0x0900_0000;

// ============================================================================
// QSPI_STATUS bits
// ============================================================================

bitflags! {
    /// QSPI_STATUS register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Manual transaction in progress
        const BUSY = 1 << 0;
        /// Read FIFO has no data
        const FIFO_EMPTY_RFIFO = 1 << 7;
        /// Auto-mode FSM idle
        const AUTO_MODE_FSM_IDLE = 1 << 10;
        /// Auto mode currently selected
        const AUTO_MODE = 1 << 11;
        /// Auto mode enabled (mirrors BUS_MODE.AUTO_MODE once it takes effect)
        const AUTO_MODE_ENABLED = 1 << 12;
        /// Mode switching is under hardware control
        const HW_CTRLD_MODE = 1 << 14;
    }
}

// ============================================================================
// QSPI_BUS_MODE bits
// ============================================================================

bitflags! {
    /// QSPI_BUS_MODE register flags (bus width field excluded)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusModeFlags: u32 {
        /// Prefetch in auto mode
        const PREFETCH_EN = 1 << 4;
        /// Wrap-burst reads in auto mode
        const WRAP_EN = 1 << 5;
        /// Hardware auto mode
        const AUTO_MODE = 1 << 6;
        /// Auto mode chip select chosen by address
        const AUTO_CSN_BASED_ADDR = 1 << 7;
    }
}

/// cs0 bus width field in QSPI_BUS_MODE
pub const BUS_MODE_WIDTH_OFF: u32 = 1;
/// cs0 bus width field mask
pub const BUS_MODE_WIDTH: u32 = 0x3 << BUS_MODE_WIDTH_OFF;
/// Negative edge sampling
pub const BUS_MODE_NEG_EDGE: u32 = 1 << 16;

// ============================================================================
// QSPI_CLK_CONFIG / QSPI_FIFO_THRESHOLD
// ============================================================================

/// Clock divider enable field
pub const CLK_CONFIG_CLK_EN_OFF: u32 = 8;
/// Clock polarity (SPI mode 3)
pub const CLK_CONFIG_POLARITY: u32 = 1 << 20;
/// Controller clock running
pub const CLK_CONFIG_ENABLE: u32 = 1 << 0;

/// Almost-full and almost-empty FIFO thresholds
pub const FIFO_THRESHOLDS: u32 = (3 << 4) | 3;

// ============================================================================
// QSPI_MANUAL_CONFIG bits
// ============================================================================

/// Chip select deasserted
pub const MANUAL_CSN_ACTIVE: u32 = 1 << 0;
/// Start a manual write
pub const MANUAL_WRITE_TRIGGER: u32 = 1 << 1;
/// Start a manual read
pub const MANUAL_READ_TRIGGER: u32 = 1 << 2;
/// Low read count field offset
pub const MANUAL_RD_CNT_OFF: u32 = 3;
/// Chip select field offset
pub const MANUAL_CSN_SELECT_OFF: u32 = 13;
/// Read word size (hsize) field offset
pub const MANUAL_HSIZE_OFF: u32 = 19;
/// Take the read length from the register instead of the previous value
pub const MANUAL_TAKE_LEN_FRM_REG: u32 = 1 << 21;
/// Full duplex
pub const MANUAL_FULL_DUPLEX_EN: u32 = 1 << 22;
/// Hardware controls mode switching
pub const MANUAL_HW_CTRL_MODE: u32 = 1 << 25;
/// High read count field offset
pub const MANUAL_RD_CNT_HI_OFF: u32 = 27;

/// Bits rewritten on every manual write trigger
pub const MANUAL_WRITE_CLEAR: u32 = 0x6007 | MANUAL_TAKE_LEN_FRM_REG;
/// Bits rewritten on every manual read trigger
pub const MANUAL_READ_CLEAR: u32 = 0xF838_7FFF;
/// Bits cleared to deassert chip select
pub const MANUAL_DEASSERT_CLEAR: u32 = 0x1FFF;
/// Read-count and trigger bits cleared before a bus width change
pub const MANUAL_BUS_SWITCH_CLEAR: u32 = 0x1FFE;

// ============================================================================
// QSPI_MANUAL_CONFIG_2 bits
// ============================================================================

/// Per-cs bus width field base (cs1 at bit 8, cs2 at 10, cs3 at 12)
pub const MANUAL2_CS_WIDTH_OFF: u32 = 8;
/// Per-cs byte swap base (swap bit for cs N is at 4 + N)
pub const MANUAL2_SWAP_OFF: u32 = 4;
/// Loopback
pub const MANUAL2_LOOP_BACK_EN: u32 = 1 << 14;

// ============================================================================
// QSPI_AUTO_CONFIG3 / AUTO_CTRL bits
// ============================================================================

/// Dummy count is in bits rather than bytes
pub const AUTO3_DUMMY_BIT_MODE: u32 = 1 << 0;
/// 16-bit read command
pub const AUTO3_CMD_SIZE_16BIT: u32 = 1 << 18;
/// 32-bit auto-mode addressing
pub const AUTO3_ADR_SIZE_32BIT: u32 = 1 << 19;
/// Word swap
pub const AUTO3_WORD_SWAP_EN: u32 = 1 << 20;
/// MSB byte of a 16-bit read command
pub const AUTO3_RD_INST_MSB_OFF: u32 = 24;

/// High nibble of the dummy count
pub const AUTO3_MS_DUMMY_OFF: u32 = 1;

/// Byte-swap read data in auto mode
pub const AUTO2_RD_SWAP: u32 = 1 << 0;
/// Address width select
pub const AUTO2_ADDR_WIDTH_OFF: u32 = 1;
/// Continuous read mode
pub const AUTO2_CONTINUOUS_OFF: u32 = 2;
/// Dummy cycles clocked as writes
pub const AUTO2_DUMMY_WRITES_OFF: u32 = 3;
/// Dummy byte count for jump reads
pub const AUTO2_JUMP_DUMMY_OFF: u32 = 4;
/// Read command
pub const AUTO2_READ_CMD_OFF: u32 = 8;
/// Command used for wrap reads
pub const AUTO2_WRAP_CMD_OFF: u32 = 16;

/// Extra byte bus mode
pub const AUTO1_EXTRA_MODE_OFF: u32 = 0;
/// Dummy phase bus mode
pub const AUTO1_DUMMY_MODE_OFF: u32 = 2;
/// Address phase bus mode
pub const AUTO1_ADDR_MODE_OFF: u32 = 4;
/// Instruction phase bus mode
pub const AUTO1_INST_MODE_OFF: u32 = 6;
/// Data phase bus mode
pub const AUTO1_DATA_MODE_OFF: u32 = 8;
/// Extra (mode) byte value
pub const AUTO1_EXTRA_BYTE_OFF: u32 = 10;
/// Extra (mode) byte after the address
pub const AUTO1_EXTRA_BYTE_EN: u32 = 1 << 18;
/// Low nibble of the dummy count
pub const AUTO1_DUMMY_OFF: u32 = 24;
/// Dummy bytes for wrap reads
pub const AUTO1_WRAP_DUMMY_OFF: u32 = 28;

/// Address compare mask for chip select decoding in auto mode
pub const AUTO_BASE_ADDR_UNMASK: u32 = 0xFC00_0000;

/// Continue fetch across sequential auto-mode reads
pub const CONTINUE_FETCH_EN: u32 = 1 << 12;

// ============================================================================
// OCTA_SPI_BUS_CONTROLLER2 bits
// ============================================================================

/// Nonce initialise (9118 only)
pub const CTRL2_NONCE_INIT: u32 = 1 << 1;
/// Global inline security
pub const CTRL2_EN_SECURITY: u32 = 1 << 2;
/// Two flashes side by side as one wider channel
pub const CTRL2_DUAL_FLASH_MODE: u32 = 1 << 3;
/// Secondary chip select field base
pub const CTRL2_SECONDARY_CSN_OFF: u32 = 4;
/// Per-segment security enables base
pub const CTRL2_EN_SEG_SEC_OFF: u32 = 12;
/// Use the keyholder key
pub const CTRL2_EN_KH_KEY: u32 = 1 << 18;
/// Route manual transfers to both flashes in dual-flash mode
pub const CTRL2_DUAL_FLASH_BOTH: u32 = 1 << 19;

// ============================================================================
// Semi-auto mode
// ============================================================================

/// Semi-auto mode enable
pub const SEMI_AUTO_MODE_EN: u32 = 1 << 12;
/// Semi-auto read in progress
pub const SEMI_AUTO_RD_BUSY: u32 = 1 << 13;

// ============================================================================
// AES
// ============================================================================

bitflags! {
    /// QSPI_AES_CONFIG register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AesConfig: u32 {
        /// CTR mode
        const CTR_MODE = 0x04;
        /// XTS mode
        const XTS_MODE = 0x80;
        /// Pre-compute the decryption key schedule
        const DECRYPT_KEY_CAL = 1 << 9;
        /// Flip key words written through registers
        const KEY_FLIP_FOR_REG_INTF = 1 << 10;
        /// Flip key words fetched from the keyholder
        const KEY_FLIP_FOR_KH_INTF = 1 << 11;
        /// Flip 32-bit endianness of lockbox data
        const FLIP_IN_LB = 1 << 13;
        /// Decrypt direction for standalone operation
        const DECRYPT = 1 << 14;
        /// Standalone (lockbox) operation instead of inline
        const EN_STANDALONE_AES = 1 << 15;
        /// 256-bit keys
        const KEY_SIZE_256 = 1 << 16;
    }
}

/// IV valid for lockbox operation
pub const LB_IV_VALID: u32 = 0xF << 8;
/// Key 1 valid, 128-bit
pub const KEY1_VALID_128: u32 = 0xF0;
/// Key 2 valid, 128-bit
pub const KEY2_VALID_128: u32 = 0xF0 << 12;
/// Key 1 valid, 256-bit
pub const KEY1_VALID_256: u32 = 0xFF;
/// Key 2 valid, 256-bit
pub const KEY2_VALID_256: u32 = 0xFF << 12;

/// Start a keyholder key load; self-clears when done
pub const LOAD_SEC_KEY_FRM_KH: u32 = 1 << 0;

/// Firmware has consumed lockbox output
pub const LB_STATUS_FW_READY: u32 = 1 << 0;
/// Lockbox output valid
pub const LB_STATUS_DOUT_VALID: u32 = 1 << 1;
/// Lockbox ready for input
pub const LB_STATUS_DIN_READY: u32 = 1 << 2;

// ============================================================================
// Retention storage (NPSS block)
// ============================================================================

/// Physical base of the MCU NPSS block holding the retention registers
pub const MCU_NPSS_BASE: usize = 0x2404_8000;
/// Size of the NPSS register window the driver touches
pub const NPSS_REG_SIZE: usize = 0x600;
/// Battery-backed storage word 2; low byte holds operating mode and reset type
pub const BBFF_STORAGE2: usize = 0x584;

// ============================================================================
// Helpers
// ============================================================================

/// Offset of AUTO_CTRL_CONFIG_1 for a chip select (cs0 or cs1 bank)
pub const fn auto_ctrl_config_1(cs: u8) -> usize {
    QSPI_AUTO_CTRL_CONFIG_1 + if cs == 0 { 0 } else { AUTO_CTRL_CS_STRIDE }
}

/// Offset of AUTO_CTRL_CONFIG_2 for a chip select (cs0 or cs1 bank)
pub const fn auto_ctrl_config_2(cs: u8) -> usize {
    QSPI_AUTO_CTRL_CONFIG_2 + if cs == 0 { 0 } else { AUTO_CTRL_CS_STRIDE }
}

/// Offset of AUTO_CONFIG3 for a chip select (cs0 or cs1 bank)
pub const fn auto_config3(cs: u8) -> usize {
    if cs == 0 {
        QSPI_AUTO_CONFIG3
    } else {
        QSPI_AUTO_CONFIG3_CSN1
    }
}

/// Manual-mode read count fields for `count` units
pub const fn manual_read_count(count: u32) -> u32 {
    ((count & 0x3FF) << MANUAL_RD_CNT_OFF) | (((count >> 10) & 0x1F) << MANUAL_RD_CNT_HI_OFF)
}

/// Decode the manual-mode read count fields
pub const fn decode_read_count(manual_config: u32) -> u32 {
    ((manual_config >> MANUAL_RD_CNT_OFF) & 0x3FF) | (((manual_config >> MANUAL_RD_CNT_HI_OFF) & 0x1F) << 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_count_split() {
        let bits = manual_read_count(32 * 1024 - 4);
        assert_eq!(bits & MANUAL_READ_CLEAR, bits);
        assert_eq!(decode_read_count(bits), 32 * 1024 - 4);
        assert_eq!(decode_read_count(manual_read_count(1)), 1);
    }

    #[test]
    fn test_auto_ctrl_banks() {
        assert_eq!(auto_ctrl_config_1(1), 0x38);
        assert_eq!(auto_ctrl_config_2(1), 0x3C);
        assert_eq!(auto_config3(0), 0x90);
        assert_eq!(auto_config3(3), 0x94);
    }
}
