//! Error types for si91x-core
//!
//! A single `Copy` error enum shared by every driver in the crate. Parameter
//! errors are always reported before any register is touched; timeouts and
//! verify mismatches can surface halfway through a sequence, in which case the
//! controller is left wherever the sequence stopped.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Parameter errors
    /// A caller-supplied argument is out of range or inconsistent
    InvalidParameters,
    /// eFUSE address beyond the last programmable row
    InvalidAddress {
        /// Rejected address
        address: u16,
    },
    /// eFUSE bit position beyond the last bit of a row
    InvalidBitPosition {
        /// Rejected bit position
        bit: u8,
    },
    /// SoC clock outside the range the eFUSE read timing can be derived for
    InvalidClock {
        /// Rejected clock in Hz
        hz: u32,
    },

    // Hardware errors
    /// A register never reached the expected state within the poll budget
    HardwareTimeout {
        /// Offset of the register being polled
        reg: usize,
        /// Bits that were being waited on
        mask: u32,
    },
    /// Post-write verification read back different data
    VerifyMismatch {
        /// Flash address of the first differing byte
        addr: u32,
    },

    // Dispatch errors
    /// The selected ROM table has no entry for the requested operation
    RomUnavailable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters => write!(f, "invalid parameters"),
            Self::InvalidAddress { address } => {
                write!(f, "invalid eFUSE address {:#06x}", address)
            }
            Self::InvalidBitPosition { bit } => write!(f, "invalid eFUSE bit position {}", bit),
            Self::InvalidClock { hz } => write!(f, "SoC clock {} Hz out of range", hz),
            Self::HardwareTimeout { reg, mask } => write!(
                f,
                "hardware timeout polling register {:#05x} (mask {:#010x})",
                reg, mask
            ),
            Self::VerifyMismatch { addr } => {
                write!(f, "verify failed: data mismatch at {:#010x}", addr)
            }
            Self::RomUnavailable => write!(f, "operation not present in ROM table"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
