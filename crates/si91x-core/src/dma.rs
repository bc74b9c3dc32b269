//! Block-transfer capability used by the QSPI engine
//!
//! The GPDMA/UDMA engines are external collaborators: the QSPI driver only
//! needs to start a transfer on a channel it was handed and wait for that
//! channel to go idle. Descriptor layout and channel arbitration belong to the
//! DMA driver behind this trait.

use bitflags::bitflags;

use crate::error::Result;

/// Width of each data-port access (the controller's "hsize")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hsize {
    /// 8-bit accesses
    #[default]
    Byte,
    /// 16-bit accesses
    HalfWord,
    /// 32-bit accesses
    Word,
}

impl Hsize {
    /// Hardware encoding (0, 1 or 3)
    pub const fn code(self) -> u32 {
        match self {
            Self::Byte => 0,
            Self::HalfWord => 1,
            Self::Word => 3,
        }
    }

    /// Bytes per access
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
        }
    }

    /// Bits per access
    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

bitflags! {
    /// Caller-supplied DMA options for a manual read
    ///
    /// The low byte carries the channel number.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaFlags: u32 {
        /// Channel number field
        const CHANNEL = 0xFF;
        /// GPDMA descriptor mode: 4K-4 byte chunks drained from the FIFO
        const DEFAULT_DESC_MODE = 1 << 8;
        /// Use the UDMA engine instead of GPDMA
        const USE_UDMA = 1 << 9;
    }
}

impl DmaFlags {
    /// Build flags for `channel` with the given mode bits
    pub fn for_channel(channel: u8, mode: DmaFlags) -> Self {
        Self::from_bits_retain(channel as u32) | (mode - Self::CHANNEL)
    }

    /// Channel number
    pub fn channel(self) -> u8 {
        (self.bits() & Self::CHANNEL.bits()) as u8
    }
}

/// One block transfer request
#[derive(Debug)]
pub enum Transfer<'b> {
    /// Drain the QSPI read FIFO into memory
    FifoToMemory {
        /// Destination buffer; its length is the transfer size
        dst: &'b mut [u8],
        /// Data-port access width
        width: Hsize,
    },
    /// Copy from the auto-mode memory window into memory
    WindowToMemory {
        /// Bus address inside the window
        src: u32,
        /// Destination buffer
        dst: &'b mut [u8],
    },
    /// Feed memory into the QSPI write FIFO
    MemoryToFifo {
        /// Source buffer
        src: &'b [u8],
        /// Data-port access width
        width: Hsize,
    },
}

impl Transfer<'_> {
    /// Number of bytes moved
    pub fn len(&self) -> usize {
        match self {
            Self::FifoToMemory { dst, .. } | Self::WindowToMemory { dst, .. } => dst.len(),
            Self::MemoryToFifo { src, .. } => src.len(),
        }
    }

    /// True when the transfer moves nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// DMA engine as seen by the QSPI driver
pub trait BlockTransfer {
    /// Program `channel` with `transfer` and enable it
    fn start(&mut self, channel: u8, transfer: Transfer<'_>) -> Result<()>;

    /// Whether `channel` is still enabled
    fn is_active(&mut self, channel: u8) -> bool;
}

/// DMA collaborator plus the flags selecting how it is used
pub struct DmaChannel<'d> {
    /// Engine
    pub engine: &'d mut dyn BlockTransfer,
    /// Channel and mode
    pub flags: DmaFlags,
}
