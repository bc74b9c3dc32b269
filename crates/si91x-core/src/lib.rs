//! si91x-core - QSPI flash controller and eFUSE drivers for Si91x MCUs
//!
//! This crate drives the QSPI controller that sits between the Si91x MCU and
//! its external serial NOR flash, plus the eFUSE block that stores the flash
//! strapping. It is `no_std` and allocation-free; all hardware access goes
//! through the [`regs::RegisterFile`] capability so the same code runs on
//! target and against a simulator.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc` and `serde`)
//! - `alloc` - Heap-allocating convenience wrappers
//! - `serde` - Serialize/deserialize [`qspi::FlashConfig`] profiles
//!
//! # Example
//!
//! ```ignore
//! use si91x_core::qspi::{EraseKind, EraseOptions, FlashConfig, Qspi};
//!
//! fn erase_first_sector(qspi: &mut Qspi<'_>, config: &FlashConfig) -> si91x_core::Result<()> {
//!     qspi.spi_erase(config, EraseKind::Sector, 0, EraseOptions::default())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod dispatch;
pub mod dma;
pub mod efuse;
pub mod error;
pub mod poll;
pub mod qspi;
pub mod regs;
pub mod window;

pub use error::{Error, Result};
