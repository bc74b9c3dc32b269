//! CLI error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the command-line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// File could not be read or written
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Profile is not valid RON for a profile
    #[error("Invalid profile: {0}")]
    Profile(#[from] ron::error::SpannedError),

    /// Command-line values that do not fit together
    #[error("{0}")]
    Usage(String),

    /// Simulator or driver failure
    #[error(transparent)]
    Sim(#[from] si91x_sim::SimError),

    /// Data read back differs from what was written
    #[error("Verify failed at 0x{addr:08X}: expected 0x{expected:02X}, read 0x{actual:02X}")]
    Verify { addr: u32, expected: u8, actual: u8 },
}

impl CliError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
