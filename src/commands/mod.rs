//! CLI command implementations
//!
//! Every command runs against the simulated controller. Driver calls go
//! through the dispatch layer, so a profile that routes a peripheral to the
//! boot ROM fails with `RomUnavailable` on the host, exactly as it would on
//! a part whose ROM lacks the entry.

mod aes;
mod efuse;
mod erase;
mod init;
mod read;
mod write;

pub use aes::{run_aes, AesArgs};
pub use efuse::{run_efuse_read, run_efuse_write};
pub use erase::run_erase;
pub use init::run_init;
pub use read::run_read;
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};
use si91x_core::dispatch::{
    efuse_api, qspi_api, EfuseApi, EfuseRomTable, QspiApi, QspiRomTable, RomBacked,
};
use si91x_sim::Simulator;
use std::fs;
use std::path::Path;

use crate::error::CliError;
use crate::profile::Profile;

/// ROM tables of the host: nothing is exported
static HOST_QSPI_ROM: RomBacked<QspiRomTable> = RomBacked::new(&QspiRomTable::EMPTY);
static HOST_EFUSE_ROM: RomBacked<EfuseRomTable> = RomBacked::new(&EfuseRomTable::EMPTY);

/// Chunk size for reads and writes (4 KiB)
const CHUNK_SIZE: usize = 4096;

/// Simulated target plus the profile describing it
pub struct Target {
    pub profile: Profile,
    pub sim: Simulator,
}

impl Target {
    /// Build the simulator for `profile`, optionally preloading the flash
    pub fn open(profile: Profile, image: Option<&Path>) -> Result<Self, CliError> {
        let config = profile.geometry.sim_config();
        let sim = match image {
            Some(path) => {
                let data = fs::read(path).map_err(CliError::io(path))?;
                log::info!("Preloading {} bytes from {}", data.len(), path.display());
                Simulator::with_image(config, &data)?
            }
            None => Simulator::new(config)?,
        };
        Ok(Self { profile, sim })
    }

    /// QSPI driver selected by the profile
    pub fn qspi(&self) -> &'static dyn QspiApi {
        qspi_api(&self.profile.target, &HOST_QSPI_ROM)
    }

    /// eFUSE driver selected by the profile
    pub fn efuse(&self) -> &'static dyn EfuseApi {
        efuse_api(&self.profile.target, &HOST_EFUSE_ROM)
    }

    /// Log and clear the bus trace recorded so far
    pub fn flush_trace(&self) {
        let trace = self.sim.take_trace();
        if trace.is_empty() {
            return;
        }
        log::info!("Bus trace ({} transactions):", trace.len());
        for transaction in trace.transactions() {
            log::info!("  {}", transaction);
        }
    }

    /// Write the flash contents to `path`
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let data = self.sim.flash_data();
        fs::write(path, &data).map_err(CliError::io(path))?;
        println!("Saved {} bytes of flash to {:?}", data.len(), path);
        Ok(())
    }

    /// Reject ranges that run past the end of the simulated flash
    fn check_range(&self, addr: u32, len: usize) -> Result<(), CliError> {
        let size = self.profile.geometry.size;
        if addr as usize + len > size {
            return Err(CliError::Usage(format!(
                "Range 0x{:08X}..0x{:08X} is outside flash bounds (0x{:08X})",
                addr,
                addr as usize + len,
                size
            )));
        }
        Ok(())
    }
}

/// Byte progress bar in the style used by every data command
fn progress_bar(total: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
