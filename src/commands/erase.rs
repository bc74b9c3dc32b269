//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use si91x_core::qspi::{EraseKind, EraseOptions};
use std::time::Duration;

use super::Target;
use crate::cli::EraseKindArg;
use crate::error::CliError;

impl From<EraseKindArg> for EraseKind {
    fn from(kind: EraseKindArg) -> Self {
        match kind {
            EraseKindArg::Sector => EraseKind::Sector,
            EraseKindArg::Block => EraseKind::Block,
            EraseKindArg::Chip => EraseKind::Chip,
        }
    }
}

/// Run the erase command
pub fn run_erase(target: &Target, kind: EraseKindArg, addr: u32) -> Result<(), CliError> {
    if kind != EraseKindArg::Chip {
        target.check_range(addr, 1)?;
    }
    let api = target.qspi();
    let config = &target.profile.flash;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("{:?} erase at 0x{:08X}...", kind, addr));
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = target.sim.run(|qspi, _, _| {
        api.spi_erase(qspi, config, kind.into(), addr, EraseOptions::default())
    });
    pb.finish_and_clear();
    result?;
    target.flush_trace();

    match kind {
        EraseKindArg::Chip => println!("Chip erase complete"),
        _ => println!("{:?} erase at 0x{:08X} complete", kind, addr),
    }
    Ok(())
}
