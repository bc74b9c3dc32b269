//! si91x - Host tool for the Si91x QSPI flash controller drivers
//!
//! Runs the `si91x-core` drivers against the `si91x-sim` behavioural model
//! of the controller, its serial flash and the eFUSE block. A RON profile
//! describes the target chip and the attached flash; every command prints
//! the bus transactions the flash saw at `info` level.
//!
//! # Architecture
//!
//! - **si91x-core** - `no_std` drivers: QSPI engine, family initialisers,
//!   AES unit, eFUSE, and the ROM-or-local dispatch layer
//! - **si91x-sim** - register-level simulator standing in for hardware
//! - **si91x** (this binary) - profile loading and the command set

mod cli;
mod commands;
mod error;
mod profile;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{AesArgs, Target};
use profile::Profile;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let profile = Profile::load(cli.profile.as_deref())?;
    let target = Target::open(profile, cli.image.as_deref())?;

    let result = match cli.command {
        Commands::Init {
            no_flash_init,
            delay_us,
        } => commands::run_init(&target, !no_flash_init, delay_us),
        Commands::Erase { kind, addr } => commands::run_erase(&target, kind, addr),
        Commands::Write {
            addr,
            input,
            page_size,
            verify,
        } => commands::run_write(&target, addr, &input, page_size, verify),
        Commands::Read { addr, len, output } => {
            commands::run_read(&target, addr, len, output.as_deref())
        }
        Commands::Aes {
            mode,
            key,
            key2,
            wide,
            iv,
            input,
            output,
            decrypt,
        } => commands::run_aes(
            &target,
            &AesArgs {
                mode,
                key,
                key2,
                wide,
                iv,
                input: &input,
                output: &output,
                decrypt,
            },
        ),
        Commands::EfuseWrite {
            address,
            bit,
            hold_us,
        } => commands::run_efuse_write(&target, address, bit, hold_us),
        Commands::EfuseRead {
            address,
            soc_clk,
            word,
        } => commands::run_efuse_read(&target, address, soc_clk, word),
    };

    // Show whatever reached the bus before a failure
    target.flush_trace();
    result?;

    if let Some(path) = cli.save.as_deref() {
        target.save(path)?;
    }
    Ok(())
}
