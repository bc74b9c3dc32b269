//! Init command implementation

use super::Target;
use crate::error::CliError;

/// Run the controller (and optionally flash) initialisation sequence
pub fn run_init(target: &Target, init_flash: bool, delay_us: u32) -> Result<(), CliError> {
    let api = target.qspi();
    let config = &target.profile.flash;

    target
        .sim
        .run(|qspi, _, _| api.spi_init(qspi, config, init_flash, delay_us, true))?;
    target.flush_trace();

    println!(
        "Initialised {:?} flash on {:?}{}",
        config.flash_type,
        config.cs_no,
        if config.auto_mode { ", auto mode" } else { "" }
    );
    if init_flash {
        let status = target.sim.flash_status();
        println!(
            "Flash status: {:02X} {:02X} {:02X}",
            status[0], status[1], status[2]
        );
    }
    Ok(())
}
