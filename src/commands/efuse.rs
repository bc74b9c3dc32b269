//! eFUSE command implementations

use si91x_core::efuse::Efuse;
use si91x_core::regs::efuse::ADDRESS_MAX;

use super::Target;
use crate::error::CliError;

fn row(address: u32) -> Result<u16, CliError> {
    u16::try_from(address)
        .ok()
        .filter(|a| *a <= ADDRESS_MAX)
        .ok_or_else(|| {
            CliError::Usage(format!(
                "eFUSE address 0x{:X} is past the last row 0x{:X}",
                address, ADDRESS_MAX
            ))
        })
}

/// Burn one bit
pub fn run_efuse_write(
    target: &Target,
    address: u32,
    bit: u8,
    hold_us: u32,
) -> Result<(), CliError> {
    let address = row(address)?;
    let api = target.efuse();
    target.sim.run_efuse(|efuse: &mut Efuse<'_>| {
        api.enable(efuse)?;
        api.write_bit(efuse, address, bit, hold_us)?;
        api.disable(efuse)
    })?;

    let fuses = target.sim.fuses();
    println!(
        "Burned row 0x{:02X} bit {}: row now 0x{:02X}",
        address, bit, fuses[address as usize]
    );
    if target.sim.efuse_misordered() != 0 {
        log::warn!(
            "{} strobe(s) outside the program sequence",
            target.sim.efuse_misordered()
        );
    }
    Ok(())
}

/// Read one row, or two as a word
pub fn run_efuse_read(
    target: &Target,
    address: u32,
    soc_clk: u32,
    word: bool,
) -> Result<(), CliError> {
    let address = row(address)?;
    let api = target.efuse();
    if word {
        let value = target.sim.run_efuse(|efuse: &mut Efuse<'_>| {
            api.memory_mapped_read_word(efuse, address, soc_clk)
        })?;
        println!("eFUSE 0x{:02X}: 0x{:04X}", address, value);
    } else {
        let value = target.sim.run_efuse(|efuse: &mut Efuse<'_>| {
            api.memory_mapped_read_byte(efuse, address, soc_clk)
        })?;
        println!("eFUSE 0x{:02X}: 0x{:02X}", address, value);
    }
    Ok(())
}
