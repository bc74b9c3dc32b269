//! Write command implementation

use si91x_core::qspi::{ReadOptions, WriteOptions};
use std::fs;
use std::path::Path;

use super::{progress_bar, Target, CHUNK_SIZE};
use crate::error::CliError;

/// Run the write command
pub fn run_write(
    target: &Target,
    addr: u32,
    input: &Path,
    page_size: u32,
    verify: bool,
) -> Result<(), CliError> {
    let data = fs::read(input).map_err(CliError::io(input))?;
    println!("Read {} bytes from {:?}", data.len(), input);
    if data.is_empty() {
        return Err(CliError::Usage("Input file is empty".into()));
    }
    target.check_range(addr, data.len())?;

    let api = target.qspi();
    let config = &target.profile.flash;
    let opts = WriteOptions {
        page_size,
        ..WriteOptions::default()
    };

    let pb = progress_bar(data.len(), "Writing");
    for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
        let at = addr + (i * CHUNK_SIZE) as u32;
        target
            .sim
            .run(|qspi, _, _| api.spi_write(qspi, config, at, chunk, opts))?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Write complete");
    target.flush_trace();

    if verify {
        verify_flash(target, addr, &data)?;
        println!("Verification passed!");
    }
    println!("Wrote {} bytes at 0x{:08X}", data.len(), addr);
    Ok(())
}

/// Read `expected.len()` bytes back and compare
fn verify_flash(target: &Target, addr: u32, expected: &[u8]) -> Result<(), CliError> {
    let api = target.qspi();
    let config = &target.profile.flash;
    let mut actual = vec![0u8; CHUNK_SIZE];

    let pb = progress_bar(expected.len(), "Verifying");
    for (i, want) in expected.chunks(CHUNK_SIZE).enumerate() {
        let at = addr + (i * CHUNK_SIZE) as u32;
        let n = want.len();
        target.sim.run(|qspi, window, _| {
            api.spi_read(qspi, config, at, &mut actual[..n], ReadOptions::default(), window)
        })?;
        let got = &actual[..n];
        if let Some(pos) = got.iter().zip(want).position(|(a, b)| a != b) {
            pb.abandon();
            return Err(CliError::Verify {
                addr: at + pos as u32,
                expected: want[pos],
                actual: got[pos],
            });
        }
        pb.inc(want.len() as u64);
    }
    pb.finish_with_message("Verify complete");
    // Read-back traffic is not interesting
    target.sim.take_trace();
    Ok(())
}
