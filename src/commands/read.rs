//! Read command implementation

use si91x_core::qspi::ReadOptions;
use std::fs;
use std::path::Path;

use super::{progress_bar, Target, CHUNK_SIZE};
use crate::error::CliError;

/// Run the read command
pub fn run_read(
    target: &Target,
    addr: u32,
    len: u32,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let len = len as usize;
    target.check_range(addr, len)?;
    let data = read_flash_with_progress(target, addr, len)?;
    target.flush_trace();

    match output {
        Some(path) => {
            fs::write(path, &data).map_err(CliError::io(path))?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => print!("{}", hex_dump(addr, &data)),
    }
    Ok(())
}

/// Read `len` bytes at `addr` in chunks, with a progress bar
pub fn read_flash_with_progress(
    target: &Target,
    addr: u32,
    len: usize,
) -> Result<Vec<u8>, CliError> {
    let api = target.qspi();
    let config = &target.profile.flash;
    let mut data = vec![0u8; len];

    let pb = progress_bar(len, "Reading");
    for (i, chunk) in data.chunks_mut(CHUNK_SIZE).enumerate() {
        let at = addr + (i * CHUNK_SIZE) as u32;
        let n = chunk.len();
        target.sim.run(|qspi, window, _| {
            api.spi_read(qspi, config, at, chunk, ReadOptions::default(), window)
        })?;
        pb.inc(n as u64);
    }
    pb.finish_with_message("Read complete");
    Ok(data)
}

/// Sixteen bytes per line, address first
fn hex_dump(addr: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}:", addr as usize + i * 16));
        for byte in line {
            out.push_str(&format!(" {:02x}", byte));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0..20).collect();
        let dump = hex_dump(0x100, &data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000100: 00 01 02"));
        assert_eq!(lines[1], "00000110: 10 11 12 13");
    }
}
