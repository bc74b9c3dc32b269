//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// AES key given on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexKey {
    /// Key words in key-register order; word 0 holds the last eight digits
    pub words: [u32; 8],
    /// 256-bit key
    pub wide: bool,
}

/// Parse a 128- or 256-bit key given as hex, most significant word first
fn parse_key(s: &str) -> Result<HexKey, String> {
    let hex = s.strip_prefix("0x").unwrap_or(s);
    if hex.len() != 32 && hex.len() != 64 {
        return Err(format!(
            "Key must be 32 or 64 hex digits, got {}",
            hex.len()
        ));
    }
    let mut words = [0u32; 8];
    let count = hex.len() / 8;
    for (i, chunk) in hex.as_bytes().chunks(8).enumerate() {
        let digits = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
        words[count - 1 - i] =
            u32::from_str_radix(digits, 16).map_err(|e| format!("Invalid key: {}", e))?;
    }
    Ok(HexKey {
        words,
        wide: count == 8,
    })
}

#[derive(Parser)]
#[command(name = "si91x")]
#[command(author, version, about = "Si91x QSPI flash controller tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Target profile (RON); defaults to a single-mode 24-bit flash on CS0
    #[arg(short, long, global = true)]
    pub profile: Option<PathBuf>,

    /// Preload the simulated flash from this file
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Write the simulated flash contents to this file afterwards
    #[arg(long, global = true)]
    pub save: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Erase granularity
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseKindArg {
    /// Sector (usually 4 KiB)
    Sector,
    /// Block (usually 64 KiB)
    Block,
    /// Whole chip
    Chip,
}

/// Cipher mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AesModeArg {
    /// Counter mode
    Ctr,
    /// XTS; needs --key2
    Xts,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialise the controller and the flash
    Init {
        /// Skip the flash-side initialisation sequence
        #[arg(long)]
        no_flash_init: bool,

        /// Delay after each flash-side command, in microseconds
        #[arg(long, default_value_t = 0)]
        delay_us: u32,
    },

    /// Erase a sector, a block or the whole chip
    Erase {
        /// Erase granularity
        #[arg(short, long, value_enum, default_value_t = EraseKindArg::Sector)]
        kind: EraseKindArg,

        /// Address inside the region to erase (hex with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,
    },

    /// Program a file into flash
    Write {
        /// Start address (hex with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Program page size
        #[arg(long, default_value_t = 256)]
        page_size: u32,

        /// Read back and compare after writing
        #[arg(long)]
        verify: bool,
    },

    /// Read flash contents
    Read {
        /// Start address (hex with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        addr: u32,

        /// Number of bytes to read
        #[arg(short, long, value_parser = parse_hex_u32)]
        len: u32,

        /// Output file path; hex dump to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encrypt or decrypt a file with the standalone AES engine
    Aes {
        /// Cipher mode
        #[arg(short, long, value_enum, default_value_t = AesModeArg::Ctr)]
        mode: AesModeArg,

        /// Data key, 32 or 64 hex digits; the keyholder key is used if omitted
        #[arg(long, value_parser = parse_key)]
        key: Option<HexKey>,

        /// Tweak key for XTS, same length as --key
        #[arg(long, value_parser = parse_key)]
        key2: Option<HexKey>,

        /// Use a 256-bit keyholder key
        #[arg(long)]
        wide: bool,

        /// Flash address the data belongs to
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        iv: u32,

        /// Input file; length must be a multiple of 16
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Decrypt instead of encrypt
        #[arg(long)]
        decrypt: bool,
    },

    /// Burn one eFUSE bit
    EfuseWrite {
        /// Row address (0..=0x31)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Bit position (0..=7)
        #[arg(short, long)]
        bit: u8,

        /// Strobe hold time in microseconds
        #[arg(long, default_value_t = 10)]
        hold_us: u32,
    },

    /// Read eFUSE contents through the memory-mapped window
    EfuseRead {
        /// Row address (0..=0x31)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// SoC clock in Hz, used to derive the read timing
        #[arg(long, default_value_t = 20_000_000)]
        soc_clk: u32,

        /// Read two rows as a little-endian word
        #[arg(long)]
        word: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_key_word_order() {
        let key = parse_key("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(
            key.words[..4],
            [0x0c0d_0e0f, 0x0809_0a0b, 0x0405_0607, 0x0001_0203]
        );
        assert!(!key.wide);
        let wide = parse_key(&"ab".repeat(32)).unwrap();
        assert!(wide.wide);
        assert_eq!(wide.words[7], 0xabab_abab);
        assert!(parse_key("0011").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["si91x", "erase", "--kind", "block", "--addr", "0x10000"])
            .unwrap();
        match cli.command {
            Commands::Erase { kind, addr } => {
                assert_eq!(kind, EraseKindArg::Block);
                assert_eq!(addr, 0x10000);
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
