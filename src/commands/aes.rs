//! Standalone AES command implementation

use si91x_core::qspi::{AesDirection, AesMode, CipherKey, KeyLen, KeySource, StandaloneAes};
use std::fs;
use std::path::Path;

use super::Target;
use crate::cli::{AesModeArg, HexKey};
use crate::error::CliError;

/// Block size of the AES engine
const AES_BLOCK: usize = 16;

/// Everything the aes command was given
pub struct AesArgs<'a> {
    pub mode: AesModeArg,
    pub key: Option<HexKey>,
    pub key2: Option<HexKey>,
    pub wide: bool,
    pub iv: u32,
    pub input: &'a Path,
    pub output: &'a Path,
    pub decrypt: bool,
}

/// Turn the command-line key options into a driver key
fn cipher_key(args: &AesArgs<'_>) -> Result<CipherKey, CliError> {
    let len_of = |wide: bool| if wide { KeyLen::K256 } else { KeyLen::K128 };
    match (args.key, args.key2) {
        (None, None) => Ok(CipherKey {
            len: len_of(args.wide),
            source: KeySource::Keyholder,
        }),
        (None, Some(_)) => Err(CliError::Usage("--key2 needs --key".into())),
        (Some(key), key2) => {
            if let Some(tweak) = key2 {
                if tweak.wide != key.wide {
                    return Err(CliError::Usage(
                        "--key and --key2 must have the same length".into(),
                    ));
                }
            }
            if args.mode == AesModeArg::Xts && key2.is_none() {
                return Err(CliError::Usage("XTS needs --key2".into()));
            }
            Ok(CipherKey::supplied(
                len_of(key.wide),
                key.words,
                key2.map(|k| k.words),
            ))
        }
    }
}

/// Run the aes command
pub fn run_aes(target: &Target, args: &AesArgs<'_>) -> Result<(), CliError> {
    let input = fs::read(args.input).map_err(CliError::io(args.input))?;
    if input.is_empty() || input.len() % AES_BLOCK != 0 {
        return Err(CliError::Usage(format!(
            "Input length {} is not a non-zero multiple of {}",
            input.len(),
            AES_BLOCK
        )));
    }

    let ctx = StandaloneAes {
        mode: match args.mode {
            AesModeArg::Ctr => AesMode::Ctr,
            AesModeArg::Xts => AesMode::Xts,
        },
        direction: if args.decrypt {
            AesDirection::Decrypt
        } else {
            AesDirection::Encrypt
        },
        key: cipher_key(args)?,
        iv: args.iv,
        flip_data: false,
    };

    let api = target.qspi();
    let mut output = vec![0u8; input.len()];
    target
        .sim
        .run(|qspi, _, _| api.aes_standalone(qspi, &ctx, &input, &mut output))?;

    fs::write(args.output, &output).map_err(CliError::io(args.output))?;
    println!(
        "{} {} bytes ({:?}, iv 0x{:08X}) to {:?}",
        if args.decrypt { "Decrypted" } else { "Encrypted" },
        output.len(),
        ctx.mode,
        ctx.iv,
        args.output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(key: Option<HexKey>, key2: Option<HexKey>, mode: AesModeArg) -> AesArgs<'static> {
        AesArgs {
            mode,
            key,
            key2,
            wide: true,
            iv: 0,
            input: Path::new("in"),
            output: Path::new("out"),
            decrypt: false,
        }
    }

    fn hex(wide: bool) -> HexKey {
        HexKey {
            words: [7; 8],
            wide,
        }
    }

    #[test]
    fn test_keyholder_key_uses_wide_flag() {
        let key = cipher_key(&args(None, None, AesModeArg::Ctr)).unwrap();
        assert_eq!(key.len, KeyLen::K256);
        assert_eq!(key.source, KeySource::Keyholder);
    }

    #[test]
    fn test_xts_needs_tweak_key() {
        assert!(cipher_key(&args(Some(hex(false)), None, AesModeArg::Xts)).is_err());
        let key = cipher_key(&args(Some(hex(false)), Some(hex(false)), AesModeArg::Xts)).unwrap();
        assert_eq!(key.len, KeyLen::K128);
    }

    #[test]
    fn test_mismatched_key_lengths() {
        assert!(cipher_key(&args(Some(hex(true)), Some(hex(false)), AesModeArg::Xts)).is_err());
    }
}
