//! Decode command
//!
//! Unwraps captured command output the same way the poller does, which helps
//! when checking what a status query actually returned.

use anyhow::{Context, Result};
use clap::Args;
use qwatch_core::encoding::{ResponseEncoding, maybe_decode_base64};
use std::io::Read;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File to decode; standard input when omitted
    pub file: Option<PathBuf>,

    /// Expected encoding (auto, base64, plain)
    #[arg(long, default_value = "auto")]
    pub encoding: ResponseEncoding,
}

pub fn handle_decode(args: DecodeArgs) -> Result<i32> {
    let raw = match &args.file {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read standard input")?;
            buffer
        }
    };

    let text = maybe_decode_base64(&raw, args.encoding).context("Failed to decode input")?;
    print!("{}", text);

    Ok(0)
}
