//! Transport decoding of remote command output
//!
//! The orchestrator that captures remote command output may wrap it in base64
//! before handing it on. Status text has to be unwrapped before it can be parsed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a remote response is expected to be encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEncoding {
    /// Decode when the payload looks like base64, otherwise take it as text
    #[default]
    Auto,
    /// Payload is always base64
    Base64,
    /// Payload is always UTF-8 text
    Plain,
}

/// Errors raised while decoding a remote response
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed base64 payload: {0}")]
    Base64(String),

    #[error("payload is not valid UTF-8 text")]
    NotUtf8,
}

impl FromStr for ResponseEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "base64" => Ok(Self::Base64),
            "plain" | "text" => Ok(Self::Plain),
            other => Err(format!(
                "unknown response encoding '{}' (expected auto, base64 or plain)",
                other
            )),
        }
    }
}

impl fmt::Display for ResponseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Base64 => "base64",
            Self::Plain => "plain",
        };
        f.write_str(name)
    }
}

/// Decodes a raw remote response into text
///
/// # Arguments
/// * `raw` - Bytes captured from the remote command
/// * `encoding` - Expected transport encoding
pub fn maybe_decode_base64(raw: &[u8], encoding: ResponseEncoding) -> Result<String, DecodeError> {
    match encoding {
        ResponseEncoding::Plain => as_text(raw),
        ResponseEncoding::Base64 => decode_strict(raw),
        ResponseEncoding::Auto => {
            if looks_like_base64(raw) {
                if let Ok(text) = decode_strict(raw) {
                    if is_printable(&text) {
                        return Ok(text);
                    }
                }
            }
            as_text(raw)
        }
    }
}

fn as_text(raw: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::NotUtf8)
}

fn decode_strict(raw: &[u8]) -> Result<String, DecodeError> {
    // Wrapped payloads may be split across lines
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(&compact)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    String::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)
}

fn looks_like_base64(raw: &[u8]) -> bool {
    let mut len = 0usize;

    for &b in raw {
        if b.is_ascii_whitespace() {
            continue;
        }
        if !(b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=') {
            return false;
        }
        len += 1;
    }

    len > 0 && len % 4 == 0
}

fn is_printable(text: &str) -> bool {
    text.chars().all(|c| !c.is_control() || c.is_whitespace())
}
