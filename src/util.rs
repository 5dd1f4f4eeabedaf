//! Shared utility helpers.

use std::path::Path;

use encoding_rs::WINDOWS_1252;
use sha2::{Digest, Sha256};

/// Read a form file as text. UTF-8 (with or without BOM) is preferred; files
/// saved by legacy Windows editors fall back to Windows-1252.
pub fn read_form_text(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    decode_form_bytes(&bytes)
}

pub(crate) fn decode_form_bytes(bytes: &[u8]) -> std::io::Result<String> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => {
            let (decoded, _, had_errors) = WINDOWS_1252.decode(body);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Form file contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
