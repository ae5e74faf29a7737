//! TOTP shared secrets and their Base32 (RFC 4648) text form.
//!
//! A secret is always 160 bits, which encodes to exactly 32 Base32 characters
//! with no `=` padding. Authenticator apps expect this form in the
//! provisioning URI.

use std::fmt;

use crate::error::{QauthError, Result};

/// Secret size in bytes.
pub const SECRET_BYTES: usize = 20;

/// Secret size in bits.
pub const SECRET_BITS: usize = SECRET_BYTES * 8;

/// Length of the unpadded Base32 text form.
pub const SECRET_LEN: usize = 32;

/// A validated 160-bit Base32 secret.
///
/// `Debug` output is redacted so secrets do not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Encode 20 raw bytes.
    pub fn from_bytes(bytes: &[u8; SECRET_BYTES]) -> Self {
        Self(base32::encode(bytes))
    }

    /// Parse Base32 text. Lower case and trailing `=` padding are accepted
    /// and normalized away.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized: String = text
            .trim()
            .trim_end_matches('=')
            .chars()
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if normalized.len() != SECRET_LEN {
            return Err(QauthError::InvalidInput(format!(
                "secret must be {SECRET_LEN} Base32 characters, got {}",
                normalized.len()
            )));
        }
        if let Some(bad) = normalized.chars().find(|&c| base32::value(c).is_none()) {
            return Err(QauthError::InvalidInput(format!(
                "secret contains non-Base32 character {bad:?}"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to the 20 key bytes.
    pub fn to_bytes(&self) -> [u8; SECRET_BYTES] {
        let decoded = base32::decode(&self.0);
        let mut out = [0u8; SECRET_BYTES];
        out.copy_from_slice(&decoded[..SECRET_BYTES]);
        out
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

pub(crate) mod base32 {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    pub fn encode(data: &[u8]) -> String {
        let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
        let mut buffer: u32 = 0;
        let mut bits = 0u32;
        for &b in data {
            buffer = ((buffer << 8) | u32::from(b)) & 0xFFFF;
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
            }
        }
        if bits > 0 {
            out.push(ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
        }
        out
    }

    pub fn value(c: char) -> Option<u32> {
        match c {
            'A'..='Z' => Some(c as u32 - 'A' as u32),
            '2'..='7' => Some(c as u32 - '2' as u32 + 26),
            _ => None,
        }
    }

    /// Decode upper-case, unpadded text. Characters outside the alphabet
    /// are skipped; callers validate first.
    pub fn decode(text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 5 / 8);
        let mut buffer: u32 = 0;
        let mut bits = 0u32;
        for v in text.chars().filter_map(value) {
            buffer = ((buffer << 5) | v) & 0xFFFF;
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                out.push((buffer >> bits) as u8);
            }
        }
        out
    }
}
