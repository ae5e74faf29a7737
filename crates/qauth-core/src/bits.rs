//! Fixed-length bit sequences and their packing into secrets and draws.

use std::fmt;

use crate::draw::DRAW_SYMBOLS;
use crate::error::{QauthError, Result};
use crate::secret::{SECRET_BITS, SECRET_BYTES, Secret};

/// Bits per octal draw symbol.
const OCTAL_GROUP: usize = 3;

/// What a bit request is for. Each purpose has an exact length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitPurpose {
    /// 160 bits packed into a Base32 TOTP secret.
    Secret,
    /// 12 bits packed into four octal digits.
    Draw,
}

impl BitPurpose {
    pub const fn bit_len(self) -> usize {
        match self {
            Self::Secret => SECRET_BITS,
            Self::Draw => DRAW_SYMBOLS * OCTAL_GROUP,
        }
    }
}

impl fmt::Display for BitPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret => write!(f, "secret"),
            Self::Draw => write!(f, "draw"),
        }
    }
}

/// Ordered bits, most significant first when packed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSequence {
    bits: Vec<bool>,
}

impl BitSequence {
    pub fn new(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Parse a string of `0`/`1` characters.
    pub fn parse(text: &str) -> Result<Self> {
        text.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(QauthError::InvalidInput(format!(
                    "bit string contains {other:?}"
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub fn ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Truncate to exactly `len` bits. A shorter sequence is returned as
    /// `Err` carrying the number of bits available; it is never padded.
    pub fn take_exact(mut self, len: usize) -> std::result::Result<Self, usize> {
        if self.bits.len() < len {
            return Err(self.bits.len());
        }
        self.bits.truncate(len);
        Ok(self)
    }

    /// Pack into bytes, MSB first. The length must be a multiple of 8.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.bits.len() % 8 != 0 {
            return Err(QauthError::InvalidInput(format!(
                "{} bits do not pack into whole bytes",
                self.bits.len()
            )));
        }
        Ok(self
            .bits
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | u8::from(b)))
            .collect())
    }

    /// Group into 3-bit values, MSB first, rendered as octal digits.
    pub fn to_octal_digits(&self) -> Result<String> {
        if self.bits.len() % OCTAL_GROUP != 0 {
            return Err(QauthError::InvalidInput(format!(
                "{} bits do not split into octal digits",
                self.bits.len()
            )));
        }
        Ok(self
            .bits
            .chunks(OCTAL_GROUP)
            .map(|group| {
                let v = group.iter().fold(0u8, |acc, &b| (acc << 1) | u8::from(b));
                char::from(b'0' + v)
            })
            .collect())
    }
}

impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.bits {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// 160 bits → 20 bytes → 32-character Base32 secret.
pub fn pack_secret(bits: &BitSequence) -> Result<Secret> {
    if bits.len() != SECRET_BITS {
        return Err(QauthError::InvalidInput(format!(
            "secret needs {SECRET_BITS} bits, got {}",
            bits.len()
        )));
    }
    let bytes = bits.to_bytes()?;
    let mut key = [0u8; SECRET_BYTES];
    key.copy_from_slice(&bytes);
    Ok(Secret::from_bytes(&key))
}

/// 12 bits → four octal digits.
pub fn pack_draw(bits: &BitSequence) -> Result<String> {
    let needed = BitPurpose::Draw.bit_len();
    if bits.len() != needed {
        return Err(QauthError::InvalidInput(format!(
            "draw needs {needed} bits, got {}",
            bits.len()
        )));
    }
    bits.to_octal_digits()
}
