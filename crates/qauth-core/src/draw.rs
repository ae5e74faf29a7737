//! The four-digit prize draw.
//!
//! A player guesses four symbols; the active random source draws four.
//! Exact match wins the grand prize, matching the last three wins merch.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{QauthError, Result};
use crate::secret::Secret;
use crate::source::RandomSource;

/// Symbols per guess and per draw.
pub const DRAW_SYMBOLS: usize = 4;

/// Symbol set for guesses and draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alphabet {
    /// `0`–`7`: four 3-bit groups of a 12-bit quantum sample.
    Octal,
    /// `0`–`9`: fallback draws.
    Decimal,
}

impl Alphabet {
    pub fn radix(self) -> u32 {
        match self {
            Self::Octal => 8,
            Self::Decimal => 10,
        }
    }

    pub fn contains(self, c: char) -> bool {
        c.is_ascii_digit() && c.to_digit(10).is_some_and(|d| d < self.radix())
    }

    /// Check a guess: exactly four symbols from this alphabet.
    pub fn validate(self, guess: &str) -> Result<String> {
        let guess = guess.trim();
        if guess.chars().count() != DRAW_SYMBOLS || !guess.chars().all(|c| self.contains(c)) {
            return Err(QauthError::InvalidInput(format!(
                "guess must be {DRAW_SYMBOLS} digits in 0-{}",
                self.radix() - 1
            )));
        }
        Ok(guess.to_string())
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Octal => write!(f, "octal"),
            Self::Decimal => write!(f, "decimal"),
        }
    }
}

/// Validate `guess` against `alphabet`; see [`Alphabet::validate`].
pub fn validate_guess(guess: &str, alphabet: Alphabet) -> Result<String> {
    alphabet.validate(guess)
}

/// Prize tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prize {
    Grand,
    Merch,
    #[serde(rename = "none")]
    Nothing,
}

impl fmt::Display for Prize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grand => write!(f, "grand"),
            Self::Merch => write!(f, "merch"),
            Self::Nothing => write!(f, "none"),
        }
    }
}

/// One completed draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub guess: String,
    pub drawn: String,
    pub prize: Prize,
}

/// Score a draw. The exact match is checked before the suffix match.
pub fn score(drawn: &str, guess: &str) -> Prize {
    if drawn == guess {
        return Prize::Grand;
    }
    let drawn: Vec<char> = drawn.chars().collect();
    let guess: Vec<char> = guess.chars().collect();
    if drawn.len() == DRAW_SYMBOLS && guess.len() == DRAW_SYMBOLS && drawn[1..] == guess[1..] {
        Prize::Merch
    } else {
        Prize::Nothing
    }
}

/// Validates guesses, draws from the active source and scores.
#[derive(Clone)]
pub struct DrawEngine {
    source: Arc<dyn RandomSource>,
}

impl DrawEngine {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.source.alphabet()
    }

    pub fn validate_guess(&self, guess: &str) -> Result<String> {
        validate_guess(guess, self.alphabet())
    }

    /// Draw four symbols. `identity_secret` seeds fallback draws.
    pub fn draw(&self, identity_secret: &Secret) -> Result<String> {
        self.source.draw(identity_secret)
    }

    /// Validate, draw, score. An invalid guess never consumes a draw.
    pub fn play(&self, guess: &str, identity_secret: &Secret) -> Result<Draw> {
        let guess = self.validate_guess(guess)?;
        let drawn = self.draw(identity_secret)?;
        let prize = score(&drawn, &guess);
        Ok(Draw {
            guess,
            drawn,
            prize,
        })
    }
}
