//! Random sources for secret issuance and draws.
//!
//! Two variants exist: [`QuantumSource`] drives the physical instrument,
//! [`FallbackSource`] hands out pre-generated secrets and pseudo-random
//! draws. The variant is chosen once at startup by [`build_source`] and is
//! read-only configuration afterwards.

pub mod fallback;
pub mod quantum;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::QauthConfig;
use crate::draw::Alphabet;
use crate::error::{QauthError, Result};
use crate::instrument::{CancelToken, Instrument};
use crate::queue::SeedQueue;
use crate::secret::Secret;

pub use fallback::FallbackSource;
pub use quantum::QuantumSource;

/// Which source variant the process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Live physical measurement.
    Quantum,
    /// Seed queue for secrets, pseudo-random draws.
    #[default]
    Fallback,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quantum => write!(f, "quantum"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = QauthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quantum" | "qrng" => Ok(Self::Quantum),
            "fallback" => Ok(Self::Fallback),
            other => Err(QauthError::Config(format!("unknown source mode '{other}'"))),
        }
    }
}

/// Capability shared by both source variants.
pub trait RandomSource: Send + Sync {
    fn mode(&self) -> SourceMode;

    /// Alphabet of the symbols [`RandomSource::draw`] emits.
    fn alphabet(&self) -> Alphabet;

    /// Produce a fresh 160-bit secret.
    fn generate_secret(&self) -> Result<Secret>;

    /// Produce a four-symbol draw for the player whose secret is given.
    fn draw(&self, identity_secret: &Secret) -> Result<String>;
}

/// Build the configured source.
///
/// Quantum mode needs an instrument adapter; fallback mode opens the seed
/// queue at `config.seed_queue_path`.
pub fn build_source(
    config: &QauthConfig,
    instrument: Option<Arc<dyn Instrument>>,
    cancel: CancelToken,
) -> Result<Arc<dyn RandomSource>> {
    match config.source {
        SourceMode::Quantum => {
            let instrument = instrument.ok_or_else(|| {
                QauthError::Config("quantum mode requires an instrument adapter".to_string())
            })?;
            log::info!(
                "random source: quantum via '{}' instrument",
                instrument.name()
            );
            Ok(Arc::new(
                QuantumSource::new(instrument, config.acquisition.clone()).with_cancel_token(cancel),
            ))
        }
        SourceMode::Fallback => {
            log::info!(
                "random source: fallback, seed queue at {}",
                config.seed_queue_path.display()
            );
            Ok(Arc::new(FallbackSource::new(
                SeedQueue::open(&config.seed_queue_path),
                config.fallback_draw,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::SimulatedInstrument;

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("Quantum".parse::<SourceMode>().unwrap(), SourceMode::Quantum);
        assert_eq!("fallback".parse::<SourceMode>().unwrap(), SourceMode::Fallback);
        assert!("dice".parse::<SourceMode>().is_err());
        assert_eq!(SourceMode::Quantum.to_string(), "quantum");
    }

    #[test]
    fn test_quantum_without_instrument_is_config_error() {
        let config = QauthConfig {
            source: SourceMode::Quantum,
            ..Default::default()
        };
        let err = build_source(&config, None, CancelToken::new()).err().unwrap();
        assert!(matches!(err, QauthError::Config(_)));
    }

    #[test]
    fn test_factory_selects_variant() {
        let quantum = QauthConfig {
            source: SourceMode::Quantum,
            ..Default::default()
        };
        let instrument: Arc<dyn Instrument> = Arc::new(SimulatedInstrument::default());
        let source = build_source(&quantum, Some(instrument), CancelToken::new()).unwrap();
        assert_eq!(source.mode(), SourceMode::Quantum);
        assert_eq!(source.alphabet(), Alphabet::Octal);

        let fallback = QauthConfig::default();
        let source = build_source(&fallback, None, CancelToken::new()).unwrap();
        assert_eq!(source.mode(), SourceMode::Fallback);
        assert_eq!(source.alphabet(), Alphabet::Decimal);
    }
}
