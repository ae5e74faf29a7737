//! Process configuration, loaded once at startup and injected.
//!
//! Every field has a default, so a partial JSON file (or none at all) is
//! valid. The session-signing key never comes from the file: [`SessionKey`]
//! is read from `QAUTH_SESSION_KEY` so that it is always supplied by the
//! deployment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QauthError, Result};
use crate::instrument::{AcquisitionParams, Backoff};
use crate::source::SourceMode;

/// Environment variable holding the session-signing key.
pub const SESSION_KEY_ENV: &str = "QAUTH_SESSION_KEY";

/// Minimum accepted session key length in bytes.
pub const MIN_SESSION_KEY_LEN: usize = 16;

/// How fallback-mode draws get their randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackDrawSeeding {
    /// Seed from the player's own stored secret. Reproducible, and therefore
    /// predictable to anyone who can read that secret.
    #[default]
    IdentitySecret,
    /// Fresh thread-RNG randomness on every draw.
    Fresh,
}

/// Instrument choreography parameters for the quantum source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Measurement window for a 160-bit secret.
    pub secret_window_secs: f64,
    /// Measurement window for a 12-bit draw.
    pub draw_window_secs: f64,
    /// How long to wait for the instrument to unlock after configuration.
    pub prepare_timeout_secs: f64,
    /// Grace period after `start` before an unlocked instrument counts as done.
    pub settle_secs: f64,
    pub poll_initial_secs: f64,
    pub poll_max_secs: f64,
    pub sequence: String,
    pub normalisation_pulses: u32,
    pub timer_interval_secs: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            secret_window_secs: 15.0,
            draw_window_secs: 1.75,
            prepare_timeout_secs: 30.0,
            settle_secs: 1.0,
            poll_initial_secs: 0.1,
            poll_max_secs: 1.0,
            sequence: "rng3".to_string(),
            normalisation_pulses: 50,
            timer_interval_secs: 0.2,
        }
    }
}

impl AcquisitionConfig {
    pub fn secret_window(&self) -> Duration {
        secs(self.secret_window_secs)
    }

    pub fn draw_window(&self) -> Duration {
        secs(self.draw_window_secs)
    }

    pub fn prepare_timeout(&self) -> Duration {
        secs(self.prepare_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        secs(self.settle_secs)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial: secs(self.poll_initial_secs),
            max: secs(self.poll_max_secs),
            factor: 2,
        }
    }

    pub fn params(&self) -> AcquisitionParams {
        AcquisitionParams {
            sequence: self.sequence.clone(),
            normalisation_pulses: self.normalisation_pulses,
            timer_interval: secs(self.timer_interval_secs),
            raw_logging: true,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QauthConfig {
    pub source: SourceMode,
    pub issuer: String,
    pub store_path: PathBuf,
    pub seed_queue_path: PathBuf,
    pub fallback_draw: FallbackDrawSeeding,
    pub acquisition: AcquisitionConfig,
}

impl Default for QauthConfig {
    fn default() -> Self {
        Self {
            source: SourceMode::default(),
            issuer: "QAuth".to_string(),
            store_path: PathBuf::from("qauth-secrets.json"),
            seed_queue_path: PathBuf::from("seeds.txt"),
            fallback_draw: FallbackDrawSeeding::default(),
            acquisition: AcquisitionConfig::default(),
        }
    }
}

impl QauthConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

/// Session-signing key. There is no built-in default.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Accept `key` if it is at least [`MIN_SESSION_KEY_LEN`] bytes.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() < MIN_SESSION_KEY_LEN {
            return Err(QauthError::Config(format!(
                "session key must be at least {MIN_SESSION_KEY_LEN} bytes"
            )));
        }
        Ok(Self(key))
    }

    /// Read the key from [`SESSION_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(SESSION_KEY_ENV).map_err(|_| {
            QauthError::Config(format!("{SESSION_KEY_ENV} must be set to sign sessions"))
        })?;
        Self::new(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}
