//! Narrow port toward the physical random-bit instrument.
//!
//! The core never reaches into instrument internals. An adapter implements
//! [`Instrument`] over whatever transport the hardware exposes (RPC, serial,
//! vendor SDK); the quantum source drives it only through these verbs.

pub mod simulated;
pub mod wait;

use std::time::Duration;

use crate::error::Result;
use crate::extractor::Trial;

pub use simulated::SimulatedInstrument;
pub use wait::{Backoff, CancelToken, WaitOutcome, poll_until};

/// Parameters pushed to the instrument before a measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionParams {
    /// Name of the pulse sequence to load (e.g. `"rng3"`).
    pub sequence: String,
    /// Baseline pulses per trial preceding the signal pulse.
    pub normalisation_pulses: u32,
    /// Interval of the instrument's analysis timer.
    pub timer_interval: Duration,
    /// Whether per-trial differential counts are recorded.
    pub raw_logging: bool,
}

impl AcquisitionParams {
    pub fn with_raw_logging(&self, raw_logging: bool) -> Self {
        Self {
            raw_logging,
            ..self.clone()
        }
    }
}

/// Logical contract toward the measurement hardware.
pub trait Instrument: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str {
        "instrument"
    }

    /// Apply acquisition parameters. Loading a new sequence may leave the
    /// instrument locked until sampling finishes.
    fn configure(&self, params: &AcquisitionParams) -> Result<()>;

    /// Begin a measurement. The instrument reports locked while it runs.
    fn start(&self) -> Result<()>;

    /// Stop a running measurement.
    fn stop(&self) -> Result<()>;

    /// Whether the instrument is busy (sampling or measuring).
    fn is_locked(&self) -> Result<bool>;

    /// Per-trial raw differential counts of the last measurement.
    fn fetch_raw_log(&self) -> Result<Vec<Trial>>;

    /// Measurement time of the last measurement as reported by the instrument.
    fn elapsed_time(&self) -> Result<Duration>;
}
