//! Threshold bit extraction from raw differential counts.
//!
//! Each trial of the measurement sequence yields an array of summed photon
//! counts: a run of baseline (normalisation) pulses followed by one signal
//! pulse. The trial's bit is `1` when the baseline mean does not exceed the
//! signal, `0` otherwise.
//!
//! ```text
//! raw log → [trial, trial, ..., partial] → drop partial → threshold → bits
//! ```

use crate::bits::BitSequence;

/// Summed counts for one trial; the final entry is the signal sample.
pub type Trial = Vec<u64>;

/// Outcome of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// One bit per trial considered, in trial order.
    pub bits: BitSequence,
    /// Trials considered (after dropping the trailing partial trial).
    pub trials: usize,
    /// Trials with no usable signal. Their bits are left at `0`.
    pub degenerate: usize,
    /// Whether the trailing trial of the log was discarded.
    pub dropped_tail: bool,
}

impl ExtractionReport {
    /// Percentage of `1` bits, or `None` when no bits were produced.
    pub fn ones_percent(&self) -> Option<f64> {
        if self.bits.is_empty() {
            None
        } else {
            Some(self.bits.ones() as f64 * 100.0 / self.bits.len() as f64)
        }
    }
}

/// Converts raw trial arrays into bits.
#[derive(Debug, Clone, Copy)]
pub struct BitExtractor {
    drop_trailing_trial: bool,
}

impl Default for BitExtractor {
    fn default() -> Self {
        Self {
            drop_trailing_trial: true,
        }
    }
}

impl BitExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use every trial in the log, including the last one.
    ///
    /// The instrument normally closes the log with a partially filled trial,
    /// which is why it is dropped by default.
    pub fn keep_trailing_trial(mut self) -> Self {
        self.drop_trailing_trial = false;
        self
    }

    /// Threshold a single trial. `None` marks a degenerate trial: all zero,
    /// or too short to have a baseline.
    pub fn trial_bit(samples: &[u64]) -> Option<bool> {
        let (&signal, baseline) = samples.split_last()?;
        if baseline.is_empty() || samples.iter().all(|&c| c == 0) {
            return None;
        }
        // mean(baseline) <= signal, without floating point.
        let sum: u128 = baseline.iter().map(|&c| u128::from(c)).sum();
        Some(sum <= u128::from(signal) * baseline.len() as u128)
    }

    pub fn extract(&self, log: &[Trial]) -> ExtractionReport {
        let dropped_tail = self.drop_trailing_trial && !log.is_empty();
        let trials = if dropped_tail {
            &log[..log.len() - 1]
        } else {
            log
        };

        let mut degenerate = 0;
        let bits = trials
            .iter()
            .map(|trial| {
                Self::trial_bit(trial).unwrap_or_else(|| {
                    degenerate += 1;
                    false
                })
            })
            .collect();

        if degenerate > 0 {
            log::warn!(
                "{degenerate} of {} trials carried no signal; their bits default to 0",
                trials.len()
            );
        }

        ExtractionReport {
            bits: BitSequence::new(bits),
            trials: trials.len(),
            degenerate,
            dropped_tail,
        }
    }
}
