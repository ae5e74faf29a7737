//! Software stand-in for the measurement hardware.
//!
//! Produces trial arrays with pseudo-random photon counts at a fixed trial
//! rate. It exercises the full acquisition choreography without hardware,
//! but its bits come from the thread RNG and are not physical randomness.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{QauthError, Result};
use crate::extractor::Trial;
use crate::instrument::{AcquisitionParams, Instrument};

#[derive(Debug, Default)]
struct SimState {
    params: Option<AcquisitionParams>,
    running_since: Option<Instant>,
    logging: bool,
    elapsed: Duration,
    log: Vec<Trial>,
}

/// Simulated pulsed-measurement instrument.
pub struct SimulatedInstrument {
    trial_rate: f64,
    mean_counts: u64,
    run_limit: Option<Duration>,
    state: Mutex<SimState>,
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new(200.0)
    }
}

impl SimulatedInstrument {
    /// Instrument completing `trial_rate` trials per second.
    pub fn new(trial_rate: f64) -> Self {
        Self {
            trial_rate: trial_rate.max(0.0),
            mean_counts: 40,
            run_limit: None,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Make measurements finish on their own after `limit`.
    pub fn with_run_limit(mut self, limit: Duration) -> Self {
        self.run_limit = Some(limit);
        self
    }

    fn finish(&self, state: &mut SimState) {
        let Some(since) = state.running_since.take() else {
            return;
        };
        let mut elapsed = since.elapsed();
        if let Some(limit) = self.run_limit {
            elapsed = elapsed.min(limit);
        }
        state.elapsed = elapsed;
        if !state.logging {
            return;
        }

        let pulses = state
            .params
            .as_ref()
            .map_or(50, |p| p.normalisation_pulses as usize);
        let complete = (elapsed.as_secs_f64() * self.trial_rate) as usize;
        let mut rng = rand::rng();
        let mut trial = |len: usize| -> Trial {
            (0..len)
                .map(|_| rng.random_range(0..=2 * self.mean_counts))
                .collect()
        };
        state.log = (0..complete).map(|_| trial(pulses + 1)).collect();
        // The log always ends with a partially filled trial.
        state.log.push(trial(pulses / 2));
    }
}

impl Instrument for SimulatedInstrument {
    fn name(&self) -> &str {
        "simulated"
    }

    fn configure(&self, params: &AcquisitionParams) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.params = Some(params.clone());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(params) = state.params.as_ref() else {
            return Err(QauthError::Instrument(
                "start requested before configure".to_string(),
            ));
        };
        state.logging = params.raw_logging;
        state.log.clear();
        state.elapsed = Duration::ZERO;
        state.running_since = Some(Instant::now());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.finish(&mut state);
        Ok(())
    }

    fn is_locked(&self) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(since) = state.running_since else {
            return Ok(false);
        };
        if self.run_limit.is_some_and(|limit| since.elapsed() >= limit) {
            self.finish(&mut state);
            return Ok(false);
        }
        Ok(true)
    }

    fn fetch_raw_log(&self) -> Result<Vec<Trial>> {
        Ok(self.state.lock().unwrap().log.clone())
    }

    fn elapsed_time(&self) -> Result<Duration> {
        Ok(self.state.lock().unwrap().elapsed)
    }
}
