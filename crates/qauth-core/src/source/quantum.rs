//! Live source: drives the instrument through one bounded measurement per
//! request and thresholds the raw log into bits.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::bits::{BitPurpose, BitSequence, pack_draw, pack_secret};
use crate::config::AcquisitionConfig;
use crate::draw::Alphabet;
use crate::error::{QauthError, Result};
use crate::extractor::{BitExtractor, Trial};
use crate::instrument::{CancelToken, Instrument, WaitOutcome, poll_until};
use crate::secret::Secret;
use crate::source::{RandomSource, SourceMode};

/// Random source backed by a physical instrument.
pub struct QuantumSource {
    instrument: Arc<dyn Instrument>,
    extractor: BitExtractor,
    config: AcquisitionConfig,
    cancel: CancelToken,
    // One measurement at a time per instrument.
    session: Mutex<()>,
}

impl QuantumSource {
    pub fn new(instrument: Arc<dyn Instrument>, config: AcquisitionConfig) -> Self {
        Self {
            instrument,
            extractor: BitExtractor::new(),
            config,
            cancel: CancelToken::new(),
            session: Mutex::new(()),
        }
    }

    pub fn with_extractor(mut self, extractor: BitExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Acquire exactly `purpose.bit_len()` bits.
    ///
    /// Blocks for the purpose's acquisition window. A window that closes
    /// short of bits fails with [`QauthError::AcquisitionTimeout`].
    pub fn get_seed_bits(&self, purpose: BitPurpose) -> Result<BitSequence> {
        let window = match purpose {
            BitPurpose::Secret => self.config.secret_window(),
            BitPurpose::Draw => self.config.draw_window(),
        };
        let needed = purpose.bit_len();

        let (log, elapsed) = self.acquire(window)?;
        let report = self.extractor.extract(&log);

        let rate = if elapsed.is_zero() {
            0.0
        } else {
            report.trials as f64 / elapsed.as_secs_f64()
        };
        log::info!(
            "{purpose}: {} random bits in {:.1} s => {rate:.2} bits/s",
            report.bits.len(),
            elapsed.as_secs_f64()
        );
        if let Some(ones) = report.ones_percent() {
            log::info!("{purpose}: 0s {:.1}% / 1s {ones:.1}%", 100.0 - ones);
        }

        report
            .bits
            .take_exact(needed)
            .map_err(|got| QauthError::AcquisitionTimeout {
                needed,
                got,
                elapsed,
            })
    }

    fn acquire(&self, window: Duration) -> Result<(Vec<Trial>, Duration)> {
        let _session = self.session.lock().unwrap();
        let instrument = self.instrument.as_ref();
        let params = self.config.params();

        let measured = instrument
            .configure(&params)
            .and_then(|()| self.measure(window));
        // Raw logging goes off on every exit path, failed or not.
        if let Err(e) = instrument.configure(&params.with_raw_logging(false)) {
            if measured.is_ok() {
                return Err(e);
            }
            log::warn!("could not turn raw logging off: {e}");
        }
        measured?;

        let log = instrument.fetch_raw_log()?;
        let elapsed = instrument.elapsed_time()?;
        Ok((log, elapsed))
    }

    /// Prepare, start and run one measurement, stopping the instrument
    /// unless it finished on its own.
    fn measure(&self, window: Duration) -> Result<()> {
        let instrument = self.instrument.as_ref();
        let backoff = self.config.backoff();

        let prepare_deadline = Instant::now() + self.config.prepare_timeout();
        match poll_until(prepare_deadline, backoff, &self.cancel, || {
            Ok(!instrument.is_locked()?)
        })? {
            WaitOutcome::Ready => {}
            WaitOutcome::TimedOut => {
                return Err(QauthError::InstrumentBusy(self.config.prepare_timeout()));
            }
            WaitOutcome::Cancelled => return Err(QauthError::Cancelled),
        }

        log::debug!("measurement started on '{}' for {window:?}", instrument.name());
        let started = Instant::now();
        let deadline = started + window;
        instrument.start()?;

        let measured = self.wait_for_measurement(started, deadline);
        if !matches!(measured, Ok(WaitOutcome::Ready)) {
            // Never leave the instrument running past the window.
            if let Err(e) = instrument.stop() {
                match measured {
                    Ok(WaitOutcome::TimedOut) => return Err(e),
                    _ => log::warn!("stopping the instrument failed: {e}"),
                }
            }
        }
        match measured? {
            WaitOutcome::Ready => log::debug!("measurement finished before the window closed"),
            WaitOutcome::TimedOut => log::debug!("window closed, measurement stopped"),
            WaitOutcome::Cancelled => {
                log::warn!("measurement cancelled, instrument stopped");
                return Err(QauthError::Cancelled);
            }
        }
        Ok(())
    }

    /// Wait through the settle period for the instrument to report locked,
    /// then until it unlocks or the deadline passes.
    fn wait_for_measurement(&self, started: Instant, deadline: Instant) -> Result<WaitOutcome> {
        let instrument = self.instrument.as_ref();
        let backoff = self.config.backoff();

        let settle_deadline = (started + self.config.settle()).min(deadline);
        if poll_until(settle_deadline, backoff, &self.cancel, || instrument.is_locked())?
            == WaitOutcome::Cancelled
        {
            return Ok(WaitOutcome::Cancelled);
        }
        poll_until(deadline, backoff, &self.cancel, || {
            Ok(!instrument.is_locked()?)
        })
    }
}

impl RandomSource for QuantumSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Quantum
    }

    fn alphabet(&self) -> Alphabet {
        Alphabet::Octal
    }

    fn generate_secret(&self) -> Result<Secret> {
        let bits = self.get_seed_bits(BitPurpose::Secret)?;
        pack_secret(&bits)
    }

    fn draw(&self, _identity_secret: &Secret) -> Result<String> {
        let bits = self.get_seed_bits(BitPurpose::Draw)?;
        pack_draw(&bits)
    }
}
