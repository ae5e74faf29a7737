//! # qauth-core
//!
//! Two-factor enrollment and a prize draw backed by a physical random source.
//!
//! `qauth-core` issues 160-bit TOTP secrets, verifies six-digit codes against
//! them and runs a four-digit lottery draw. Randomness comes from one of two
//! interchangeable sources, chosen once at startup:
//!
//! - **Quantum**: drives a measurement instrument through the narrow
//!   [`Instrument`] port and thresholds per-trial photon counts into bits.
//! - **Fallback**: pops pre-generated secrets from a durable [`SeedQueue`]
//!   and draws decimal digits from a seeded ChaCha20 stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use qauth_core::{CancelToken, FileSecretStore, QauthConfig, QauthService, build_source};
//!
//! let config = QauthConfig::default();
//! let source = build_source(&config, None, CancelToken::new()).unwrap();
//! let store = Arc::new(FileSecretStore::open(&config.store_path));
//! let service = QauthService::new(store, source, &config.issuer);
//!
//! let enrollment = service.issue_secret("alice@example.com").unwrap();
//! println!("{}", enrollment.uri);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Instrument → raw log → BitExtractor → BitSequence → Secret | draw digits
//!                                                       │
//!              SeedQueue ───────────────────────────────┘ (fallback)
//! ```

pub mod bits;
pub mod config;
pub mod draw;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod instrument;
pub mod otp;
pub mod queue;
pub mod secret;
pub mod service;
pub mod source;
pub mod store;

pub use bits::{BitPurpose, BitSequence, pack_draw, pack_secret};
pub use config::{
    AcquisitionConfig, FallbackDrawSeeding, QauthConfig, SESSION_KEY_ENV, SessionKey,
};
pub use draw::{Alphabet, DRAW_SYMBOLS, Draw, DrawEngine, Prize, score, validate_guess};
pub use error::{QauthError, Result};
pub use extractor::{BitExtractor, ExtractionReport, Trial};
pub use identity::Identity;
pub use instrument::{
    AcquisitionParams, Backoff, CancelToken, Instrument, SimulatedInstrument, WaitOutcome,
    poll_until,
};
pub use otp::{OtpEngine, ProvisioningDescriptor};
pub use queue::SeedQueue;
pub use secret::{SECRET_BITS, SECRET_BYTES, Secret};
pub use service::{Enrollment, QauthService};
pub use source::{FallbackSource, QuantumSource, RandomSource, SourceMode, build_source};
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
