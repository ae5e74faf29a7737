//! Integration tests for qauth-core.
//!
//! These tests drive the full flows through the public API:
//! source construction → enrollment → code verification → draws.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use qauth_core::{
    AcquisitionConfig, Alphabet, CancelToken, FileSecretStore, Identity, Instrument,
    MemorySecretStore, OtpEngine, Prize, QauthConfig, QauthError, QauthService, Secret,
    SeedQueue, SimulatedInstrument, SourceMode, build_source,
};

fn fast_acquisition() -> AcquisitionConfig {
    AcquisitionConfig {
        secret_window_secs: 0.3,
        draw_window_secs: 0.1,
        prepare_timeout_secs: 1.0,
        settle_secs: 0.0,
        poll_initial_secs: 0.01,
        poll_max_secs: 0.02,
        ..Default::default()
    }
}

fn fallback_service(dir: &tempfile::TempDir, seeds: &[Secret]) -> QauthService {
    let config = QauthConfig {
        store_path: dir.path().join("secrets.json"),
        seed_queue_path: dir.path().join("seeds.txt"),
        ..Default::default()
    };
    let queue = SeedQueue::open(&config.seed_queue_path);
    for seed in seeds {
        queue.push_back(seed).unwrap();
    }
    let source = build_source(&config, None, CancelToken::new()).unwrap();
    let store = Arc::new(FileSecretStore::open(&config.store_path));
    QauthService::new(store, source, &config.issuer)
}

#[test]
fn fallback_enrollment_consumes_queue_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let seeds = [Secret::from_bytes(&[0x11; 20]), Secret::from_bytes(&[0x22; 20])];
    let service = fallback_service(&tmp, &seeds);
    assert_eq!(service.mode(), SourceMode::Fallback);
    assert_eq!(service.alphabet(), Alphabet::Decimal);

    let first = service.issue_secret("alice@example.com").unwrap();
    let second = service.issue_secret("bob@example.com").unwrap();
    assert_eq!(first.secret(), seeds[0].as_str());
    assert_eq!(second.secret(), seeds[1].as_str());

    let err = service.issue_secret("carol@example.com").unwrap_err();
    assert!(matches!(err, QauthError::QueueExhausted(_)));
}

#[test]
fn regenerated_secret_supersedes_old_one() {
    let tmp = tempfile::tempdir().unwrap();
    let old = Secret::from_bytes(&[0x33; 20]);
    let new = Secret::from_bytes(&[0x44; 20]);
    let service = fallback_service(&tmp, &[old.clone(), new.clone()]);
    let otp = OtpEngine::new();

    let t = 1_700_000_000;
    let now = UNIX_EPOCH + Duration::from_secs(t);
    service.issue_secret("dave@example.com").unwrap();
    let old_code = otp.code_at(&old, t);
    assert!(service.verify_code_at("dave@example.com", &old_code, now).unwrap());

    service.issue_secret("dave@example.com").unwrap();
    let new_code = otp.code_at(&new, t);
    assert!(service.verify_code_at("dave@example.com", &new_code, now).unwrap());
    if old_code != new_code {
        assert!(!service.verify_code_at("dave@example.com", &old_code, now).unwrap());
    }
}

#[test]
fn secrets_survive_process_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let seed = Secret::from_bytes(&[0x55; 20]);
    fallback_service(&tmp, &[seed.clone()])
        .issue_secret("erin@example.com")
        .unwrap();

    let restarted = fallback_service(&tmp, &[]);
    let id = Identity::parse("erin@example.com").unwrap();
    assert_eq!(restarted.secret_for(&id).unwrap(), seed);
}

#[test]
fn fallback_draws_are_decimal_and_scored() {
    let tmp = tempfile::tempdir().unwrap();
    let service = fallback_service(&tmp, &[Secret::from_bytes(&[0x66; 20])]);
    service.issue_secret("fay@example.com").unwrap();
    let id = Identity::parse("fay@example.com").unwrap();

    let draw = service.play(&id, "9999").unwrap();
    assert_eq!(draw.drawn.len(), 4);
    assert!(draw.drawn.chars().all(|c| c.is_ascii_digit()));

    let grand = service.play(&id, &draw.drawn).unwrap();
    assert_eq!(grand.prize, Prize::Grand);
}

#[test]
fn quantum_flow_with_simulated_instrument() {
    let config = QauthConfig {
        source: SourceMode::Quantum,
        acquisition: fast_acquisition(),
        ..Default::default()
    };
    let instrument: Arc<dyn Instrument> = Arc::new(SimulatedInstrument::new(2_000.0));
    let source = build_source(&config, Some(instrument), CancelToken::new()).unwrap();
    let service = QauthService::new(Arc::new(MemorySecretStore::new()), source, "QAuth");
    assert_eq!(service.alphabet(), Alphabet::Octal);

    let enrollment = service.issue_secret("gus@example.com").unwrap();
    assert_eq!(enrollment.secret().len(), 32);

    let now = SystemTime::now();
    let code = service.current_code("gus@example.com", now).unwrap();
    assert!(service.verify_code_at("gus@example.com", &code, now).unwrap());

    let id = Identity::parse("gus@example.com").unwrap();
    let draw = service.play(&id, "0000").unwrap();
    assert!(draw.drawn.chars().all(|c| ('0'..='7').contains(&c)));
    assert!(service.play(&id, "0009").is_err());
}

#[test]
fn quantum_short_window_is_retryable() {
    let config = QauthConfig {
        source: SourceMode::Quantum,
        acquisition: AcquisitionConfig {
            secret_window_secs: 0.05,
            ..fast_acquisition()
        },
        ..Default::default()
    };
    // Far too slow to fill 160 bits in 50 ms.
    let instrument: Arc<dyn Instrument> = Arc::new(SimulatedInstrument::new(10.0));
    let source = build_source(&config, Some(instrument), CancelToken::new()).unwrap();

    let err = source.generate_secret().unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, QauthError::AcquisitionTimeout { needed: 160, .. }));
}

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn quantum_default_windows_fill_secret() {
    let config = QauthConfig {
        source: SourceMode::Quantum,
        ..Default::default()
    };
    let instrument: Arc<dyn Instrument> = Arc::new(SimulatedInstrument::default());
    let source = build_source(&config, Some(instrument), CancelToken::new()).unwrap();
    let secret = source.generate_secret().unwrap();
    assert_eq!(secret.as_str().len(), 32);
}
