pub mod code;
pub mod draw;
pub mod secret;
pub mod seeds;
pub mod serve;
pub mod verify;

use std::path::PathBuf;
use std::sync::Arc;

use qauth_core::{
    CancelToken, FileSecretStore, Instrument, QauthConfig, QauthService, SimulatedInstrument,
    SourceMode, build_source,
};

/// Flags shared by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub source: Option<String>,
    pub store: Option<PathBuf>,
    pub seeds: Option<PathBuf>,
}

/// Print the error and exit with status 1.
pub fn or_exit<T>(result: qauth_core::Result<T>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("{context}: {e}");
            if e.is_retryable() {
                eprintln!("This failure is transient; try again.");
            }
            std::process::exit(1);
        }
    }
}

/// Config file (if any) with command-line overrides applied.
pub fn load_config(opts: &GlobalOpts) -> QauthConfig {
    let mut config = match &opts.config {
        Some(path) => or_exit(QauthConfig::load(path), &format!("Error reading {}", path.display())),
        None => QauthConfig::default(),
    };
    if let Some(source) = &opts.source {
        config.source = or_exit(source.parse::<SourceMode>(), "Invalid --source");
    }
    if let Some(store) = &opts.store {
        config.store_path = store.clone();
    }
    if let Some(seeds) = &opts.seeds {
        config.seed_queue_path = seeds.clone();
    }
    config
}

/// Instrument adapter for quantum mode.
///
/// No hardware transport is linked into this binary, so quantum mode runs
/// against the simulator.
pub fn make_instrument() -> Arc<dyn Instrument> {
    log::warn!("no hardware instrument adapter available, using the simulated instrument");
    Arc::new(SimulatedInstrument::default())
}

/// Compose store and source into a service.
pub fn build_service(config: &QauthConfig, cancel: CancelToken) -> QauthService {
    let instrument = (config.source == SourceMode::Quantum).then(make_instrument);
    let source = or_exit(
        build_source(config, instrument, cancel),
        "Error building random source",
    );
    let store = Arc::new(FileSecretStore::open(&config.store_path));
    QauthService::new(store, source, &config.issuer)
}
