use std::time::{SystemTime, UNIX_EPOCH};

use qauth_core::CancelToken;
use qauth_core::otp::DEFAULT_STEP_SECS;

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, identity: &str) {
    let config = super::load_config(opts);
    let service = super::build_service(&config, CancelToken::new());

    let now = SystemTime::now();
    let code = super::or_exit(service.current_code(identity, now), "Error computing code");
    let unix_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let remaining = DEFAULT_STEP_SECS - unix_secs % DEFAULT_STEP_SECS;
    println!("{code}  (valid for {remaining}s more)");
}
