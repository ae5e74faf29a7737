use qauth_core::CancelToken;

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, identity: &str, cancel: CancelToken) {
    let config = super::load_config(opts);
    let service = super::build_service(&config, cancel);

    if config.source == qauth_core::SourceMode::Quantum {
        println!(
            "Measuring for up to {:.1}s...",
            config.acquisition.secret_window_secs
        );
    }
    let enrollment = super::or_exit(service.issue_secret(identity), "Error issuing secret");

    println!("Identity: {}", enrollment.identity);
    println!("Issuer:   {}", enrollment.provisioning.issuer);
    println!("Secret:   {}", enrollment.secret());
    println!("URI:      {}", enrollment.uri);
    println!();
    println!("Render the URI as a QR code and scan it with an authenticator app.");
    println!("Any previously issued secret for this identity no longer verifies.");
}
