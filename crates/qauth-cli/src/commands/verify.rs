use qauth_core::CancelToken;

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, identity: &str, code: &str) {
    let config = super::load_config(opts);
    // Verification never touches the random source.
    let service = super::build_service(&config, CancelToken::new());

    match service.verify_code(identity, code) {
        Ok(true) => println!("Code is valid!"),
        Ok(false) => {
            println!("Invalid code. Make sure your device's clock is correct.");
            std::process::exit(1);
        }
        Err(qauth_core::QauthError::NotFound(_)) => {
            eprintln!("No secret found for that email. Generate a new QR first.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error verifying code: {e}");
            std::process::exit(1);
        }
    }
}
