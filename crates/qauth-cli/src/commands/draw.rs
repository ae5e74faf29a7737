use qauth_core::{CancelToken, Prize, QauthError};

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, identity: &str, code: &str, guess: &str, cancel: CancelToken) {
    let config = super::load_config(opts);
    let service = super::build_service(&config, cancel);

    let draw = match service.play_verified(identity, code, guess) {
        Ok(Some(draw)) => draw,
        Ok(None) => {
            println!("Invalid code. Make sure your device's clock is correct.");
            std::process::exit(1);
        }
        Err(QauthError::NotFound(_)) => {
            eprintln!("No secret found for that email. Generate a new QR first.");
            std::process::exit(1);
        }
        Err(e) => super::or_exit(Err(e), "Error playing draw"),
    };
    println!("Your guess: {}", draw.guess);
    println!("Drawn:      {} ({})", draw.drawn, service.alphabet());
    match draw.prize {
        Prize::Grand => println!("Grand prize!"),
        Prize::Merch => println!("Last three match: merch prize."),
        Prize::Nothing => println!("No prize this time."),
    }
}
