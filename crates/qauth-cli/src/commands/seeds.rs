use qauth_core::{CancelToken, QuantumSource, RandomSource, Secret, SeedQueue};

use super::GlobalOpts;

fn open_queue(opts: &GlobalOpts) -> SeedQueue {
    let config = super::load_config(opts);
    SeedQueue::open(&config.seed_queue_path)
}

pub fn status(opts: &GlobalOpts) {
    let queue = open_queue(opts);
    let left = super::or_exit(queue.len(), "Error reading seed queue");
    println!("Seed queue: {}", queue.path().display());
    println!("  {left} secret(s) left");
    if left == 0 {
        println!("  Secret issuance in fallback mode will fail until the queue is refilled.");
    }
}

pub fn push(opts: &GlobalOpts, secret: &str) {
    let queue = open_queue(opts);
    let secret = super::or_exit(Secret::parse(secret), "Invalid secret");
    super::or_exit(queue.push_back(&secret), "Error writing seed queue");
    let left = super::or_exit(queue.len(), "Error reading seed queue");
    println!("Queued. {left} secret(s) in {}", queue.path().display());
}

/// Generate `count` secrets on the quantum path and append them to the queue.
pub fn fill(opts: &GlobalOpts, count: usize, cancel: CancelToken) {
    let config = super::load_config(opts);
    let queue = SeedQueue::open(&config.seed_queue_path);
    let source = QuantumSource::new(super::make_instrument(), config.acquisition.clone())
        .with_cancel_token(cancel);

    println!(
        "Harvesting {count} secret(s), up to {:.1}s each",
        config.acquisition.secret_window_secs
    );
    let mut added = 0;
    let mut failed = 0;
    for i in 1..=count {
        match source.generate_secret() {
            Ok(secret) => {
                super::or_exit(queue.push_back(&secret), "Error writing seed queue");
                added += 1;
                log::info!("secret {i}/{count} queued");
            }
            Err(qauth_core::QauthError::Cancelled) => {
                eprintln!("Cancelled after {added} secret(s).");
                break;
            }
            Err(e) if e.is_retryable() => {
                failed += 1;
                log::warn!("secret {i}/{count} skipped: {e}");
            }
            Err(e) => {
                eprintln!("Error harvesting secret: {e}");
                std::process::exit(1);
            }
        }
    }

    let left = super::or_exit(queue.len(), "Error reading seed queue");
    println!("Added {added}, skipped {failed}. {left} secret(s) in {}", queue.path().display());
}
