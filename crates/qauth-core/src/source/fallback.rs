//! Fallback source: pre-generated secrets from the seed queue, pseudo-random
//! decimal draws.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use crate::config::FallbackDrawSeeding;
use crate::draw::{Alphabet, DRAW_SYMBOLS};
use crate::error::Result;
use crate::queue::SeedQueue;
use crate::secret::Secret;
use crate::source::{RandomSource, SourceMode};

const DRAW_SEED_DOMAIN: &[u8] = b"qauth/fallback-draw/v1";

/// Random source used when no instrument is available.
pub struct FallbackSource {
    queue: SeedQueue,
    seeding: FallbackDrawSeeding,
}

impl FallbackSource {
    pub fn new(queue: SeedQueue, seeding: FallbackDrawSeeding) -> Self {
        Self { queue, seeding }
    }

    pub fn queue(&self) -> &SeedQueue {
        &self.queue
    }
}

/// Seed derived from the player's secret: SHA-256(domain || key bytes).
fn secret_seed(secret: &Secret) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(DRAW_SEED_DOMAIN);
    h.update(secret.to_bytes());
    h.finalize().into()
}

fn decimal_digits<R: Rng>(rng: &mut R) -> String {
    (0..DRAW_SYMBOLS)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

impl RandomSource for FallbackSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Fallback
    }

    fn alphabet(&self) -> Alphabet {
        Alphabet::Decimal
    }

    fn generate_secret(&self) -> Result<Secret> {
        self.queue.pop_front()
    }

    fn draw(&self, identity_secret: &Secret) -> Result<String> {
        let digits = match self.seeding {
            FallbackDrawSeeding::IdentitySecret => {
                decimal_digits(&mut ChaCha20Rng::from_seed(secret_seed(identity_secret)))
            }
            FallbackDrawSeeding::Fresh => decimal_digits(&mut rand::rng()),
        };
        Ok(digits)
    }
}
