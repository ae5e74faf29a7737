//! Enrollment, verification and draw flows over a store and a source.
//!
//! ```text
//! issue:  source → secret → store.upsert → provisioning descriptor
//! verify: store.get → otp.verify
//! play:   store.get → draw engine (source, 12-bit path) → prize
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::draw::{Alphabet, Draw, DrawEngine};
use crate::error::Result;
use crate::identity::Identity;
use crate::otp::{OtpEngine, ProvisioningDescriptor};
use crate::secret::Secret;
use crate::source::{RandomSource, SourceMode};
use crate::store::SecretStore;

/// Result of issuing a secret.
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub identity: String,
    pub provisioning: ProvisioningDescriptor,
    pub uri: String,
}

impl Enrollment {
    pub fn secret(&self) -> &str {
        &self.provisioning.secret
    }
}

/// Everything a front end needs, composed once at startup.
pub struct QauthService {
    store: Arc<dyn SecretStore>,
    source: Arc<dyn RandomSource>,
    otp: OtpEngine,
    draws: DrawEngine,
    issuer: String,
}

impl QauthService {
    pub fn new(
        store: Arc<dyn SecretStore>,
        source: Arc<dyn RandomSource>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            store,
            draws: DrawEngine::new(Arc::clone(&source)),
            source,
            otp: OtpEngine::new(),
            issuer: issuer.into(),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    pub fn alphabet(&self) -> Alphabet {
        self.draws.alphabet()
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn otp(&self) -> &OtpEngine {
        &self.otp
    }

    /// Generate a new secret for `identity`, replacing any previous one.
    pub fn issue_secret(&self, identity: &str) -> Result<Enrollment> {
        let identity = Identity::parse(identity)?;
        let secret = self.source.generate_secret()?;
        self.store.upsert(&identity, secret.clone())?;
        log::info!("issued new {} secret for {identity}", self.source.mode());

        let provisioning = self
            .otp
            .provisioning_descriptor(&identity, &secret, &self.issuer);
        Ok(Enrollment {
            identity: identity.to_string(),
            uri: provisioning.uri(),
            provisioning,
        })
    }

    /// Stored secret for `identity`.
    pub fn secret_for(&self, identity: &Identity) -> Result<Secret> {
        self.store.get(identity)
    }

    /// Check a submitted code against the identity's current secret.
    ///
    /// `Ok(false)` is a wrong code; errors are unknown identities or
    /// malformed codes.
    pub fn verify_code(&self, identity: &str, code: &str) -> Result<bool> {
        self.verify_code_at(identity, code, SystemTime::now())
    }

    pub fn verify_code_at(&self, identity: &str, code: &str, now: SystemTime) -> Result<bool> {
        let identity = Identity::parse(identity)?;
        let code = self.otp.parse_code(code)?;
        let secret = self.store.get(&identity)?;
        let valid = self.otp.verify(&secret, &code, now);
        log::debug!("code for {identity} valid={valid}");
        Ok(valid)
    }

    /// Current code for `identity`, as an authenticator app would show it.
    pub fn current_code(&self, identity: &str, now: SystemTime) -> Result<String> {
        let identity = Identity::parse(identity)?;
        let secret = self.store.get(&identity)?;
        let unix_secs = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(self.otp.code_at(&secret, unix_secs))
    }

    /// Play one draw for an already-verified identity.
    pub fn play(&self, identity: &Identity, guess: &str) -> Result<Draw> {
        let secret = self.store.get(identity)?;
        let draw = self.draws.play(guess, &secret)?;
        log::info!(
            "draw for {identity}: guess {} drawn {} prize {}",
            draw.guess,
            draw.drawn,
            draw.prize
        );
        Ok(draw)
    }

    /// Verify `code`, then play. `Ok(None)` means the code was rejected and
    /// no draw ran.
    pub fn play_verified(&self, identity: &str, code: &str, guess: &str) -> Result<Option<Draw>> {
        self.play_verified_at(identity, code, guess, SystemTime::now())
    }

    pub fn play_verified_at(
        &self,
        identity: &str,
        code: &str,
        guess: &str,
        now: SystemTime,
    ) -> Result<Option<Draw>> {
        if !self.verify_code_at(identity, code, now)? {
            log::info!("draw refused: code rejected");
            return Ok(None);
        }
        let identity = Identity::parse(identity)?;
        self.play(&identity, guess).map(Some)
    }
}
