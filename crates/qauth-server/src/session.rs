//! Signed session tokens.
//!
//! A token is `<uuid>.<hex HMAC-SHA256(key, uuid)>`. The signature lets the
//! server reject forged or truncated tokens before touching the session map;
//! the map itself decides whether a well-signed token is still live.
//!
//! Each identity holds at most one session. Verifying again closes the
//! identity's older session, so the map never outgrows the set of verified
//! identities.

use std::collections::HashMap;
use std::sync::Mutex;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use qauth_core::Identity;

type HmacSha256 = Hmac<Sha256>;

#[derive(Default)]
struct Table {
    by_id: HashMap<Uuid, Identity>,
    by_identity: HashMap<Identity, Uuid>,
}

impl Table {
    fn insert(&mut self, id: Uuid, identity: Identity) {
        if let Some(previous) = self.by_id.get(&id)
            && self.by_identity.get(previous) == Some(&id)
        {
            let previous = previous.clone();
            self.by_identity.remove(&previous);
        }
        if let Some(older) = self.by_identity.insert(identity.clone(), id)
            && older != id
        {
            self.by_id.remove(&older);
        }
        self.by_id.insert(id, identity);
    }

    fn remove(&mut self, id: &Uuid) -> bool {
        match self.by_id.remove(id) {
            Some(identity) => {
                if self.by_identity.get(&identity) == Some(id) {
                    self.by_identity.remove(&identity);
                }
                true
            }
            None => false,
        }
    }
}

/// Live sessions, each holding one authenticated identity.
pub struct SessionRegistry {
    key: Vec<u8>,
    sessions: Mutex<Table>,
}

impl SessionRegistry {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            sessions: Mutex::new(Table::default()),
        }
    }

    fn mac(&self, id: &Uuid) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key size");
        mac.update(id.as_bytes());
        mac
    }

    fn sign(&self, id: &Uuid) -> String {
        format!("{id}.{}", hex::encode(&self.mac(id).finalize().into_bytes()))
    }

    /// Session id of a correctly signed token, live or not.
    fn verified_id(&self, token: &str) -> Option<Uuid> {
        let (id, sig) = token.trim().split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        let sig = hex::decode(sig)?;
        self.mac(&id).verify_slice(&sig).ok()?;
        Some(id)
    }

    /// Bind `identity` to a session and return its token.
    ///
    /// A valid `existing` token keeps its id and has its identity replaced;
    /// otherwise a fresh session is opened. Any other session `identity`
    /// held is closed.
    pub fn bind(&self, existing: Option<&str>, identity: Identity) -> String {
        let id = existing
            .and_then(|t| self.verified_id(t))
            .unwrap_or_else(Uuid::new_v4);
        self.sessions.lock().unwrap().insert(id, identity);
        self.sign(&id)
    }

    /// Identity held by a live session.
    pub fn resolve(&self, token: &str) -> Option<Identity> {
        let id = self.verified_id(token)?;
        self.sessions.lock().unwrap().by_id.get(&id).cloned()
    }

    /// End a session. Returns whether one was live.
    pub fn close(&self, token: &str) -> bool {
        match self.verified_id(token) {
            Some(id) => self.sessions.lock().unwrap().remove(&id),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod hex {
    pub fn encode(data: &[u8]) -> String {
        data.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(text: &str) -> Option<Vec<u8>> {
        if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn alice() -> Identity {
        Identity::parse("alice@example.com").unwrap()
    }

    #[test]
    fn test_bind_and_resolve() {
        let sessions = SessionRegistry::new(KEY);
        let token = sessions.bind(None, alice());
        assert_eq!(sessions.resolve(&token), Some(alice()));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_rebind_replaces_identity() {
        let sessions = SessionRegistry::new(KEY);
        let token = sessions.bind(None, alice());
        let bob = Identity::parse("bob@example.com").unwrap();
        let rebound = sessions.bind(Some(&token), bob.clone());
        assert_eq!(rebound, token);
        assert_eq!(sessions.resolve(&token), Some(bob));
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_forged_tokens_rejected() {
        let sessions = SessionRegistry::new(KEY);
        let token = sessions.bind(None, alice());
        let (id, _) = token.split_once('.').unwrap();

        assert_eq!(sessions.resolve(&format!("{id}.{}", "00".repeat(32))), None);
        assert_eq!(sessions.resolve(id), None);
        assert_eq!(sessions.resolve(""), None);
        assert_eq!(sessions.resolve(&format!("{id}.zz")), None);

        let other = SessionRegistry::new(b"another-key-another-key");
        assert_eq!(other.resolve(&token), None);
    }

    #[test]
    fn test_forged_token_does_not_rebind() {
        let sessions = SessionRegistry::new(KEY);
        let victim = sessions.bind(None, alice());
        let (id, _) = victim.split_once('.').unwrap();
        let forged = format!("{id}.{}", "ab".repeat(32));

        let token = sessions.bind(Some(&forged), Identity::parse("eve@example.com").unwrap());
        assert_ne!(token, victim);
        assert_eq!(sessions.resolve(&victim), Some(alice()));
    }

    #[test]
    fn test_close() {
        let sessions = SessionRegistry::new(KEY);
        let token = sessions.bind(None, alice());
        assert!(sessions.close(&token));
        assert!(!sessions.close(&token));
        assert_eq!(sessions.resolve(&token), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex::decode("00ff10"), Some(vec![0x00, 0xff, 0x10]));
        assert_eq!(hex::decode("abc"), None);
        assert_eq!(hex::decode("zz"), None);
        assert_eq!(hex::decode("+f"), None);
        assert_eq!(hex::decode("-1"), None);
    }

    #[test]
    fn test_sign_prefixed_signature_rejected() {
        let sessions = SessionRegistry::new(KEY);
        // Find a signature with a byte whose high nibble is zero: "+f" would
        // parse as 0x0f under a lenient decoder and stand in for "0f".
        let (token, at) = (0..500)
            .find_map(|_| {
                let token = sessions.bind(None, alice());
                let (_, sig) = token.split_once('.').unwrap();
                let at = (0..sig.len()).step_by(2).find(|&i| &sig[i..=i] == "0")?;
                Some((token, at))
            })
            .unwrap();
        let dot = token.find('.').unwrap();
        let mut tampered = token.clone();
        tampered.replace_range(dot + 1 + at..dot + 2 + at, "+");

        assert_eq!(sessions.resolve(&token), Some(alice()));
        assert_eq!(sessions.resolve(&tampered), None);
        assert!(!sessions.close(&tampered));
    }

    #[test]
    fn test_repeated_binds_keep_one_session_per_identity() {
        let sessions = SessionRegistry::new(KEY);
        let first = sessions.bind(None, alice());
        let mut last = first.clone();
        for _ in 0..1000 {
            last = sessions.bind(None, alice());
        }
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.resolve(&first), None);
        assert_eq!(sessions.resolve(&last), Some(alice()));
    }

    #[test]
    fn test_rebind_evicts_target_identity_session() {
        let sessions = SessionRegistry::new(KEY);
        let bob = Identity::parse("bob@example.com").unwrap();
        let bobs = sessions.bind(None, bob.clone());
        let alices = sessions.bind(None, alice());

        // Alice's session now verifies as bob: bob's older session ends.
        assert_eq!(sessions.bind(Some(&alices), bob.clone()), alices);
        assert_eq!(sessions.resolve(&bobs), None);
        assert_eq!(sessions.resolve(&alices), Some(bob.clone()));
        assert_eq!(sessions.len(), 1);

        // Alice can open a fresh session without disturbing bob's.
        let fresh = sessions.bind(None, alice());
        assert_eq!(sessions.len(), 2);
        assert!(sessions.close(&alices));
        assert_eq!(sessions.resolve(&fresh), Some(alice()));
        assert_eq!(sessions.len(), 1);
    }
}
