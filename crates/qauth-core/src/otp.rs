//! Time-based one-time passwords (RFC 6238, HMAC-SHA1) and provisioning.
//!
//! Verification accepts the code for the current 30-second step and for the
//! steps on either side of it. There is no replay nonce: a code that verified
//! once keeps verifying while its step stays inside that window.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;

use crate::error::{QauthError, Result};
use crate::identity::Identity;
use crate::secret::Secret;

type HmacSha1 = Hmac<Sha1>;

pub const DEFAULT_STEP_SECS: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;
/// Steps tolerated on each side of the current one.
pub const DEFAULT_SKEW_STEPS: u64 = 1;

/// Data an authenticator app needs to register a secret. Rendering it as a
/// QR code is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningDescriptor {
    pub label: String,
    pub issuer: String,
    pub secret: String,
    pub algorithm: &'static str,
    pub digits: u32,
    pub period: u64,
}

impl ProvisioningDescriptor {
    /// `otpauth://totp/<issuer>:<label>?secret=<secret>&issuer=<issuer>`
    ///
    /// Algorithm, digits and period are left out because they are the
    /// defaults every authenticator assumes.
    pub fn uri(&self) -> String {
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}",
            percent_encode(&self.issuer),
            percent_encode(&self.label),
            self.secret,
            percent_encode(&self.issuer)
        )
    }
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// TOTP code generation and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpEngine {
    step_secs: u64,
    digits: u32,
    skew_steps: u64,
}

impl Default for OtpEngine {
    fn default() -> Self {
        Self {
            step_secs: DEFAULT_STEP_SECS,
            digits: DEFAULT_DIGITS,
            skew_steps: DEFAULT_SKEW_STEPS,
        }
    }
}

impl OtpEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn provisioning_descriptor(
        &self,
        identity: &Identity,
        secret: &Secret,
        issuer: &str,
    ) -> ProvisioningDescriptor {
        ProvisioningDescriptor {
            label: identity.to_string(),
            issuer: issuer.to_string(),
            secret: secret.as_str().to_string(),
            algorithm: "SHA1",
            digits: self.digits,
            period: self.step_secs,
        }
    }

    /// HOTP value for a raw counter (RFC 4226 dynamic truncation).
    pub fn code_for_counter(&self, secret: &Secret, counter: u64) -> String {
        let mut mac =
            HmacSha1::new_from_slice(&secret.to_bytes()).expect("HMAC accepts any key size");
        mac.update(&counter.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        let offset = usize::from(hash[hash.len() - 1] & 0x0F);
        let binary = (u32::from(hash[offset] & 0x7F) << 24)
            | (u32::from(hash[offset + 1]) << 16)
            | (u32::from(hash[offset + 2]) << 8)
            | u32::from(hash[offset + 3]);
        let code = binary % 10u32.pow(self.digits);
        format!("{code:0width$}", width = self.digits as usize)
    }

    /// Code for the step containing `unix_secs`.
    pub fn code_at(&self, secret: &Secret, unix_secs: u64) -> String {
        self.code_for_counter(secret, unix_secs / self.step_secs)
    }

    /// Trim user input and check it is exactly `digits` ASCII digits.
    pub fn parse_code(&self, raw: &str) -> Result<String> {
        let code = raw.trim();
        if code.len() != self.digits as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QauthError::InvalidInput(format!(
                "code must be {} digits",
                self.digits
            )));
        }
        Ok(code.to_string())
    }

    /// Verify against the wall clock.
    pub fn verify(&self, secret: &Secret, submitted: &str, now: SystemTime) -> bool {
        let unix_secs = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(secret, submitted, unix_secs)
    }

    /// Verify against an explicit Unix time. Malformed input is simply `false`.
    pub fn verify_at(&self, secret: &Secret, submitted: &str, unix_secs: u64) -> bool {
        let Ok(submitted) = self.parse_code(submitted) else {
            return false;
        };
        let current = unix_secs / self.step_secs;
        let first = current.saturating_sub(self.skew_steps);
        let last = current.saturating_add(self.skew_steps);
        // Check every step so timing does not reveal which one matched.
        (first..=last).fold(false, |matched, counter| {
            let expected = self.code_for_counter(secret, counter);
            constant_time_eq(expected.as_bytes(), submitted.as_bytes()) | matched
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// RFC 6238 Appendix B SHA-1 key: ASCII "12345678901234567890".
    fn rfc_secret() -> Secret {
        Secret::parse("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap()
    }

    // -----------------------------------------------------------------------
    // Code generation
    // -----------------------------------------------------------------------

    #[test]
    fn test_rfc6238_vectors_six_digits() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        assert_eq!(otp.code_at(&s, 59), "287082");
        assert_eq!(otp.code_at(&s, 1111111109), "081804");
        assert_eq!(otp.code_at(&s, 1111111111), "050471");
        assert_eq!(otp.code_at(&s, 1234567890), "005924");
        assert_eq!(otp.code_at(&s, 2000000000), "279037");
    }

    #[test]
    fn test_rfc4226_hotp_vectors() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, code) in expected.iter().enumerate() {
            assert_eq!(otp.code_for_counter(&s, counter as u64), *code);
        }
    }

    // -----------------------------------------------------------------------
    // Verification window
    // -----------------------------------------------------------------------

    #[test]
    fn test_verify_accepts_adjacent_steps() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        let t: u64 = 1_700_000_015;
        for offset in [-30i64, 0, 30] {
            let code = otp.code_at(&s, t.checked_add_signed(offset).unwrap());
            assert!(otp.verify_at(&s, &code, t), "offset {offset}");
        }
    }

    #[test]
    fn test_verify_rejects_two_steps_away() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        let t: u64 = 1_700_000_015;
        for offset in [-60i64, 60] {
            let code = otp.code_at(&s, t.checked_add_signed(offset).unwrap());
            // Guard against an accidental collision with an in-window code.
            let in_window: Vec<String> = [-30i64, 0, 30]
                .iter()
                .map(|&o| otp.code_at(&s, t.checked_add_signed(o).unwrap()))
                .collect();
            if !in_window.contains(&code) {
                assert!(!otp.verify_at(&s, &code, t), "offset {offset}");
            }
        }
    }

    #[test]
    fn test_verify_wall_clock() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        let now = UNIX_EPOCH + Duration::from_secs(1234567890);
        assert!(otp.verify(&s, "005924", now));
        assert!(!otp.verify(&s, "005925", now));
    }

    #[test]
    fn test_verify_near_epoch_does_not_underflow() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        assert!(otp.verify_at(&s, "755224", 5));
    }

    #[test]
    fn test_malformed_codes() {
        let otp = OtpEngine::new();
        let s = rfc_secret();
        assert!(!otp.verify_at(&s, "28708", 59));
        assert!(!otp.verify_at(&s, "2870822", 59));
        assert!(!otp.verify_at(&s, "28a082", 59));
        assert!(otp.verify_at(&s, " 287082 ", 59));
        assert!(otp.parse_code("12 456").is_err());
        assert_eq!(otp.parse_code(" 123456\n").unwrap(), "123456");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"123456", b"123456"));
        assert!(!constant_time_eq(b"123456", b"123457"));
        assert!(!constant_time_eq(b"12345", b"123456"));
    }

    // -----------------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------------

    #[test]
    fn test_provisioning_uri() {
        let otp = OtpEngine::new();
        let id = Identity::parse("Alice@Example.com").unwrap();
        let d = otp.provisioning_descriptor(&id, &rfc_secret(), "QAuth");
        assert_eq!(d.label, "alice@example.com");
        assert_eq!(d.digits, 6);
        assert_eq!(d.period, 30);
        assert_eq!(
            d.uri(),
            "otpauth://totp/QAuth:alice%40example.com?secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ&issuer=QAuth"
        );
    }

    #[test]
    fn test_percent_encode_spaces_and_colons() {
        assert_eq!(percent_encode("Quantum Lab: A"), "Quantum%20Lab%3A%20A");
    }
}
