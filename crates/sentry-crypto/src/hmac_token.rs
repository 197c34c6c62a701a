//! HMAC-SHA256 signer for bearer session tokens.
//!
//! Device pairing uses asymmetric Ed25519 signatures because the daemon is
//! verifying a signature made by a key it never holds. Session tokens are
//! the opposite case: the same process both issues and later verifies the
//! token, holding the one symmetric secret throughout, so HMAC is the
//! correct (and cheaper) primitive — a deliberate departure from the
//! Ed25519-signed capability-token shape this crate's sibling crates would
//! otherwise suggest.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// A 256-bit server-held secret used to sign and verify bearer tokens.
pub struct HmacKey([u8; 32]);

impl HmacKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build from raw bytes (e.g. loaded from the device-install seed
    /// file).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Sign `payload`, returning the 32-byte MAC.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> [u8; 32] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.0).expect("HMAC accepts any key length");
        mac.update(payload);
        let result = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    /// Verify `payload` against a previously computed MAC in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::HmacVerificationFailed`] on mismatch.
    pub fn verify(&self, payload: &[u8], mac_bytes: &[u8; 32]) -> CryptoResult<()> {
        let expected = self.sign(payload);
        if expected.ct_eq(mac_bytes).into() {
            Ok(())
        } else {
            Err(CryptoError::HmacVerificationFailed)
        }
    }
}

impl Drop for HmacKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let key = HmacKey::generate();
        let payload = b"owner:device:exp";
        let mac = key.sign(payload);
        assert!(key.verify(payload, &mac).is_ok());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let key = HmacKey::generate();
        let mac = key.sign(b"owner:device:exp");
        assert!(key.verify(b"owner:device:EXP", &mac).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key_a = HmacKey::generate();
        let key_b = HmacKey::generate();
        let mac = key_a.sign(b"payload");
        assert!(key_b.verify(b"payload", &mac).is_err());
    }
}
