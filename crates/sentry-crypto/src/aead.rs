//! AEAD credential encryption (AES-256-GCM) and the memory-hard KDF that
//! derives the master key.
//!
//! The Credential Store stores secrets at rest as authenticated ciphertext
//! with a 256-bit key, a 96-bit random nonce, and a 128-bit tag — exactly
//! what `aes-gcm`'s default `Aes256Gcm` produces. The master key itself is
//! derived with Argon2id from a device-install seed (the same
//! `KeyPair::load_or_generate` seed file discipline used for the device
//! identity key), so derivation is deterministic per install and differs
//! across installs without ever touching a user password.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Argon2id parameters used to derive the master key, persisted alongside
/// each credential so the derivation can be reproduced (and so a future
/// parameter upgrade is detectable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Iteration count.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Random salt used for this derivation.
    pub salt: [u8; 16],
}

impl Default for KdfParams {
    fn default() -> Self {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        Self { memory_kib: 19_456, iterations: 2, parallelism: 1, salt }
    }
}

/// A derived 256-bit master key, zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Derive the master key from a device-install seed using Argon2id.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KdfError`] if the Argon2 parameters are
    /// rejected by the underlying implementation.
    pub fn derive(seed: &[u8], params: &KdfParams) -> CryptoResult<Self> {
        let argon2_params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(32))
            .map_err(|e| CryptoError::KdfError(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
        let mut out = [0u8; 32];
        argon2
            .hash_password_into(seed, &params.salt, &mut out)
            .map_err(|e| CryptoError::KdfError(e.to_string()))?;
        Ok(Self(out))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// Authenticated ciphertext for one stored secret: the random nonce, the
/// ciphertext (tag appended, `aes-gcm`'s native output shape), and the tag
/// length is implicit (always 16 bytes) in that shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sealed {
    /// 96-bit random nonce.
    pub nonce: [u8; 12],
    /// Ciphertext with the 128-bit authentication tag appended.
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// Returns [`CryptoError::KdfError`] only in the (practically unreachable)
/// case the underlying AEAD implementation rejects the key; in practice
/// this never fails for a valid 256-bit key.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> CryptoResult<Sealed> {
    let cipher = key.cipher();
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::KdfError(e.to_string()))?;
    Ok(Sealed { nonce: nonce_bytes, ciphertext })
}

/// Decrypt `sealed` under `key`.
///
/// # Errors
///
/// Returns [`CryptoError::DecryptError`] on tag mismatch (tampering, wrong
/// key, or corrupted storage).
pub fn open(key: &MasterKey, sealed: &Sealed) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let cipher = key.cipher();
    let nonce = Nonce::from_slice(&sealed.nonce);
    let plaintext = cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptError)?;
    Ok(Zeroizing::new(plaintext))
}

/// Re-exported so callers don't need a direct `zeroize` dependency just to
/// hold the value [`open`] returns.
pub use zeroize::Zeroizing;

impl Drop for Sealed {
    fn drop(&mut self) {
        self.ciphertext.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_round_trips() {
        let params = KdfParams::default();
        let key = MasterKey::derive(b"device-seed", &params).unwrap();
        let sealed = seal(&key, b"sk-ant-secret-value").unwrap();
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(&opened[..], b"sk-ant-secret-value");
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let params = KdfParams::default();
        let key = MasterKey::derive(b"device-seed", &params).unwrap();
        let mut sealed = seal(&key, b"top-secret").unwrap();
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0xFF;
        assert!(matches!(open(&key, &sealed), Err(CryptoError::DecryptError)));
    }

    #[test]
    fn same_seed_same_params_is_deterministic() {
        let params = KdfParams::default();
        let key_a = MasterKey::derive(b"device-seed", &params).unwrap();
        let key_b = MasterKey::derive(b"device-seed", &params).unwrap();
        let sealed = seal(&key_a, b"value").unwrap();
        // key_b derives to the same bytes, so it can open key_a's ciphertext.
        assert_eq!(&open(&key_b, &sealed).unwrap()[..], b"value");
    }

    #[test]
    fn different_seeds_derive_different_keys() {
        let params = KdfParams::default();
        let key_a = MasterKey::derive(b"install-a", &params).unwrap();
        let key_b = MasterKey::derive(b"install-b", &params).unwrap();
        let sealed = seal(&key_a, b"value").unwrap();
        assert!(open(&key_b, &sealed).is_err());
    }
}
