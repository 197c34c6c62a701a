//! Device Pairing (C2, step one of two): challenge/response enrollment
//! of a new device via Ed25519.

use std::sync::Arc;

use rand::RngCore;
use sentry_core::{DeviceId, OwnerId, Timestamp};
use sentry_crypto::{PublicKey, Signature};
use sentry_storage::{KvStore, MemoryKvStore, TypedRepository};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// A paired device's host/os/cpu/mac fingerprint, opaque to this crate.
pub type Fingerprint = String;

/// Maximum number of devices an owner may have paired simultaneously.
pub const MAX_DEVICES_PER_OWNER: usize = 10;

/// How long a pairing challenge remains valid.
pub const CHALLENGE_TTL_SECS: i64 = 5 * 60;

/// An in-flight pairing challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// Unique challenge identifier.
    pub id: String,
    /// Fingerprint of the device this challenge is bound to.
    pub fingerprint: Fingerprint,
    /// 32-byte nonce the device must sign.
    pub nonce: [u8; 32],
    /// When this challenge expires.
    pub expires_at: Timestamp,
}

impl PairingChallenge {
    fn is_expired(&self) -> bool {
        self.expires_at.is_past()
    }
}

/// A device that has completed pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedDevice {
    /// Unique identifier.
    pub id: DeviceId,
    /// Owning account.
    pub owner: OwnerId,
    /// User-suggested display name.
    pub name: String,
    /// Host/os/cpu/mac fingerprint.
    pub fingerprint: Fingerprint,
    /// The device's Ed25519 public key.
    pub public_key: PublicKey,
    /// When pairing completed.
    pub paired_at: Timestamp,
    /// Last time this device was seen in a request.
    pub last_seen_at: Timestamp,
    /// Whether the device is currently trusted. Revocation sets this to
    /// `false` without deleting the record.
    pub trusted: bool,
}

/// Device fingerprinting and challenge/response pairing.
pub struct DevicePairing {
    challenges: TypedRepository<PairingChallenge>,
    devices: TypedRepository<PairedDevice>,
}

impl DevicePairing {
    /// Build an empty pairing service.
    #[must_use]
    pub fn new() -> Self {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        Self {
            challenges: TypedRepository::new(Arc::clone(&store), "pairing_challenges"),
            devices: TypedRepository::new(store, "paired_devices"),
        }
    }

    /// Step one: issue a challenge bound to `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn begin_pairing(&self, fingerprint: Fingerprint) -> AuthResult<PairingChallenge> {
        let mut nonce = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let challenge = PairingChallenge {
            id: uuid::Uuid::new_v4().to_string(),
            fingerprint,
            nonce,
            expires_at: Timestamp::now().plus_seconds(CHALLENGE_TTL_SECS),
        };
        self.challenges.put(&challenge.id, &challenge).await?;
        Ok(challenge)
    }

    /// Step two: verify the device's signature over the challenge nonce,
    /// enforce the per-owner device cap, and record the [`PairedDevice`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown challenge,
    /// [`AuthError::ChallengeExpired`] past its TTL,
    /// [`AuthError::InvalidSignature`] if verification fails, or
    /// [`AuthError::DeviceCapExceeded`] at the 10-device limit.
    pub async fn complete_pairing(
        &self,
        challenge_id: &str,
        signature: &Signature,
        public_key: &PublicKey,
        suggested_name: impl Into<String>,
        owner: OwnerId,
    ) -> AuthResult<PairedDevice> {
        let challenge = self
            .challenges
            .get(challenge_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(challenge_id.to_string()))?;
        if challenge.is_expired() {
            self.challenges.delete(challenge_id).await?;
            return Err(AuthError::ChallengeExpired);
        }
        public_key.verify(&challenge.nonce, signature).map_err(|_| AuthError::InvalidSignature)?;

        let existing = self.devices_for_owner(owner).await?;
        if existing.len() >= MAX_DEVICES_PER_OWNER {
            return Err(AuthError::DeviceCapExceeded);
        }

        let now = Timestamp::now();
        let device = PairedDevice {
            id: DeviceId::new(),
            owner,
            name: suggested_name.into(),
            fingerprint: challenge.fingerprint.clone(),
            public_key: public_key.clone(),
            paired_at: now,
            last_seen_at: now,
            trusted: true,
        };
        self.devices.put(&device.id.to_string(), &device).await?;
        self.challenges.delete(challenge_id).await?;
        Ok(device)
    }

    /// All devices currently paired to `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn devices_for_owner(&self, owner: OwnerId) -> AuthResult<Vec<PairedDevice>> {
        Ok(self.devices.all().await?.into_iter().filter(|d| d.owner == owner).collect())
    }

    /// Revoke a device: sets `trusted=false` without deleting the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if the device does not exist.
    pub async fn revoke(&self, device_id: DeviceId) -> AuthResult<()> {
        let mut device = self
            .devices
            .get(&device_id.to_string())
            .await?
            .ok_or_else(|| AuthError::NotFound(device_id.to_string()))?;
        device.trusted = false;
        self.devices.put(&device_id.to_string(), &device).await?;
        Ok(())
    }

    /// Update `last_seen_at` for a device.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if the device does not exist.
    pub async fn touch(&self, device_id: DeviceId) -> AuthResult<()> {
        let mut device = self
            .devices
            .get(&device_id.to_string())
            .await?
            .ok_or_else(|| AuthError::NotFound(device_id.to_string()))?;
        device.last_seen_at = Timestamp::now();
        self.devices.put(&device_id.to_string(), &device).await?;
        Ok(())
    }
}

impl Default for DevicePairing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use sentry_crypto::KeyPair;

    use super::*;

    #[tokio::test]
    async fn pairing_round_trip_succeeds() {
        let pairing = DevicePairing::new();
        let owner = OwnerId::new();
        let keypair = KeyPair::generate();
        let challenge = pairing.begin_pairing("host-a".to_string()).await.unwrap();
        let signature = keypair.sign(&challenge.nonce);
        let device = pairing
            .complete_pairing(&challenge.id, &signature, &keypair.export_public_key(), "laptop", owner)
            .await
            .unwrap();
        assert!(device.trusted);
        assert_eq!(device.fingerprint, "host-a");
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected() {
        let pairing = DevicePairing::new();
        let owner = OwnerId::new();
        let real_keypair = KeyPair::generate();
        let impostor_keypair = KeyPair::generate();
        let challenge = pairing.begin_pairing("host-a".to_string()).await.unwrap();
        let signature = impostor_keypair.sign(&challenge.nonce);
        let result = pairing
            .complete_pairing(&challenge.id, &signature, &real_keypair.export_public_key(), "laptop", owner)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn device_cap_is_enforced() {
        let pairing = DevicePairing::new();
        let owner = OwnerId::new();
        for i in 0..MAX_DEVICES_PER_OWNER {
            let keypair = KeyPair::generate();
            let challenge = pairing.begin_pairing(format!("host-{i}")).await.unwrap();
            let signature = keypair.sign(&challenge.nonce);
            pairing
                .complete_pairing(&challenge.id, &signature, &keypair.export_public_key(), "dev", owner)
                .await
                .unwrap();
        }
        let keypair = KeyPair::generate();
        let challenge = pairing.begin_pairing("host-overflow".to_string()).await.unwrap();
        let signature = keypair.sign(&challenge.nonce);
        let result = pairing
            .complete_pairing(&challenge.id, &signature, &keypair.export_public_key(), "dev", owner)
            .await;
        assert!(matches!(result, Err(AuthError::DeviceCapExceeded)));
    }

    #[tokio::test]
    async fn revoke_keeps_record_but_untrusts() {
        let pairing = DevicePairing::new();
        let owner = OwnerId::new();
        let keypair = KeyPair::generate();
        let challenge = pairing.begin_pairing("host-a".to_string()).await.unwrap();
        let signature = keypair.sign(&challenge.nonce);
        let device = pairing
            .complete_pairing(&challenge.id, &signature, &keypair.export_public_key(), "laptop", owner)
            .await
            .unwrap();
        pairing.revoke(device.id).await.unwrap();
        let devices = pairing.devices_for_owner(owner).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].trusted);
    }
}
