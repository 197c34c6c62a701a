//! Session Authenticator (C2, step two of two): short-lived bearer
//! tokens with rotation, signed with a server-held HMAC secret.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use rand::RngCore;
use sentry_core::{DeviceId, OwnerId, Timestamp};
use sentry_crypto::HmacKey;
use sentry_storage::{KvStore, MemoryKvStore, TypedRepository};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};

/// Access token lifetime in seconds.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Refresh token lifetime in seconds.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// An operation category, used to decide whether an unverified-MFA
/// token may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOperation {
    /// A normal, MFA-gated operation.
    Normal,
    /// Enrolling a new MFA factor.
    MfaEnrollment,
    /// Using a one-time emergency code in place of MFA.
    EmergencyCode,
}

/// The claims carried by a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Owning account.
    pub owner: OwnerId,
    /// Device the token was issued to.
    pub device_id: DeviceId,
    /// Whether MFA has been verified for this session.
    pub mfa_verified: bool,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expires-at (unix seconds).
    pub exp: i64,
}

impl AccessClaims {
    fn is_expired(&self) -> bool {
        Timestamp::now().unix_timestamp() >= self.exp
    }
}

/// Record of one refresh-token lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    owner: OwnerId,
    device_id: DeviceId,
    mfa_verified: bool,
    created_at: Timestamp,
    expires_at: Timestamp,
    revoked: bool,
}

/// A freshly issued or refreshed token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Opaque bearer access token.
    pub access_token: String,
    /// Opaque refresh token; presenting it via [`SessionAuthenticator::refresh`]
    /// mints a new pair and invalidates this one.
    pub refresh_token: String,
    /// The claims embedded in `access_token`.
    pub claims: AccessClaims,
}

/// Issues, verifies, and rotates bearer session tokens.
pub struct SessionAuthenticator {
    hmac_key: HmacKey,
    sessions: TypedRepository<SessionRecord>,
    revoked_owners: RwLock<HashSet<OwnerId>>,
}

impl SessionAuthenticator {
    /// Build an authenticator signing tokens with `hmac_key`.
    #[must_use]
    pub fn new(hmac_key: HmacKey) -> Self {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        Self {
            hmac_key,
            sessions: TypedRepository::new(store, "sessions"),
            revoked_owners: RwLock::new(HashSet::new()),
        }
    }

    /// Issue a fresh access/refresh token pair for a paired device.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn issue(
        &self,
        owner: OwnerId,
        device_id: DeviceId,
        mfa_verified: bool,
    ) -> AuthResult<TokenPair> {
        let now = Timestamp::now();
        let claims = AccessClaims {
            owner,
            device_id,
            mfa_verified,
            iat: now.unix_timestamp(),
            exp: now.plus_seconds(ACCESS_TOKEN_TTL_SECS).unix_timestamp(),
        };
        let access_token = self.encode_access_token(&claims);
        let refresh_token = self.new_opaque_token();
        let record = SessionRecord {
            owner,
            device_id,
            mfa_verified,
            created_at: now,
            expires_at: now.plus_seconds(REFRESH_TOKEN_TTL_SECS),
            revoked: false,
        };
        self.sessions.put(&refresh_token, &record).await?;
        Ok(TokenPair { access_token, refresh_token, claims })
    }

    /// Verify a bearer access token for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the signature or encoding
    /// is bad, [`AuthError::TokenExpired`] past `exp`, or
    /// [`AuthError::MfaRequired`] when `operation` is
    /// [`SessionOperation::Normal`] and the claims carry
    /// `mfa_verified=false`.
    pub fn verify_access_token(
        &self,
        token: &str,
        operation: SessionOperation,
    ) -> AuthResult<AccessClaims> {
        let claims = self.decode_access_token(token)?;
        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        if operation == SessionOperation::Normal && !claims.mfa_verified {
            return Err(AuthError::MfaRequired);
        }
        Ok(claims)
    }

    /// Rotate the opaque refresh token, minting a new access/refresh
    /// pair. Presenting an already-consumed or explicitly revoked
    /// refresh token revokes every session for that owner (suspected
    /// theft) and returns [`AuthError::TokenRevoked`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown token,
    /// [`AuthError::TokenRevoked`] for a consumed/revoked one, or
    /// [`AuthError::TokenExpired`] past the refresh TTL.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let record = self
            .sessions
            .get(refresh_token)
            .await?
            .ok_or_else(|| AuthError::NotFound(refresh_token.to_string()))?;

        if record.revoked || self.revoked_owners.read().await.contains(&record.owner) {
            self.revoke_all_for_owner(record.owner).await?;
            return Err(AuthError::TokenRevoked);
        }
        if Timestamp::now().unix_timestamp() >= record.expires_at.unix_timestamp() {
            return Err(AuthError::TokenExpired);
        }

        // Consuming this refresh token invalidates it; a second
        // presentation is therefore treated as theft.
        let mut consumed = record.clone();
        consumed.revoked = true;
        self.sessions.put(refresh_token, &consumed).await?;

        self.issue(record.owner, record.device_id, record.mfa_verified).await
    }

    /// Explicitly revoke a single refresh token (e.g. on logout).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if the token is unknown.
    pub async fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        let mut record = self
            .sessions
            .get(refresh_token)
            .await?
            .ok_or_else(|| AuthError::NotFound(refresh_token.to_string()))?;
        record.revoked = true;
        self.sessions.put(refresh_token, &record).await?;
        Ok(())
    }

    async fn revoke_all_for_owner(&self, owner: OwnerId) -> AuthResult<()> {
        self.revoked_owners.write().await.insert(owner);
        for key in self.sessions.keys().await? {
            if let Some(mut record) = self.sessions.get(&key).await? {
                if record.owner == owner {
                    record.revoked = true;
                    self.sessions.put(&key, &record).await?;
                }
            }
        }
        Ok(())
    }

    /// Delete every session record that is revoked or past its refresh
    /// deadline. Returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn sweep_expired(&self) -> AuthResult<usize> {
        let now = Timestamp::now();
        let mut removed = 0;
        for key in self.sessions.keys().await? {
            if let Some(record) = self.sessions.get(&key).await? {
                if record.revoked || record.expires_at <= now {
                    self.sessions.delete(&key).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn new_opaque_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn encode_access_token(&self, claims: &AccessClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("claims always serialize");
        let mac = self.hmac_key.sign(&payload);
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!("{}.{}", engine.encode(&payload), engine.encode(mac))
    }

    fn decode_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let (payload_b64, mac_b64) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = engine.decode(payload_b64).map_err(|_| AuthError::InvalidToken)?;
        let mac_bytes = engine.decode(mac_b64).map_err(|_| AuthError::InvalidToken)?;
        let mac: [u8; 32] = mac_bytes.try_into().map_err(|_| AuthError::InvalidToken)?;
        self.hmac_key.verify(&payload, &mac).map_err(|_| AuthError::InvalidToken)?;
        serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> SessionAuthenticator {
        SessionAuthenticator::new(HmacKey::generate())
    }

    #[tokio::test]
    async fn issued_token_verifies() {
        let auth = authenticator();
        let pair = auth.issue(OwnerId::new(), DeviceId::new(), true).await.unwrap();
        let claims = auth.verify_access_token(&pair.access_token, SessionOperation::Normal).unwrap();
        assert!(claims.mfa_verified);
    }

    #[tokio::test]
    async fn unverified_mfa_rejected_for_normal_operation() {
        let auth = authenticator();
        let pair = auth.issue(OwnerId::new(), DeviceId::new(), false).await.unwrap();
        let result = auth.verify_access_token(&pair.access_token, SessionOperation::Normal);
        assert!(matches!(result, Err(AuthError::MfaRequired)));
    }

    #[tokio::test]
    async fn unverified_mfa_allowed_for_enrollment() {
        let auth = authenticator();
        let pair = auth.issue(OwnerId::new(), DeviceId::new(), false).await.unwrap();
        let result = auth.verify_access_token(&pair.access_token, SessionOperation::MfaEnrollment);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let auth = authenticator();
        let pair = auth.issue(OwnerId::new(), DeviceId::new(), true).await.unwrap();
        let tampered = format!("{}x", pair.access_token);
        assert!(matches!(
            auth.verify_access_token(&tampered, SessionOperation::Normal),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_token() {
        let auth = authenticator();
        let pair = auth.issue(OwnerId::new(), DeviceId::new(), true).await.unwrap();
        let rotated = auth.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn reusing_consumed_refresh_token_revokes_owner() {
        let auth = authenticator();
        let owner = OwnerId::new();
        let pair = auth.issue(owner, DeviceId::new(), true).await.unwrap();
        let rotated = auth.refresh(&pair.refresh_token).await.unwrap();

        // Reusing the already-consumed token is treated as theft.
        let result = auth.refresh(&pair.refresh_token).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));

        // Every session for the owner, including the freshly rotated
        // one, is now revoked.
        let result = auth.refresh(&rotated.refresh_token).await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }
}
