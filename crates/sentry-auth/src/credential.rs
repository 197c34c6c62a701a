//! Credential Store (C1): encrypted persistence of provider/service
//! secrets.
//!
//! Plaintext never touches storage or logs. The master key is derived
//! once, at construction, from a device-install seed via Argon2id; the
//! [`KdfParams`] (including the salt) must be generated once and
//! persisted by the caller so derivation stays deterministic across
//! restarts of the same install while differing across installs.

use std::sync::Arc;

use sentry_core::{CredentialId, OwnerId, Timestamp};
use sentry_crypto::aead::{self, KdfParams, MasterKey, Sealed, Zeroizing};
use sentry_storage::{KvStore, MemoryKvStore, TypedRepository};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Third-party service a credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Anthropic API key.
    Anthropic,
    /// OpenAI API key.
    Openai,
    /// Google API key.
    Google,
    /// Azure API key.
    Azure,
    /// AWS access credentials.
    Aws,
    /// GitHub token.
    Github,
    /// Slack token.
    Slack,
    /// Discord token.
    Discord,
    /// Telegram bot token.
    Telegram,
    /// Any other service not covered above.
    Custom,
}

/// A stored credential: ciphertext plus the metadata needed to decrypt
/// and manage it. Never holds plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Unique identifier.
    pub id: CredentialId,
    /// Owning account.
    pub owner: OwnerId,
    /// Unique name per owner.
    pub name: String,
    /// Which service this credential is for.
    pub service: Service,
    /// Authenticated ciphertext.
    pub sealed: Sealed,
    /// KDF parameters used to derive the key that sealed this value.
    pub kdf_params: KdfParams,
    /// When the credential was created.
    pub created_at: Timestamp,
    /// When the credential was last rotated (equals `created_at` if
    /// never rotated).
    pub last_rotated_at: Timestamp,
}

/// Metadata-only view returned by [`CredentialStore::list`]; never
/// carries ciphertext or plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    /// Unique identifier.
    pub id: CredentialId,
    /// Unique name per owner.
    pub name: String,
    /// Which service this credential is for.
    pub service: Service,
    /// When the credential was created.
    pub created_at: Timestamp,
    /// When the credential was last rotated.
    pub last_rotated_at: Timestamp,
}

impl From<&Credential> for CredentialSummary {
    fn from(c: &Credential) -> Self {
        Self { id: c.id, name: c.name.clone(), service: c.service, created_at: c.created_at, last_rotated_at: c.last_rotated_at }
    }
}

/// Encrypted persistence of provider/service secrets.
pub struct CredentialStore {
    repo: TypedRepository<Credential>,
    master_key: MasterKey,
    kdf_params: KdfParams,
}

impl CredentialStore {
    /// Build a store, deriving the master key from `seed` using
    /// `kdf_params`. `kdf_params` must be the same value across restarts
    /// of this install (generate once, persist it).
    ///
    /// # Errors
    ///
    /// Returns an error if the Argon2 parameters are rejected.
    pub fn new(seed: &[u8], kdf_params: &KdfParams) -> AuthResult<Self> {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let master_key = MasterKey::derive(seed, kdf_params)?;
        Ok(Self {
            repo: TypedRepository::new(store, "credentials"),
            master_key,
            kdf_params: kdf_params.clone(),
        })
    }

    /// Encrypt and store a new credential. Fails with
    /// [`AuthError::DuplicateName`] if `name` is already used by
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate name or storage failure.
    pub async fn store(
        &self,
        owner: OwnerId,
        name: impl Into<String>,
        service: Service,
        plaintext: &[u8],
    ) -> AuthResult<CredentialId> {
        let name = name.into();
        for existing in self.repo.all().await? {
            if existing.owner == owner && existing.name == name {
                return Err(AuthError::DuplicateName(name));
            }
        }
        let kdf_params = self.kdf_params.clone();
        let sealed = aead::seal(&self.master_key, plaintext)?;
        let now = Timestamp::now();
        let credential = Credential {
            id: CredentialId::new(),
            owner,
            name,
            service,
            sealed,
            kdf_params,
            created_at: now,
            last_rotated_at: now,
        };
        let id = credential.id;
        self.repo.put(&id.to_string(), &credential).await?;
        Ok(id)
    }

    /// Decrypt and return the plaintext of credential `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if absent or
    /// [`AuthError::DecryptError`] on tag mismatch.
    pub async fn retrieve(&self, id: CredentialId) -> AuthResult<Zeroizing<Vec<u8>>> {
        let credential = self.get(id).await?;
        Ok(aead::open(&self.master_key, &credential.sealed)?)
    }

    /// List every credential owned by `owner`, metadata only.
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn list(&self, owner: OwnerId) -> AuthResult<Vec<CredentialSummary>> {
        Ok(self
            .repo
            .all()
            .await?
            .iter()
            .filter(|c| c.owner == owner)
            .map(CredentialSummary::from)
            .collect())
    }

    /// Delete a credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if absent.
    pub async fn delete(&self, id: CredentialId) -> AuthResult<()> {
        self.get(id).await?;
        Ok(self.repo.delete(&id.to_string()).await?)
    }

    /// Replace the ciphertext of credential `id` with `new_plaintext`,
    /// atomically updating `last_rotated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if absent.
    pub async fn rotate(&self, id: CredentialId, new_plaintext: &[u8]) -> AuthResult<()> {
        let mut credential = self.get(id).await?;
        credential.sealed = aead::seal(&self.master_key, new_plaintext)?;
        credential.last_rotated_at = Timestamp::now();
        self.repo.put(&id.to_string(), &credential).await?;
        Ok(())
    }

    async fn get(&self, id: CredentialId) -> AuthResult<Credential> {
        self.repo.get(&id.to_string()).await?.ok_or_else(|| AuthError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::new(b"test-seed", &KdfParams::default()).unwrap()
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let store = store();
        let owner = OwnerId::new();
        let id = store.store(owner, "anthropic-key", Service::Anthropic, b"sk-ant-secret").await.unwrap();
        let plaintext = store.retrieve(id).await.unwrap();
        assert_eq!(&plaintext[..], b"sk-ant-secret");
    }

    #[tokio::test]
    async fn list_never_exposes_ciphertext_or_plaintext() {
        let store = store();
        let owner = OwnerId::new();
        store.store(owner, "key-a", Service::Openai, b"secret").await.unwrap();
        let listed = store.list(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "key-a");
    }

    #[tokio::test]
    async fn duplicate_name_for_same_owner_is_rejected() {
        let store = store();
        let owner = OwnerId::new();
        store.store(owner, "dup", Service::Github, b"a").await.unwrap();
        let err = store.store(owner, "dup", Service::Github, b"b").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn rotate_replaces_ciphertext_and_updates_timestamp() {
        let store = store();
        let owner = OwnerId::new();
        let id = store.store(owner, "key", Service::Slack, b"old").await.unwrap();
        let before = store.get(id).await.unwrap().last_rotated_at;
        store.rotate(id, b"new").await.unwrap();
        let after = store.get(id).await.unwrap();
        assert_eq!(&store.retrieve(id).await.unwrap()[..], b"new");
        assert!(after.last_rotated_at >= before);
    }

    #[tokio::test]
    async fn delete_removes_credential() {
        let store = store();
        let owner = OwnerId::new();
        let id = store.store(owner, "key", Service::Custom, b"v").await.unwrap();
        store.delete(id).await.unwrap();
        assert!(matches!(store.retrieve(id).await, Err(AuthError::NotFound(_))));
    }
}
