//! Credential Store (C1) ingress operations.
//!
//! `CredentialStore` itself only scopes `list` by owner; `delete`,
//! `rotate`, and `retrieve` take a bare id. Every operation here
//! re-checks ownership against `list(owner)` first, surfacing
//! [`ErrorKind::Authorization`] for a credential the caller doesn't own
//! rather than letting the underlying crate silently act on it.

use sentry_auth::{AuthError, CredentialSummary, Service};
use sentry_core::{CredentialId, ErrorKind, GatewayError, GatewayResult, OwnerId};

use crate::gateway::Gateway;

fn map_auth_error(err: AuthError) -> GatewayError {
    match err {
        AuthError::NotFound(id) => GatewayError::not_found("credential_not_found", format!("credential {id} not found")),
        AuthError::DuplicateName(name) => {
            GatewayError::conflict("credential_duplicate_name", format!("a credential named {name:?} already exists"))
        },
        other => GatewayError::new(ErrorKind::Dependency, "credential_store_error", other.to_string()),
    }
}

async fn assert_owns(gateway: &Gateway, owner: OwnerId, id: CredentialId) -> GatewayResult<()> {
    let owned = gateway.credentials.list(owner).await.map_err(map_auth_error)?;
    if owned.iter().any(|c| c.id == id) {
        Ok(())
    } else {
        Err(GatewayError::new(ErrorKind::Authorization, "credential_not_owned", format!("credential {id} is not owned by this account")))
    }
}

impl Gateway {
    /// Store a new credential for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Conflict`] if `name` is already taken.
    pub async fn store_credential(
        &self,
        owner: OwnerId,
        name: impl Into<String>,
        service: Service,
        plaintext: &[u8],
    ) -> GatewayResult<CredentialId> {
        let id = self.credentials.store(owner, name, service, plaintext).await.map_err(map_auth_error)?;
        self.audit
            .record(sentry_audit::EventType::CredentialCreated, sentry_audit::Severity::Info, "credential stored", Some(owner))
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Dependency, "audit_write_failed", e.to_string()))?;
        Ok(id)
    }

    /// List every credential owned by `owner` (metadata only, no
    /// plaintext or ciphertext).
    ///
    /// # Errors
    ///
    /// Returns an error if storage access fails.
    pub async fn list_credentials(&self, owner: OwnerId) -> GatewayResult<Vec<CredentialSummary>> {
        self.credentials.list(owner).await.map_err(map_auth_error)
    }

    /// Decrypt and return credential `id`'s plaintext, after verifying
    /// `owner` actually owns it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Authorization`] if `owner` does not own
    /// `id`, or [`ErrorKind::NotFound`] if `id` doesn't exist at all.
    pub async fn reveal_credential(&self, owner: OwnerId, id: CredentialId) -> GatewayResult<Vec<u8>> {
        assert_owns(self, owner, id).await?;
        let plaintext = self.credentials.retrieve(id).await.map_err(map_auth_error)?;
        self.audit
            .record(sentry_audit::EventType::CredentialAccessed, sentry_audit::Severity::Info, "credential revealed", Some(owner))
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Dependency, "audit_write_failed", e.to_string()))?;
        Ok(plaintext.to_vec())
    }

    /// Delete credential `id`, after verifying `owner` owns it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Authorization`] if `owner` does not own
    /// `id`.
    pub async fn delete_credential(&self, owner: OwnerId, id: CredentialId) -> GatewayResult<()> {
        assert_owns(self, owner, id).await?;
        self.credentials.delete(id).await.map_err(map_auth_error)?;
        self.audit
            .record(sentry_audit::EventType::CredentialDeleted, sentry_audit::Severity::Info, "credential deleted", Some(owner))
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Dependency, "audit_write_failed", e.to_string()))?;
        Ok(())
    }

    /// Rotate credential `id`'s ciphertext, after verifying `owner`
    /// owns it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Authorization`] if `owner` does not own
    /// `id`.
    pub async fn rotate_credential(&self, owner: OwnerId, id: CredentialId, new_plaintext: &[u8]) -> GatewayResult<()> {
        assert_owns(self, owner, id).await?;
        self.credentials.rotate(id, new_plaintext).await.map_err(map_auth_error)?;
        self.audit
            .record(sentry_audit::EventType::CredentialRotated, sentry_audit::Severity::Info, "credential rotated", Some(owner))
            .await
            .map_err(|e| GatewayError::new(ErrorKind::Dependency, "audit_write_failed", e.to_string()))?;
        Ok(())
    }
}
