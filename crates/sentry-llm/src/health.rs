//! Health Cache (C4): last-known liveness and catalog snapshot per
//! provider, refreshed lazily on read or eagerly via `refresh_all`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::LlmResult;
use crate::provider::LlmProvider;
use crate::types::{ModelConfig, ProviderStatus};

struct CacheEntry {
    status: ProviderStatus,
    models: Vec<ModelConfig>,
}

/// Caches [`ProviderStatus`] and model catalogs per provider, honoring
/// the 30-second staleness window from [`ProviderStatus::is_stale`](crate::types::ProviderStatus::is_stale).
pub struct HealthCache {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    snapshots: RwLock<HashMap<String, CacheEntry>>,
}

impl HealthCache {
    /// Build a cache over a fixed provider registry.
    #[must_use]
    pub fn new(providers: HashMap<String, Arc<dyn LlmProvider>>) -> Self {
        Self { providers, snapshots: RwLock::new(HashMap::new()) }
    }

    /// Current status for `provider`, refreshing it first if the
    /// cached snapshot is stale or missing. Returns `None` if
    /// `provider` isn't registered.
    pub async fn status(&self, provider: &str) -> Option<LlmResult<ProviderStatus>> {
        {
            let snapshots = self.snapshots.read().await;
            if let Some(entry) = snapshots.get(provider) {
                if !entry.status.is_stale() {
                    return Some(Ok(entry.status.clone()));
                }
            }
        }
        Some(self.refresh_one(provider).await)
    }

    /// Model catalog for `provider`, refreshing status first if stale.
    /// Returns `None` if `provider` isn't registered.
    pub async fn models(&self, provider: &str) -> Option<Vec<ModelConfig>> {
        self.status(provider).await?.ok()?;
        self.snapshots.read().await.get(provider).map(|e| e.models.clone())
    }

    /// Refresh every registered provider concurrently.
    pub async fn refresh_all(&self) {
        let names: Vec<String> = self.providers.keys().cloned().collect();
        let refreshes = names.iter().map(|name| self.refresh_one(name));
        futures::future::join_all(refreshes).await;
    }

    /// Drop the cached catalog for `provider`, forcing the next
    /// [`Self::models`] call to re-fetch it. Used on administrative
    /// events: a new local model pulled, credentials rotated.
    pub async fn invalidate_catalog(&self, provider: &str) {
        if let Some(entry) = self.snapshots.write().await.get_mut(provider) {
            entry.models.clear();
        }
    }

    async fn refresh_one(&self, provider: &str) -> LlmResult<ProviderStatus> {
        let adapter = self
            .providers
            .get(provider)
            .expect("refresh_one only called for registered providers");
        let status = adapter.check_health().await?;
        let models = adapter.list_models().await.unwrap_or_default();
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(
            provider.to_string(),
            CacheEntry { status: status.clone(), models },
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sentry_core::Timestamp;

    use super::*;
    use crate::error::LlmError;
    use crate::types::{CompletionRequest, FinishReason, ModelResponse, Usage};

    struct StubProvider {
        name: String,
        available: bool,
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn check_health(&self) -> Result<ProviderStatus, LlmError> {
            Ok(ProviderStatus {
                provider: self.name.clone(),
                available: self.available,
                latency_ms: Some(5),
                checked_at: Timestamp::now(),
                available_models: vec!["stub-model".into()],
                error: None,
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelConfig>, LlmError> {
            Ok(vec![])
        }

        async fn complete(&self, _req: &CompletionRequest, model: &str) -> ModelResponse {
            ModelResponse {
                model: model.to_string(),
                content: "ok".into(),
                finish_reason: FinishReason::Stop,
                usage: Usage::zero(),
                error: None,
            }
        }
    }

    fn cache(available: bool) -> HealthCache {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert(
            "stub".into(),
            Arc::new(StubProvider { name: "stub".into(), available }),
        );
        HealthCache::new(providers)
    }

    #[tokio::test]
    async fn status_refreshes_on_first_call() {
        let cache = cache(true);
        let status = cache.status("stub").await.unwrap().unwrap();
        assert!(status.available);
    }

    #[tokio::test]
    async fn unknown_provider_returns_none() {
        let cache = cache(true);
        assert!(cache.status("nope").await.is_none());
    }

    #[tokio::test]
    async fn refresh_all_populates_every_provider() {
        let cache = cache(false);
        cache.refresh_all().await;
        let status = cache.status("stub").await.unwrap().unwrap();
        assert!(!status.available);
    }

    #[tokio::test]
    async fn cached_snapshot_is_reused_without_restale() {
        let cache = cache(true);
        let first = cache.status("stub").await.unwrap().unwrap();
        let second = cache.status("stub").await.unwrap().unwrap();
        assert_eq!(first.checked_at, second.checked_at);
    }
}
