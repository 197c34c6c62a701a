//! The assembled application: every service wired together in
//! dependency order, plus the background sweepers that keep them clean.

use std::collections::HashMap;
use std::sync::Arc;

use sentry_approval::{ApprovalQueue, ExecutionManager, RiskScorer, SandboxedExecutor};
use sentry_audit::AuditLog;
use sentry_auth::{CredentialStore, DevicePairing, SessionAuthenticator};
use sentry_config::Config;
use sentry_cost::CostTracker;
use sentry_crypto::HmacKey;
use sentry_events::EventBus;
use sentry_gc::{GcScheduler, GcTargets};
use sentry_llm::{CompletionRequest, HealthCache, LlmProvider, ModelResponse, OpenAiCompatProvider};
use sentry_pipeline::{PromptCache, RequestBatcher};
use sentry_router::{Complexity, ModelRouter};
use sentry_trust::{RolloutController, TrustMonitor};
use tokio_util::sync::CancellationToken;

use crate::config_bridge;
use crate::error::StartupError;
use crate::gc_targets::{ApprovalAuditGcTarget, ApprovalGcTarget, PromptCacheGcTarget, SessionGcTarget, UndoTicketGcTarget};

/// Per-model batches of completion requests awaiting dispatch to the
/// router, keyed by the classified complexity bucket (the only
/// grouping signal available before the router itself resolves a
/// candidate model).
pub type ChatBatcher = RequestBatcher<(CompletionRequest, Option<Complexity>), ModelResponse>;

/// Every background sweep token, held so shutdown can cancel them all.
pub struct Sweepers {
    /// Prompt cache expiry sweep.
    pub prompt_cache: CancellationToken,
    /// Approval queue expiry sweep.
    pub approval: CancellationToken,
    /// Trust monitor measurement sweep.
    pub trust: CancellationToken,
    /// GC scheduler sweep.
    pub gc: CancellationToken,
}

impl Sweepers {
    /// Cancel every sweeper.
    pub fn shutdown(&self) {
        self.prompt_cache.cancel();
        self.approval.cancel();
        self.trust.cancel();
        self.gc.cancel();
    }
}

/// The fully wired gateway: every component from C1-C16, held behind
/// `Arc` so ingress handlers (in `ingress_*`) can share them freely.
pub struct Gateway {
    /// Credential Store (C1).
    pub credentials: Arc<CredentialStore>,
    /// Device Pairing (C2, step one).
    pub pairing: Arc<DevicePairing>,
    /// Session Authenticator (C2, step two).
    pub sessions: Arc<SessionAuthenticator>,
    /// Health Cache (C4), shared by the router.
    pub health: Arc<HealthCache>,
    /// Model Router (C9), wrapping the Provider Adapter (C3) registry.
    pub router: Arc<ModelRouter>,
    /// Prompt Cache & Deduplicator (C6).
    pub prompt_cache: Arc<PromptCache<ModelResponse>>,
    /// Request Batcher (C7), grouping cache-missed completions by
    /// complexity bucket before they reach the router.
    pub batcher: Arc<ChatBatcher>,
    /// Cost Tracker (C8).
    pub cost: Arc<CostTracker>,
    /// Approval Queue (C10).
    pub approvals: Arc<ApprovalQueue>,
    /// Execution/Undo Manager (C11).
    pub execution: Arc<ExecutionManager>,
    /// Trust Monitor (C12).
    pub trust: Arc<TrustMonitor>,
    /// Rollout Controller (C13).
    pub rollout: Arc<RolloutController>,
    /// GC Scheduler (C14).
    pub gc: Arc<GcScheduler>,
    /// Event Broadcaster (C15).
    pub events: Arc<EventBus>,
    /// Audit Log (C16).
    pub audit: Arc<AuditLog>,
    /// The resolved configuration this gateway was assembled from.
    pub config: Config,
}

impl Gateway {
    /// Assemble every component from `config`, returning the gateway and
    /// the sweep tokens needed to shut its background tasks down.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::CredentialStore`] if `credential_seed` is
    /// empty or the store otherwise fails to initialize.
    pub fn assemble(config: Config, credential_seed: &[u8]) -> Result<(Self, Sweepers), StartupError> {
        if credential_seed.is_empty() {
            return Err(StartupError::CredentialStore("empty credential seed".to_string()));
        }

        let events = Arc::new(EventBus::new());
        let audit = Arc::new(AuditLog::in_memory());

        let kdf_params = config_bridge::kdf_params(&config);
        let credentials = Arc::new(CredentialStore::new(credential_seed, &kdf_params)?);
        let pairing = Arc::new(DevicePairing::new());
        let sessions = Arc::new(SessionAuthenticator::new(HmacKey::generate()));

        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        for (name, section) in &config.providers {
            let base_url = section.api_base_url.clone().unwrap_or_default();
            let provider = OpenAiCompatProvider::new(name.clone(), base_url, section.api_key.clone(), Vec::new());
            providers.insert(name.clone(), Arc::new(provider));
        }
        let health = Arc::new(HealthCache::new(providers.clone()));
        let routing_config = config_bridge::routing_config(&config, Default::default());
        let router = Arc::new(ModelRouter::new(providers, Arc::clone(&health), routing_config, config.router.default_provider.clone()));

        let prompt_cache = Arc::new(PromptCache::new(
            config_bridge::prompt_cache_max_entries(&config),
            config_bridge::prompt_cache_ttl(&config),
        ));

        let router_for_batches = Arc::clone(&router);
        let batch_processor: sentry_pipeline::Processor<(CompletionRequest, Option<Complexity>), ModelResponse> =
            Arc::new(move |items| {
                let router = Arc::clone(&router_for_batches);
                Box::pin(async move {
                    let mut responses = Vec::with_capacity(items.len());
                    for (request, preferred) in items {
                        responses.push(Some(router.route(request, preferred).await));
                    }
                    Ok(responses)
                })
            });
        let batcher = RequestBatcher::new(config_bridge::batcher_config(&config), batch_processor);

        let cost = Arc::new(CostTracker::new(config_bridge::budget_config(&config)));

        let scorer = RiskScorer::new(config_bridge::risk_scorer_config(&config));
        let approvals = Arc::new(ApprovalQueue::with_default_ttl(
            scorer,
            Arc::clone(&audit),
            Arc::clone(&events),
            config_bridge::approval_default_ttl(&config),
        ));

        let allowed_commands = vec!["echo".to_string(), "ls".to_string(), "cat".to_string()];
        let executor: Arc<dyn SandboxedExecutor> = Arc::new(crate::executor::AllowlistExecutor::new(allowed_commands));
        let execution = Arc::new(ExecutionManager::with_undo_window(
            Arc::clone(&approvals),
            executor,
            Arc::clone(&audit),
            Arc::clone(&events),
            config_bridge::undo_window(&config),
        ));

        let rollout = Arc::new(RolloutController::new(Arc::clone(&audit), Arc::clone(&events)));
        let trust = Arc::new(TrustMonitor::with_config(
            Arc::clone(&rollout),
            Arc::clone(&audit),
            Arc::clone(&events),
            config_bridge::trust_window(&config),
            config_bridge::trust_sustained_interval(&config),
        ));

        let gc_targets = GcTargets {
            sessions: vec![Arc::new(SessionGcTarget(Arc::clone(&sessions)))],
            cache_entries: vec![Arc::new(PromptCacheGcTarget(Arc::clone(&prompt_cache)))],
            approvals: vec![
                Arc::new(ApprovalGcTarget(Arc::clone(&approvals))),
                Arc::new(UndoTicketGcTarget(Arc::clone(&execution))),
                Arc::new(ApprovalAuditGcTarget {
                    queue: Arc::clone(&approvals),
                    retention: config_bridge::approval_history_retention(&config),
                }),
            ],
        };
        let gc = Arc::new(GcScheduler::new(gc_targets, Arc::clone(&audit), Arc::clone(&events)));

        let sweepers = Sweepers {
            prompt_cache: sentry_pipeline::spawn_sweeper(Arc::clone(&prompt_cache), sentry_pipeline::cache::DEFAULT_SWEEP_INTERVAL),
            approval: sentry_approval::spawn_sweeper(Arc::clone(&approvals), config_bridge::approval_sweep_interval(&config)),
            trust: sentry_trust::spawn_sweeper(Arc::clone(&trust), config_bridge::trust_sweep_interval(&config)),
            gc: sentry_gc::spawn_sweeper(Arc::clone(&gc), config_bridge::gc_sweep_interval(&config)),
        };

        Ok((
            Self {
                credentials,
                pairing,
                sessions,
                health,
                router,
                prompt_cache,
                batcher,
                cost,
                approvals,
                execution,
                trust,
                rollout,
                gc,
                events,
                audit,
                config,
            },
            sweepers,
        ))
    }
}
