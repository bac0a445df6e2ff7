//! Job engine wiring: stores, ledger, providers and the dispatcher.

use std::sync::Arc;

use sqlx::PgPool;

use vista_ai::providers::{EnhancementProvider, StagingProvider, TextProvider, VisionProvider};
use vista_ai::{AssetFetcher, HttpAssetFetcher, ProviderAdapter, ProviderRegistry};
use vista_core::JobType;
use vista_infra::external::{
    ActivitySink, InMemoryObjectStorage, InMemoryTargetStore, ObjectStorage, TargetResourceStore,
    TracingActivitySink,
};
use vista_infra::jobs::{InMemoryJobStore, JobStore, PostgresJobStore};
use vista_infra::ledger::{CreditLedger, InMemoryCreditLedger, LedgerConfig, PostgresCreditLedger};
use vista_infra::{CreditPricing, JobService, Orchestrator, TokioDispatcher};

use crate::config::AppConfig;

/// Storage and collaborator implementations behind the job engine.
#[derive(Clone)]
pub struct Backends {
    pub jobs: Arc<dyn JobStore>,
    pub ledger: Arc<dyn CreditLedger>,
    pub storage: Arc<dyn ObjectStorage>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub targets: Arc<dyn TargetResourceStore>,
    pub activity: Arc<dyn ActivitySink>,
}

impl Backends {
    /// Everything in process memory (local dev and tests).
    pub fn in_memory(ledger: LedgerConfig) -> Self {
        Self {
            jobs: Arc::new(InMemoryJobStore::new()),
            ledger: InMemoryCreditLedger::arc(ledger),
            storage: Arc::new(InMemoryObjectStorage::default()),
            fetcher: Arc::new(HttpAssetFetcher::default()),
            targets: Arc::new(InMemoryTargetStore::new()),
            activity: Arc::new(TracingActivitySink),
        }
    }

    /// Jobs and credits in Postgres.
    ///
    /// Object storage and target resources belong to the host platform; until
    /// it provides them they stay in memory.
    pub fn postgres(pool: PgPool, ledger: LedgerConfig) -> Self {
        Self {
            jobs: Arc::new(PostgresJobStore::new(pool.clone())),
            ledger: Arc::new(PostgresCreditLedger::new(pool, ledger)),
            ..Self::in_memory(ledger)
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<JobService>,
    pub dispatcher: Arc<TokioDispatcher>,
}

pub fn build_services(
    backends: Backends,
    providers: ProviderRegistry,
    pricing: CreditPricing,
) -> AppServices {
    let providers = Arc::new(providers);

    let orchestrator = Arc::new(Orchestrator::new(
        backends.jobs.clone(),
        backends.ledger.clone(),
        providers.clone(),
        backends.storage,
        backends.fetcher,
        backends.targets,
        backends.activity,
    ));
    let dispatcher = Arc::new(TokioDispatcher::new(orchestrator));

    let jobs = Arc::new(JobService::new(
        backends.jobs,
        backends.ledger,
        providers,
        dispatcher.clone(),
        pricing,
    ));

    AppServices { jobs, dispatcher }
}

/// One adapter per job type, built from explicit provider configuration.
pub fn provider_registry(config: &AppConfig) -> ProviderRegistry {
    let vision = VisionProvider::new(&config.vision());

    ProviderRegistry::new()
        .with(JobType::SceneAnalysis, ProviderAdapter::sync(vision.clone()))
        .with(JobType::FloorPlan, ProviderAdapter::sync(vision.clone()))
        .with(JobType::AutoHotspots, ProviderAdapter::sync(vision))
        .with(JobType::Description, ProviderAdapter::sync(TextProvider::new(&config.text())))
        .with(
            JobType::Staging,
            ProviderAdapter::polling(StagingProvider::new(&config.staging())),
        )
        .with(
            JobType::Enhancement,
            ProviderAdapter::polling(EnhancementProvider::new(&config.enhancement())),
        )
}
