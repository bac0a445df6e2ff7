use std::collections::HashMap;

use vista_core::JobType;

use crate::provider::ProviderAdapter;

/// Maps each job type to the adapter that serves it.
///
/// Job types without an adapter are rejected at submission.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<JobType, ProviderAdapter>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for `job_type`.
    pub fn register(&mut self, job_type: JobType, adapter: ProviderAdapter) -> &mut Self {
        self.adapters.insert(job_type, adapter);
        self
    }

    pub fn with(mut self, job_type: JobType, adapter: ProviderAdapter) -> Self {
        self.register(job_type, adapter);
        self
    }

    pub fn get(&self, job_type: JobType) -> Option<&ProviderAdapter> {
        self.adapters.get(&job_type)
    }

    pub fn supported_types(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| self.adapters.contains_key(t))
            .collect()
    }
}
