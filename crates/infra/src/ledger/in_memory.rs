use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use vista_core::{OwnerId, PlanTier};

use super::{AdmissionDecision, CreditLedger, LedgerConfig, LedgerEntry, LedgerError, UsageSummary};

/// In-memory credit ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCreditLedger {
    config: LedgerConfig,
    entries: RwLock<HashMap<OwnerId, LedgerEntry>>,
}

impl InMemoryCreditLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc(config: LedgerConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Seed an owner's entry directly (fixtures).
    pub fn set_entry(&self, owner_id: OwnerId, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(owner_id, entry);
        Ok(())
    }

    fn entry(&self, owner_id: OwnerId) -> Result<LedgerEntry, LedgerError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .get(&owner_id)
            .copied()
            .unwrap_or_default())
    }

    fn modify<F: FnOnce(&mut LedgerEntry)>(&self, owner_id: OwnerId, f: F) -> Result<(), LedgerError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        f(entries.entry(owner_id).or_default());
        Ok(())
    }
}

fn poisoned() -> LedgerError {
    LedgerError::Storage("ledger lock poisoned".to_string())
}

#[async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn check_admission(&self, owner_id: OwnerId) -> Result<AdmissionDecision, LedgerError> {
        Ok(self.entry(owner_id)?.admission(&self.config))
    }

    async fn charge(&self, owner_id: OwnerId, credits: u32) -> Result<(), LedgerError> {
        if credits == 0 {
            return Ok(());
        }
        self.modify(owner_id, |entry| entry.charge(credits))
    }

    async fn usage(&self, owner_id: OwnerId) -> Result<UsageSummary, LedgerError> {
        Ok(self.entry(owner_id)?.usage(&self.config))
    }

    async fn set_plan(&self, owner_id: OwnerId, plan: PlanTier) -> Result<(), LedgerError> {
        self.modify(owner_id, |entry| entry.plan = plan)
    }

    async fn reset_cycle(&self, owner_id: OwnerId) -> Result<(), LedgerError> {
        self.modify(owner_id, |entry| entry.used = 0)
    }
}
