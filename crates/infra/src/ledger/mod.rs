//! Credit ledger: per-owner usage against a plan-derived limit.
//!
//! Admission reads the ledger; only the orchestrator's success path charges it,
//! and the billing layer resets it each cycle.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use vista_core::{OwnerId, PlanTier};

pub use in_memory::InMemoryCreditLedger;
pub use postgres::PostgresCreditLedger;

/// Result of an admission check. `remaining` is `-1` for unlimited owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub remaining: i64,
}

/// Usage snapshot for one owner. `limit` and `remaining` are `-1` when unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub unlimited: bool,
}

/// Per-tier credit limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub free_limit: i64,
    pub pro_limit: i64,
    pub business_limit: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            free_limit: PlanTier::Free.default_credit_limit().unwrap_or(3),
            pro_limit: PlanTier::Pro.default_credit_limit().unwrap_or(50),
            business_limit: PlanTier::Business.default_credit_limit().unwrap_or(250),
        }
    }
}

impl LedgerConfig {
    /// Limit for `plan`, `None` when unlimited.
    pub fn limit_for(&self, plan: PlanTier) -> Option<i64> {
        match plan {
            PlanTier::Free => Some(self.free_limit),
            PlanTier::Pro => Some(self.pro_limit),
            PlanTier::Business => Some(self.business_limit),
            PlanTier::Unlimited => None,
        }
    }
}

/// Ledger state of one owner. Owners without a row are `free` with nothing used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub plan: PlanTier,
    pub used: i64,
}

impl LedgerEntry {
    pub fn admission(&self, config: &LedgerConfig) -> AdmissionDecision {
        match config.limit_for(self.plan) {
            None => AdmissionDecision {
                allowed: true,
                remaining: -1,
            },
            Some(limit) => AdmissionDecision {
                allowed: self.used < limit,
                remaining: (limit - self.used).max(0),
            },
        }
    }

    pub fn usage(&self, config: &LedgerConfig) -> UsageSummary {
        match config.limit_for(self.plan) {
            None => UsageSummary {
                used: self.used,
                limit: -1,
                remaining: -1,
                unlimited: true,
            },
            Some(limit) => UsageSummary {
                used: self.used,
                limit,
                remaining: (limit - self.used).max(0),
                unlimited: false,
            },
        }
    }

    /// Apply a charge; unlimited owners are never tracked.
    pub fn charge(&mut self, credits: u32) {
        if !self.plan.is_unlimited() {
            self.used = self.used.saturating_add(i64::from(credits));
        }
    }
}

#[async_trait]
pub trait CreditLedger: Send + Sync + 'static {
    /// Side-effect free: repeated checks return the same decision.
    async fn check_admission(&self, owner_id: OwnerId) -> Result<AdmissionDecision, LedgerError>;

    /// Add `credits` to the owner's usage with one atomic increment.
    async fn charge(&self, owner_id: OwnerId, credits: u32) -> Result<(), LedgerError>;

    async fn usage(&self, owner_id: OwnerId) -> Result<UsageSummary, LedgerError>;

    /// Plan sync hook for the billing layer.
    async fn set_plan(&self, owner_id: OwnerId, plan: PlanTier) -> Result<(), LedgerError>;

    /// Billing-cycle reset hook: `used = 0`.
    async fn reset_cycle(&self, owner_id: OwnerId) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_owner_with_three_used_is_rejected() {
        let entry = LedgerEntry {
            plan: PlanTier::Free,
            used: 3,
        };
        assert_eq!(
            entry.admission(&LedgerConfig::default()),
            AdmissionDecision {
                allowed: false,
                remaining: 0
            }
        );
    }

    #[test]
    fn unlimited_is_never_tracked() {
        let mut entry = LedgerEntry {
            plan: PlanTier::Unlimited,
            used: 0,
        };
        entry.charge(10);
        assert_eq!(entry.used, 0);
        let usage = entry.usage(&LedgerConfig::default());
        assert!(usage.unlimited);
        assert_eq!((usage.limit, usage.remaining), (-1, -1));
        assert!(entry.admission(&LedgerConfig::default()).allowed);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let entry = LedgerEntry {
            plan: PlanTier::Free,
            used: 7,
        };
        assert_eq!(entry.usage(&LedgerConfig::default()).remaining, 0);
    }

    #[test]
    fn config_overrides_limits() {
        let config = LedgerConfig {
            pro_limit: 10,
            ..LedgerConfig::default()
        };
        let entry = LedgerEntry {
            plan: PlanTier::Pro,
            used: 4,
        };
        assert_eq!(entry.usage(&config).remaining, 6);
    }
}
