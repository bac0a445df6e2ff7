//! Subscription plan tiers that drive credit limits.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Plan tier of an owner, synced from the billing layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Business,
    /// No cap; usage is never tracked for these owners.
    Unlimited,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Business => "business",
            PlanTier::Unlimited => "unlimited",
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, PlanTier::Unlimited)
    }

    /// Credits per billing cycle, `None` for unlimited.
    pub fn default_credit_limit(&self) -> Option<i64> {
        match self {
            PlanTier::Free => Some(3),
            PlanTier::Pro => Some(50),
            PlanTier::Business => Some(250),
            PlanTier::Unlimited => None,
        }
    }
}

impl core::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            "business" => Ok(PlanTier::Business),
            "unlimited" => Ok(PlanTier::Unlimited),
            other => Err(DomainError::validation(format!("unknown plan tier: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_has_three_credits() {
        assert_eq!(PlanTier::default().default_credit_limit(), Some(3));
    }

    #[test]
    fn unlimited_has_no_limit() {
        assert!(PlanTier::Unlimited.is_unlimited());
        assert_eq!(PlanTier::Unlimited.default_credit_limit(), None);
    }

    #[test]
    fn parse_rejects_unknown_tier() {
        assert!("enterprise".parse::<PlanTier>().is_err());
        assert_eq!("pro".parse::<PlanTier>().unwrap(), PlanTier::Pro);
    }
}
