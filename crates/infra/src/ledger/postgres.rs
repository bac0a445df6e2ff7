//! Postgres-backed credit ledger.
//!
//! `charge` is a single upsert that increments `used` in the database, so
//! concurrent completions for the same owner never lose an update.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use vista_core::{OwnerId, PlanTier};

use super::{AdmissionDecision, CreditLedger, LedgerConfig, LedgerEntry, LedgerError, UsageSummary};

#[derive(Debug, Clone)]
pub struct PostgresCreditLedger {
    pool: Arc<PgPool>,
    config: LedgerConfig,
}

impl PostgresCreditLedger {
    pub fn new(pool: PgPool, config: LedgerConfig) -> Self {
        Self {
            pool: Arc::new(pool),
            config,
        }
    }

    async fn entry(&self, owner_id: OwnerId) -> Result<LedgerEntry, LedgerError> {
        let row = sqlx::query("SELECT plan, used FROM credit_ledger WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_entry", e))?;

        let Some(row) = row else {
            return Ok(LedgerEntry::default());
        };

        let plan: String = row.try_get("plan").map_err(|e| map_sqlx_error("load_entry", e))?;
        let used: i64 = row.try_get("used").map_err(|e| map_sqlx_error("load_entry", e))?;
        let plan = plan
            .parse::<PlanTier>()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(LedgerEntry { plan, used })
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn check_admission(&self, owner_id: OwnerId) -> Result<AdmissionDecision, LedgerError> {
        Ok(self.entry(owner_id).await?.admission(&self.config))
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn charge(&self, owner_id: OwnerId, credits: u32) -> Result<(), LedgerError> {
        if credits == 0 {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO credit_ledger (owner_id, plan, used)
            VALUES ($1, 'free', $2)
            ON CONFLICT (owner_id)
            DO UPDATE SET
                used = credit_ledger.used + EXCLUDED.used,
                updated_at = NOW()
            WHERE credit_ledger.plan <> 'unlimited'
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(i64::from(credits))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("charge", e))?;
        Ok(())
    }

    async fn usage(&self, owner_id: OwnerId) -> Result<UsageSummary, LedgerError> {
        Ok(self.entry(owner_id).await?.usage(&self.config))
    }

    #[instrument(skip(self), fields(owner_id = %owner_id, plan = %plan), err)]
    async fn set_plan(&self, owner_id: OwnerId, plan: PlanTier) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO credit_ledger (owner_id, plan, used)
            VALUES ($1, $2, 0)
            ON CONFLICT (owner_id)
            DO UPDATE SET plan = EXCLUDED.plan, updated_at = NOW()
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(plan.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_plan", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn reset_cycle(&self, owner_id: OwnerId) -> Result<(), LedgerError> {
        sqlx::query("UPDATE credit_ledger SET used = 0, updated_at = NOW() WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("reset_cycle", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            LedgerError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        other => LedgerError::Storage(format!("{} failed: {}", operation, other)),
    }
}
