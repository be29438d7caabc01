use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use meterline_core::error::{AppError, Result};

use super::model::{Account, AccountInput};
use super::repository::AccountRepository;
use crate::obs::BusinessMetrics;

/// Account use cases on top of the repository port.
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    metrics: BusinessMetrics,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>, metrics: BusinessMetrics) -> Self {
        Self { repo, metrics }
    }

    fn validate(&self, input: AccountInput) -> Result<AccountInput> {
        input.validated().map_err(|e| {
            self.metrics.record_business_validation_error(e.kind());
            e
        })
    }

    pub async fn create(&self, input: AccountInput) -> Result<Account> {
        let input = self.validate(input)?;
        let started = Instant::now();
        let account = self.repo.create(input).await?;
        self.metrics
            .record_database_operation("create", started.elapsed().as_secs_f64());
        self.metrics.record_account_creation();
        tracing::info!(id = %account.id, "account created");
        Ok(account)
    }

    pub async fn find(&self, id: Uuid) -> Result<Account> {
        let started = Instant::now();
        let found = self.repo.find_by_id(id).await?;
        self.metrics
            .record_database_operation("find", started.elapsed().as_secs_f64());
        self.metrics.record_account_query();
        found.ok_or_else(|| AppError::NotFound("Account not found".into()))
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let started = Instant::now();
        let all = self.repo.find_all().await?;
        self.metrics
            .record_database_operation("list", started.elapsed().as_secs_f64());
        self.metrics.record_account_query();
        Ok(all)
    }

    pub async fn update(&self, id: Uuid, input: AccountInput) -> Result<Account> {
        let input = self.validate(input)?;
        let started = Instant::now();
        let updated = self.repo.update(id, input).await?;
        self.metrics
            .record_database_operation("update", started.elapsed().as_secs_f64());
        let account = updated.ok_or_else(|| AppError::NotFound("Account not found".into()))?;
        self.metrics.record_account_update();
        Ok(account)
    }

    /// Deleting a missing account is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let started = Instant::now();
        let removed = self.repo.delete(id).await?;
        self.metrics
            .record_database_operation("delete", started.elapsed().as_secs_f64());
        if removed {
            self.metrics.record_account_deletion();
            tracing::info!(%id, "account deleted");
        } else {
            tracing::debug!(%id, "delete of unknown account ignored");
        }
        Ok(())
    }
}
