use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use meterline_core::error::Result;

use super::model::{Account, AccountInput};

/// Persistence port for accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, input: AccountInput) -> Result<Account>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;
    /// All accounts, oldest first.
    async fn find_all(&self) -> Result<Vec<Account>>;
    /// `None` when the account does not exist.
    async fn update(&self, id: Uuid, input: AccountInput) -> Result<Option<Account>>;
    /// Returns whether an account was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Process-local repository backed by `DashMap`.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    rows: DashMap<Uuid, Account>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create(&self, input: AccountInput) -> Result<Account> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            name: input.name,
            number: input.number,
            description: input.description,
        };
        self.rows.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.rows.get(&id).map(|r| r.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Account>> {
        let mut all: Vec<Account> = self.rows.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn update(&self, id: Uuid, input: AccountInput) -> Result<Option<Account>> {
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.name = input.name;
        row.number = input.number;
        row.description = input.description;
        row.updated_at = Utc::now();
        Ok(Some(row.value().clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.remove(&id).is_some())
    }
}
