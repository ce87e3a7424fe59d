//! Account directory contract.

use async_trait::async_trait;
use common::UserId;

use crate::{Account, Result};

/// Lookup of storefront accounts. Registration lives outside the engine;
/// `upsert_account` exists for seeding and tests.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn account(&self, id: UserId) -> Result<Option<Account>>;

    async fn upsert_account(&self, account: Account) -> Result<()>;
}
