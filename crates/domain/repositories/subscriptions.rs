use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::checkout::SubscriptionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
}

impl IsolationLevel {
    pub fn begin_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "BEGIN TRANSACTION ISOLATION LEVEL READ COMMITTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub timeout: Duration,
}

/// Opens transactions over the subscription table.
#[automock]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn begin(&self, options: TransactionOptions)
    -> Result<Box<dyn SubscriptionTransaction>>;
}

/// Subscription reads and writes scoped to one open transaction.
///
/// Exactly one of `commit` or `rollback` must be called; a transaction that is
/// dropped while still open is rolled back.
#[automock]
#[async_trait]
pub trait SubscriptionTransaction: Send + Sync {
    /// Most recently created row for the user, regardless of status.
    async fn find_latest_by_user(&self, user_id: &str) -> Result<Option<SubscriptionEntity>>;

    /// Most recent non-canceled row, falling back to the most recent row.
    async fn find_current_snapshot(&self, user_id: &str) -> Result<Option<SubscriptionSnapshot>>;

    async fn find_active_by_customer(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Sets the customer id on every row of the user that has none. Returns the row count.
    async fn backfill_customer_id(&self, user_id: &str, customer_id: &str) -> Result<usize>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}
