use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    PgConnection, QueryResult, RunQueryDsl,
    connection::{AnsiTransactionManager, TransactionManager},
    prelude::*,
    sql_query, update,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::{PgPoolSquad, PgPooledConnection},
        schema::subscriptions,
    },
};
use domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::{
        SubscriptionStore, SubscriptionTransaction, TransactionOptions,
    },
    value_objects::{
        checkout::SubscriptionSnapshot, enums::subscription_statuses::SubscriptionStatus,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionPostgres {
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn SubscriptionTransaction>> {
        let mut conn = self
            .db_pool
            .get()
            .context("failed to check out a postgres connection")?;

        AnsiTransactionManager::begin_transaction_sql(&mut *conn, options.isolation.begin_sql())
            .context("failed to begin subscription transaction")?;

        // Bounds each statement server-side; the caller bounds the transaction as a whole.
        let statement_timeout_ms = options.timeout.as_millis();
        if let Err(err) = sql_query(format!("SET LOCAL statement_timeout = {statement_timeout_ms}"))
            .execute(&mut *conn)
        {
            if let Err(rollback_err) = AnsiTransactionManager::rollback_transaction(&mut *conn) {
                warn!(error = ?rollback_err, "subscriptions: rollback after failed setup also failed");
            }
            return Err(anyhow!(err).context("failed to set transaction statement timeout"));
        }

        debug!(
            isolation = ?options.isolation,
            statement_timeout_ms,
            "subscriptions: transaction started"
        );

        Ok(Box::new(SubscriptionPostgresTransaction {
            conn: Mutex::new(Some(conn)),
        }))
    }
}

pub struct SubscriptionPostgresTransaction {
    conn: Mutex<Option<PgPooledConnection>>,
}

impl SubscriptionPostgresTransaction {
    fn with_conn<T>(&self, f: impl FnOnce(&mut PgConnection) -> QueryResult<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("subscription transaction lock poisoned"))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("subscription transaction already finished"))?;
        Ok(f(&mut **conn)?)
    }

    fn finish(&self, f: impl FnOnce(&mut PgConnection) -> QueryResult<()>) -> Result<()> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("subscription transaction lock poisoned"))?
            .take()
            .ok_or_else(|| anyhow!("subscription transaction already finished"))?;
        Ok(f(&mut *conn)?)
    }

    fn latest_by_user(
        conn: &mut PgConnection,
        user_id: &str,
    ) -> QueryResult<Option<SubscriptionEntity>> {
        subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(conn)
            .optional()
    }
}

#[async_trait]
impl SubscriptionTransaction for SubscriptionPostgresTransaction {
    async fn find_latest_by_user(&self, user_id: &str) -> Result<Option<SubscriptionEntity>> {
        self.with_conn(|conn| Self::latest_by_user(conn, user_id))
    }

    async fn find_current_snapshot(&self, user_id: &str) -> Result<Option<SubscriptionSnapshot>> {
        let subscription = self.with_conn(|conn| {
            let current = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::status.ne(SubscriptionStatus::Canceled.as_str()))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            match current {
                Some(subscription) => Ok(Some(subscription)),
                None => Self::latest_by_user(conn, user_id),
            }
        })?;

        Ok(subscription.map(SubscriptionSnapshot::from))
    }

    async fn find_active_by_customer(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        self.with_conn(|conn| {
            subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::stripe_customer_id.eq(customer_id))
                .filter(subscriptions::status.ne(SubscriptionStatus::Canceled.as_str()))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(conn)
                .optional()
        })
    }

    async fn backfill_customer_id(&self, user_id: &str, customer_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            update(
                subscriptions::table
                    .filter(subscriptions::user_id.eq(user_id))
                    .filter(subscriptions::stripe_customer_id.is_null()),
            )
            .set((
                subscriptions::stripe_customer_id.eq(Some(customer_id)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
        })
    }

    async fn commit(&self) -> Result<()> {
        self.finish(|conn| AnsiTransactionManager::commit_transaction(conn))
            .context("failed to commit subscription transaction")
    }

    async fn rollback(&self) -> Result<()> {
        self.finish(|conn| AnsiTransactionManager::rollback_transaction(conn))
            .context("failed to roll back subscription transaction")
    }
}

impl Drop for SubscriptionPostgresTransaction {
    fn drop(&mut self) {
        let conn = match self.conn.get_mut() {
            Ok(conn) => conn.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(mut conn) = conn {
            warn!("subscriptions: transaction dropped while open; rolling back");
            if let Err(err) = AnsiTransactionManager::rollback_transaction(&mut *conn) {
                warn!(error = ?err, "subscriptions: rollback of dropped transaction failed");
            }
        }
    }
}
