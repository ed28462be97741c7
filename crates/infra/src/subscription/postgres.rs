//! Postgres-backed subscription store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use stratum_core::SequenceNumber;
use stratum_events::{
    RunMode, SubscriptionError, SubscriptionGroup, SubscriptionId, SubscriptionStatus,
};

use super::entity::Subscription;
use super::store::SubscriptionStore;

/// Postgres-backed subscription store.
///
/// Expects a `subscriptions` table:
///
/// ```sql
/// CREATE TABLE subscriptions (
///     id TEXT PRIMARY KEY,
///     subscription_group TEXT NOT NULL,
///     run_mode TEXT NOT NULL,
///     status TEXT NOT NULL,
///     position BIGINT NOT NULL,
///     error_previous_status TEXT,
///     error_message TEXT,
///     retry_attempt INT NOT NULL DEFAULT 0,
///     last_saved_at TIMESTAMPTZ
/// );
/// ```
pub struct PostgresSubscriptionStore {
    pool: Arc<PgPool>,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn run_mode_to_str(run_mode: RunMode) -> &'static str {
    match run_mode {
        RunMode::FromBeginning => "FROM_BEGINNING",
        RunMode::FromNow => "FROM_NOW",
        RunMode::Once => "ONCE",
    }
}

fn run_mode_from_str(raw: &str) -> Option<RunMode> {
    match raw {
        "FROM_BEGINNING" => Some(RunMode::FromBeginning),
        "FROM_NOW" => Some(RunMode::FromNow),
        "ONCE" => Some(RunMode::Once),
        _ => None,
    }
}

fn status_to_str(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::New => "NEW",
        SubscriptionStatus::Booting => "BOOTING",
        SubscriptionStatus::Active => "ACTIVE",
        SubscriptionStatus::Error => "ERROR",
        SubscriptionStatus::Detached => "DETACHED",
    }
}

fn status_from_str(raw: &str) -> Option<SubscriptionStatus> {
    match raw {
        "NEW" => Some(SubscriptionStatus::New),
        "BOOTING" => Some(SubscriptionStatus::Booting),
        "ACTIVE" => Some(SubscriptionStatus::Active),
        "ERROR" => Some(SubscriptionStatus::Error),
        "DETACHED" => Some(SubscriptionStatus::Detached),
        _ => None,
    }
}

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Option<Subscription> {
    let id = SubscriptionId::try_new(row.try_get::<String, _>("id").ok()?).ok()?;
    let group = SubscriptionGroup::try_new(row.try_get::<String, _>("subscription_group").ok()?).ok()?;
    let run_mode = run_mode_from_str(&row.try_get::<String, _>("run_mode").ok()?)?;
    let status = status_from_str(&row.try_get::<String, _>("status").ok()?)?;
    let position = SequenceNumber::from_u64(row.try_get::<i64, _>("position").ok()? as u64);
    let retry_attempt = row.try_get::<i32, _>("retry_attempt").ok()? as u32;
    let last_saved_at = row.try_get::<Option<DateTime<Utc>>, _>("last_saved_at").ok()?;

    let error = match (
        row.try_get::<Option<String>, _>("error_previous_status").ok()?,
        row.try_get::<Option<String>, _>("error_message").ok()?,
    ) {
        (Some(previous), Some(message)) => Some(SubscriptionError {
            previous_status: status_from_str(&previous)?,
            message,
        }),
        _ => None,
    };

    Some(Subscription::from_stored(
        id,
        group,
        run_mode,
        status,
        position,
        error,
        retry_attempt,
        last_saved_at,
    ))
}

impl SubscriptionStore for PostgresSubscriptionStore {
    fn load(&self, id: &SubscriptionId) -> Option<Subscription> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let pool = self.pool.clone();
        let id = id.as_str().to_string();

        handle.block_on(async {
            match sqlx::query(
                r#"
                SELECT id, subscription_group, run_mode, status, position,
                       error_previous_status, error_message, retry_attempt, last_saved_at
                FROM subscriptions
                WHERE id = $1
                "#,
            )
            .bind(&id)
            .fetch_optional(&*pool)
            .await
            {
                Ok(Some(row)) => row_to_subscription(&row),
                _ => None,
            }
        })
    }

    fn load_group(&self, group: &SubscriptionGroup) -> Vec<Subscription> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return Vec::new();
        };
        let pool = self.pool.clone();
        let group = group.as_str().to_string();

        handle.block_on(async {
            match sqlx::query(
                r#"
                SELECT id, subscription_group, run_mode, status, position,
                       error_previous_status, error_message, retry_attempt, last_saved_at
                FROM subscriptions
                WHERE subscription_group = $1
                ORDER BY id
                "#,
            )
            .bind(&group)
            .fetch_all(&*pool)
            .await
            {
                Ok(rows) => rows.iter().filter_map(row_to_subscription).collect(),
                Err(_) => Vec::new(),
            }
        })
    }

    fn save(&self, subscription: &Subscription) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => return,
        };
        let pool = self.pool.clone();
        let id = subscription.id().as_str().to_string();
        let group = subscription.group().as_str().to_string();
        let run_mode = run_mode_to_str(subscription.run_mode());
        let status = status_to_str(subscription.status());
        let position = subscription.position().value() as i64;
        let retry_attempt = subscription.retry_attempt() as i32;
        let last_saved_at = subscription.last_saved_at();
        let error_previous_status = subscription
            .error()
            .map(|e| status_to_str(e.previous_status).to_string());
        let error_message = subscription.error().map(|e| e.message.clone());

        let _ = handle.block_on(async {
            sqlx::query(
                r#"
                INSERT INTO subscriptions (
                    id, subscription_group, run_mode, status, position,
                    error_previous_status, error_message, retry_attempt, last_saved_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id)
                DO UPDATE SET
                    status = EXCLUDED.status,
                    position = EXCLUDED.position,
                    error_previous_status = EXCLUDED.error_previous_status,
                    error_message = EXCLUDED.error_message,
                    retry_attempt = EXCLUDED.retry_attempt,
                    last_saved_at = EXCLUDED.last_saved_at
                "#,
            )
            .bind(&id)
            .bind(&group)
            .bind(run_mode)
            .bind(status)
            .bind(position)
            .bind(&error_previous_status)
            .bind(&error_message)
            .bind(retry_attempt)
            .bind(last_saved_at)
            .execute(&*pool)
            .await
        });
    }

    fn remove(&self, id: &SubscriptionId) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => return,
        };
        let pool = self.pool.clone();
        let id = id.as_str().to_string();

        let _ = handle.block_on(async {
            sqlx::query("DELETE FROM subscriptions WHERE id = $1")
                .bind(&id)
                .execute(&*pool)
                .await
        });
    }
}
