use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Subscription, UsageEventType};

#[derive(Clone)]
pub struct UsageEventsRepo {
    pool: PgPool,
}

impl UsageEventsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_subscription(&self, user_id: Uuid) -> Result<Subscription, ApiError> {
        sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("no subscription for user {user_id}")))
    }

    /// Atomically increments the counter for `event_type` only if doing so
    /// would not exceed `limit`, and records the usage event in the same
    /// transaction. Returns `None` when the limit would be exceeded — the
    /// caller (the quota subsystem) turns that into `ApiError::QuotaDenied`.
    ///
    /// `event_type` is one of a closed Rust enum, not user input, so it is
    /// safe to interpolate into the JSONB path expression below.
    pub async fn track_if_allowed(
        &self,
        user_id: Uuid,
        event_type: UsageEventType,
        quantity: i64,
        limit: i64,
        idempotency_key: Option<&str>,
    ) -> Result<Option<Subscription>, ApiError> {
        let field = event_type.as_str();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE subscriptions \
             SET current_usage = jsonb_set( \
                    current_usage, \
                    '{{{field}}}', \
                    to_jsonb(COALESCE((current_usage->>'{field}')::bigint, 0) + $2) \
                 ), \
                 updated_at = now() \
             WHERE user_id = $1 \
               AND COALESCE((current_usage->>'{field}')::bigint, 0) + $2 <= $3 \
             RETURNING *"
        );

        let updated = sqlx::query_as::<_, Subscription>(&sql)
            .bind(user_id)
            .bind(quantity)
            .bind(limit)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(subscription) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        let insert_result = sqlx::query(
            "INSERT INTO usage_events \
             (user_id, subscription_id, event_type, quantity, idempotency_key, \
              billing_period_start, billing_period_end) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(subscription.id)
        .bind(field)
        .bind(quantity)
        .bind(idempotency_key)
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .execute(&mut *tx)
        .await?;

        if insert_result.rows_affected() == 0 && idempotency_key.is_some() {
            // A retry of an already-tracked event: don't double count it.
            tx.rollback().await?;
            return Ok(Some(self.get_subscription(user_id).await?));
        }

        tx.commit().await?;
        Ok(Some(subscription))
    }

    pub async fn subscriptions_due_for_reset(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, ApiError> {
        let rows = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions \
             WHERE usage_reset_date <= $1 AND status IN ('active', 'trialing')",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Zeroes every usage counter and advances `usage_reset_date` by exactly
    /// 30 days, independent of billing interval.
    pub async fn reset_usage(&self, subscription_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE subscriptions \
             SET current_usage = '{}'::jsonb, \
                 usage_reset_date = usage_reset_date + interval '30 days', \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
