use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Notification, NotificationChannel};

#[derive(Clone)]
pub struct NotificationsRepo {
    pool: PgPool,
}

impl NotificationsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        notification_type: &str,
        title: &str,
        message: &str,
        data: serde_json::Value,
        channels: Vec<NotificationChannel>,
    ) -> Result<Notification, ApiError> {
        let row = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, notification_type, title, message, data, channels) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(title)
        .bind(message)
        .bind(data)
        .bind(Json(channels))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE notifications SET sent_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, ApiError> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
