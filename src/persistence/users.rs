use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{MailboxAuth, PortalCredential, User};

#[derive(Clone)]
pub struct UsersRepo {
    pool: PgPool,
}

impl UsersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user with email {email} not found")))
    }

    pub async fn save_mailbox_auth(&self, id: Uuid, auth: &MailboxAuth) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET mailbox_auth = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(Json(auth))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Appends a portal credential entry. Per §3's lifecycle note, entries
    /// are created by C7 when the worker reports a freshly-registered
    /// account and are never mutated afterward, only appended; a later
    /// credential for the same domain shadows an earlier one at lookup time
    /// (`User::portal_credential_for`) rather than replacing it here.
    pub async fn append_portal_credential(
        &self,
        id: Uuid,
        credential: PortalCredential,
    ) -> Result<(), ApiError> {
        let user = self.get(id).await?;
        let mut creds: Vec<PortalCredential> = user.portal_credentials.0;
        creds.push(credential);
        sqlx::query("UPDATE users SET portal_credentials = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(Json(creds))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
