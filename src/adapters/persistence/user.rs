use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    use_cases::auth::UserRepo,
};

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn find_id_by_email(&self, email: &str) -> AppResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(id)
    }

    async fn insert(&self, email: &str, now: DateTime<Utc>) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        // A unique violation on email surfaces as AppError::Conflict.
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(email)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(id)
    }
}
