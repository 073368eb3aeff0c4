use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::token::TokenDigest,
    use_cases::auth::{MagicLinkClaim, MagicLinkRepo, RedemptionTx},
};

#[derive(sqlx::FromRow, Debug)]
struct ClaimRow {
    id: Uuid,
    user_id: Uuid,
}

#[async_trait]
impl MagicLinkRepo for PostgresPersistence {
    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &TokenDigest,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO magic_link_tokens (id, user_id, token_hash, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(token_hash.as_bytes())
        .bind(expires_at)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(id)
    }

    async fn begin_redemption(&self) -> AppResult<Box<dyn RedemptionTx>> {
        let tx = self.pool().begin().await.map_err(AppError::from)?;
        Ok(Box::new(PgRedemptionTx { tx }))
    }
}

/// Redemption inside a Postgres transaction. sqlx rolls the transaction back
/// when it is dropped uncommitted.
pub struct PgRedemptionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RedemptionTx for PgRedemptionTx {
    async fn lock_redeemable(
        &mut self,
        token_hash: &TokenDigest,
        now: DateTime<Utc>,
    ) -> AppResult<Option<MagicLinkClaim>> {
        // FOR UPDATE makes a concurrent redemption wait here, then re-check the
        // predicate against the committed row.
        let row = sqlx::query_as::<_, ClaimRow>(
            r#"SELECT id, user_id FROM magic_link_tokens
               WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2
               FOR UPDATE"#,
        )
        .bind(token_hash.as_bytes())
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(|r| MagicLinkClaim {
            token_id: r.id,
            user_id: r.user_id,
        }))
    }

    async fn mark_consumed(&mut self, token_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE magic_link_tokens SET consumed_at = $2 WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(token_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() != 1 {
            return Err(AppError::InvalidToken);
        }
        Ok(())
    }

    async fn record_login(&mut self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn email_of(&mut self, user_id: Uuid) -> AppResult<String> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(AppError::from)?;
        Ok(email)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgRedemptionTx { tx } = *self;
        tx.commit().await.map_err(AppError::from)
    }
}
