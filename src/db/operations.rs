use crate::db::models::{PasswordResetToken, RefreshToken, User};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Data access layer for the three auth tables. All persisted secrets are
/// digests; nothing here ever sees a plaintext password or token.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, failed_login_attempts, lock_until, last_failed_login, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.failed_login_attempts)
        .bind(user.lock_until)
        .bind(user.last_failed_login)
        .bind(user.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    /// Persist the lockout bookkeeping after a login attempt. Called on both
    /// the failure and success paths; the state change survives even when the
    /// request itself reports a generic failure.
    pub async fn update_login_state(
        &self,
        user_id: Uuid,
        failed_attempts: i32,
        lock_until: Option<DateTime<Utc>>,
        last_failed_login: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = $2, lock_until = $3, last_failed_login = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(failed_attempts)
        .bind(lock_until)
        .bind(last_failed_login)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    pub async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(token)
    }

    /// Unexpired rows, revoked ones included: a revoked match is exactly the
    /// reuse signal rotation needs to see.
    pub async fn list_unexpired_refresh_tokens(&self) -> Result<Vec<RefreshToken>, AppError> {
        let tokens = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE expires_at > $1",
        )
        .bind(Utc::now())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(tokens)
    }

    /// Compare-and-set revocation. Returns true when this caller flipped the
    /// flag; false means another rotation already won the race.
    pub async fn revoke_refresh_token_if_active(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_password_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<PasswordResetToken, AppError> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(token)
    }

    pub async fn list_consumable_reset_tokens(
        &self,
    ) -> Result<Vec<PasswordResetToken>, AppError> {
        let tokens = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT * FROM password_reset_tokens WHERE expires_at > $1 AND used = FALSE",
        )
        .bind(Utc::now())
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(tokens)
    }

    /// One atomic unit: burn the reset token, overwrite the password digest
    /// and tear down every standing refresh token for the account. Returns
    /// false when the token was already consumed by a concurrent request.
    pub async fn consume_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        new_password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut transaction = self.pool.as_ref().begin().await?;

        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
        )
        .bind(token_id)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() != 1 {
            transaction.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(new_password_hash)
            .execute(&mut *transaction)
            .await?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(true)
    }
}
