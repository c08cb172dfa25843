//! Single-use, time-boxed password-reset tokens.

use chrono::Duration;
use tracing::{info, warn};

use crate::auth::password;
use crate::db::models::{PasswordResetToken, User};
use crate::db::DbOperations;
use crate::error::{AppError, AuthError};

#[derive(Clone)]
pub struct PasswordResetManager {
    db: DbOperations,
    lifetime: Duration,
}

impl PasswordResetManager {
    pub fn new(db: DbOperations, lifetime: Duration) -> Self {
        Self { db, lifetime }
    }

    /// Issue a reset token for the user and return the plaintext for
    /// out-of-band delivery. The caller owns delivery; delivery failure must
    /// not fail the request.
    pub async fn issue(&self, user: &User) -> Result<String, AppError> {
        let plaintext = password::generate_secret();
        let token_hash = password::hash(&plaintext)?;
        self.db
            .insert_password_reset_token(&PasswordResetToken::new(
                user.id,
                token_hash,
                self.lifetime,
            ))
            .await?;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(plaintext)
    }

    /// Burn a presented token and set the new password. On a match the token
    /// is consumed, the password digest overwritten and every refresh token
    /// of the account revoked as one atomic unit; a credential reset
    /// invalidates all standing sessions.
    pub async fn consume(&self, presented: &str, new_password: &str) -> Result<(), AppError> {
        let candidates = self.db.list_consumable_reset_tokens().await?;

        let matched = candidates
            .iter()
            .find(|token| password::verify(presented, &token.token_hash));

        let Some(matched) = matched else {
            warn!("Invalid or expired password reset token presented");
            return Err(AuthError::InvalidResetToken.into());
        };

        let new_password_hash = password::hash(new_password)?;
        let consumed = self
            .db
            .consume_password_reset(matched.id, matched.user_id, &new_password_hash)
            .await?;

        if !consumed {
            // Lost a race against a concurrent consumption of the same token.
            warn!(user_id = %matched.user_id, "Reset token already consumed");
            return Err(AuthError::InvalidResetToken.into());
        }

        info!(user_id = %matched.user_id, "Password reset successful, sessions revoked");
        Ok(())
    }
}
