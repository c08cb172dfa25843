//! Refresh-token lifecycle: issue, rotate, revoke.
//!
//! Each rotation revokes the presented token and creates exactly one
//! successor, so at most one live link exists per lineage. Presenting an
//! already-revoked link is treated as theft and tears down every session
//! the account has.

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password;
use crate::db::models::RefreshToken;
use crate::db::DbOperations;
use crate::error::{AppError, AuthError};

#[derive(Clone)]
pub struct RefreshTokenManager {
    db: DbOperations,
    lifetime: Duration,
}

impl RefreshTokenManager {
    pub fn new(db: DbOperations, lifetime: Duration) -> Self {
        Self { db, lifetime }
    }

    /// Mint a fresh token for the user. The plaintext is returned exactly
    /// once; the store only ever holds its digest.
    pub async fn issue(&self, user_id: Uuid) -> Result<(String, RefreshToken), AppError> {
        let plaintext = password::generate_secret();
        let token_hash = password::hash(&plaintext)?;
        let record = self
            .db
            .insert_refresh_token(&RefreshToken::new(user_id, token_hash, self.lifetime))
            .await?;

        Ok((plaintext, record))
    }

    /// Exchange a presented token for its successor.
    ///
    /// Digests are salted, so the match is a linear scan over unexpired rows;
    /// active sets are small per deployment. A revoked match is a reuse
    /// signal and fails secure: the whole lineage set for that user goes.
    pub async fn rotate(&self, presented: &str) -> Result<(String, RefreshToken), AppError> {
        let candidates = self.db.list_unexpired_refresh_tokens().await?;

        let matched = candidates
            .iter()
            .find(|token| password::verify(presented, &token.token_hash));

        let Some(matched) = matched else {
            warn!("Invalid refresh token presented");
            return Err(AuthError::InvalidRefreshToken.into());
        };

        if matched.revoked {
            return self.handle_reuse(matched.user_id).await;
        }

        // Compare-and-set so only one concurrent rotation wins; the loser
        // observes already-revoked, which is reuse by definition.
        if !self.db.revoke_refresh_token_if_active(matched.id).await? {
            return self.handle_reuse(matched.user_id).await;
        }

        let successor = self.issue(matched.user_id).await?;
        info!(user_id = %matched.user_id, "Refresh token rotated");

        Ok(successor)
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.db.revoke_all_refresh_tokens(user_id).await
    }

    async fn handle_reuse(&self, user_id: Uuid) -> Result<(String, RefreshToken), AppError> {
        tracing::error!(user_id = %user_id, "Refresh token reuse detected, revoking all sessions");
        self.revoke_all(user_id).await?;
        Err(AuthError::SessionCompromised.into())
    }
}
