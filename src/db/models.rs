use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 digest; the plaintext password is never persisted.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub failed_login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            failed_login_attempts: 0,
            lock_until: None,
            last_failed_login: None,
            created_at: Utc::now(),
        }
    }
}

/// One link in a rotation lineage. `revoked` is monotonic false→true; a
/// revoked row is never mutated again, only read for reuse detection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token_hash: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at: now + lifetime,
            revoked: false,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(user_id: Uuid, token_hash: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at: now + lifetime,
            used: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_unlocked() {
        let user = User::new("a@x.com".to_string(), "digest".to_string());
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.lock_until.is_none());
        assert!(user.last_failed_login.is_none());
    }

    #[test]
    fn test_refresh_token_expiry() {
        let token = RefreshToken::new(Uuid::new_v4(), "digest".to_string(), Duration::days(7));
        assert!(!token.revoked);
        assert!(!token.is_expired());

        let stale = RefreshToken::new(Uuid::new_v4(), "digest".to_string(), Duration::days(-1));
        assert!(stale.is_expired());
    }

    #[test]
    fn test_reset_token_starts_unused() {
        let token =
            PasswordResetToken::new(Uuid::new_v4(), "digest".to_string(), Duration::minutes(10));
        assert!(!token.used);
        assert!(token.expires_at > Utc::now());
    }
}
