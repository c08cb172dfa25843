use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::lockout::{LockoutPolicy, LoginGuard};
use crate::auth::password;
use crate::auth::refresh::RefreshTokenManager;
use crate::auth::reset::PasswordResetManager;
use crate::auth::token::TokenCodec;
use crate::config::Settings;
use crate::db::models::User;
use crate::db::DbOperations;
use crate::email::EmailClient;
use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Request-level workflow composition: login, refresh, logout,
/// forgot-password and reset-password, built from the store, the hasher,
/// the token components and the mail collaborator.
///
/// Authentication failures all normalize to the same generic error; the
/// one deliberate exception is `SessionCompromised` out of `refresh`,
/// where the replayed artifact was a token, not a password.
#[derive(Clone)]
pub struct AuthService {
    db: DbOperations,
    codec: Arc<TokenCodec>,
    refresh_tokens: RefreshTokenManager,
    login_guard: LoginGuard,
    password_reset: PasswordResetManager,
    email: EmailClient,
    frontend_url: String,
}

impl AuthService {
    pub fn new(db: DbOperations, settings: &Settings) -> Result<Self, AppError> {
        let algorithm: Algorithm = settings.auth.jwt_algorithm.parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Unknown JWT algorithm: {}",
                settings.auth.jwt_algorithm
            ))
        })?;
        let codec = Arc::new(TokenCodec::new(
            &settings.auth.jwt_secret,
            algorithm,
            Duration::minutes(settings.auth.access_token_minutes),
        ));
        let refresh_tokens = RefreshTokenManager::new(
            db.clone(),
            Duration::days(settings.auth.refresh_token_days),
        );
        let login_guard = LoginGuard::new(
            db.clone(),
            LockoutPolicy {
                threshold: settings.auth.lockout_threshold,
                duration: Duration::minutes(settings.auth.lockout_minutes),
            },
        );
        let password_reset = PasswordResetManager::new(
            db.clone(),
            Duration::minutes(settings.auth.reset_token_minutes),
        );
        let email = EmailClient::new(&settings.email);

        Ok(Self {
            db,
            codec,
            refresh_tokens,
            login_guard,
            password_reset,
            email,
            frontend_url: settings.email.frontend_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn register(&self, email: &str, password_plain: &str) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        info!(email = %email, "Registration attempt");

        if self.db.get_user_by_email(&email).await?.is_some() {
            warn!(email = %email, "Registration failed: email already exists");
            return Err(AuthError::Conflict.into());
        }

        let password_hash = password::hash(password_plain)?;
        let user = match self.db.create_user(&User::new(email, password_hash)).await {
            Ok(user) => user,
            // Concurrent registration of the same email loses here.
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                return Err(AuthError::Conflict.into())
            }
            Err(e) => return Err(e),
        };

        info!(user_id = %user.id, "User registered successfully");
        Ok(user)
    }

    /// Lock check comes before password verification, and unknown account,
    /// wrong password and locked account are indistinguishable in the result.
    pub async fn login(&self, email: &str, password_plain: &str) -> Result<TokenPair, AppError> {
        let email = normalize_email(email)?;
        info!(email = %email, "Login attempt");

        let Some(user) = self.db.get_user_by_email(&email).await? else {
            warn!(email = %email, "Login failed: user not found");
            return Err(AuthError::Unauthorized.into());
        };

        if self.login_guard.check_locked(&user) {
            warn!(user_id = %user.id, "Login blocked: account locked");
            return Err(AuthError::Unauthorized.into());
        }

        if !password::verify(password_plain, &user.password_hash) {
            warn!(user_id = %user.id, "Login failed: invalid password");
            // The counter moves even though the response stays generic.
            self.login_guard.record_failure(&user).await?;
            return Err(AuthError::Unauthorized.into());
        }

        self.login_guard.record_success(&user).await?;

        let access_token = self.codec.issue(user.id)?;
        let (refresh_token, _) = self.refresh_tokens.issue(user.id).await?;

        info!(user_id = %user.id, "Login successful");
        Ok(TokenPair::bearer(access_token, refresh_token))
    }

    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AppError> {
        info!("Refresh token attempt received");
        let (refresh_token, record) = self.refresh_tokens.rotate(presented).await?;
        let access_token = self.codec.issue(record.user_id)?;

        Ok(TokenPair::bearer(access_token, refresh_token))
    }

    pub async fn current_user(&self, access_token: &str) -> Result<User, AppError> {
        let user_id = self.codec.verify(access_token)?;
        self.db
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized.into())
    }

    /// Always succeeds with a generic acknowledgement; issuance and delivery
    /// only happen when the account exists, and a delivery failure is logged
    /// rather than surfaced.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        info!(email = %email, "Password reset requested");

        if let Some(user) = self.db.get_user_by_email(&email).await? {
            let reset_token = self.password_reset.issue(&user).await?;
            let reset_link = format!(
                "{}/reset-password?token={}",
                self.frontend_url, reset_token
            );

            if let Err(e) = self
                .email
                .send_reset_password_email(&user.email, &reset_link)
                .await
            {
                error!(user_id = %user.id, "Failed to send password reset email: {}", e);
            }
        }

        Ok(())
    }

    pub async fn reset_password(
        &self,
        presented: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.password_reset.consume(presented, new_password).await
    }

    /// The access token is stateless, so logout only confirms the bearer is
    /// valid; clients discard their tokens locally.
    pub async fn logout(&self, access_token: &str) -> Result<Uuid, AppError> {
        let user_id = self.codec.verify(access_token)?;
        info!(user_id = %user_id, "User logged out");
        Ok(user_id)
    }
}

/// Identity is case-insensitive: store and compare lowercased.
fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@X.Com ").unwrap(), "a@x.com");
        assert!(normalize_email("").is_err());
        assert!(normalize_email("not-an-email").is_err());
    }

    #[test]
    fn test_token_pair_is_bearer() {
        let pair = TokenPair::bearer("a".into(), "r".into());
        assert_eq!(pair.token_type, "bearer");
    }
}
