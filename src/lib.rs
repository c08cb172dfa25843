pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;

use actix_web::HttpResponse;
use sqlx::PgPool;
use std::sync::Arc;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::AuthService;
pub use db::{DbOperations, PasswordResetToken, RefreshToken, User};
pub use email::EmailClient;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: Arc<PgPool>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db_pool = PgPool::connect(&config.database.url)
            .await
            .map_err(|e| {
                AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string()))
            })?;
        let db_pool = Arc::new(db_pool);

        let db = DbOperations::new(db_pool.clone());
        let auth = AuthService::new(db, &config)?;

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            auth,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db_pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[tokio::test]
    async fn test_health_check_shape() {
        let response = health_check().await;
        assert!(response.status().is_success());

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].is_string());
    }
}
