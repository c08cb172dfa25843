//! Outbound mail collaborator.
//!
//! Thin client over a Resend-style HTTP API. Delivery is best-effort: the
//! orchestrator logs failures and never surfaces them, so a mail outage can
//! neither fail a request nor reveal whether an account exists.

use serde_json::json;

use crate::config::EmailConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl EmailClient {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }

    pub async fn send_reset_password_email(
        &self,
        to_email: &str,
        reset_link: &str,
    ) -> Result<(), AppError> {
        let body = json!({
            "from": self.from_address,
            "to": [to_email],
            "subject": "Reset your password",
            "html": format!(
                "<p>Hello,</p>\
                 <p>You requested to reset your password.</p>\
                 <p><a href=\"{}\">Click here to reset your password</a></p>\
                 <p>This link will expire in 10 minutes.</p>\
                 <p>If you did not request this, please ignore this email.</p>",
                reset_link
            ),
        });

        let response = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Email request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::InternalError(format!(
                "Email API returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(api_url: &str) -> EmailClient {
        EmailClient::new(&EmailConfig {
            api_url: api_url.to_string(),
            api_key: "test_key".to_string(),
            from_address: "Auth <test@example.com>".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        })
    }

    #[tokio::test]
    async fn test_send_reset_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer test_key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .send_reset_password_email("a@x.com", "http://localhost:3000/reset-password?token=t")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .send_reset_password_email("a@x.com", "http://localhost:3000/reset-password?token=t")
            .await;
        assert!(result.is_err());
    }
}
