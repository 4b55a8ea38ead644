//! EmailJS REST delivery.
//!
//! Delivery is best-effort: every problem ends up in the returned
//! `EmailOutcome` and is logged, never propagated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{
    AppError, EmailNotifier, EmailOutcome, ExternalServiceError, RegistrationEmail,
};

pub const EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Debug)]
pub struct EmailJsConfig {
    pub public_key: Option<SecretString>,
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for EmailJsConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            service_id: None,
            template_id: None,
            endpoint: EMAILJS_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a RegistrationEmail,
}

pub struct EmailJsNotifier {
    http_client: Client,
    config: EmailJsConfig,
}

impl EmailJsNotifier {
    pub fn new(config: EmailJsConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExternalServiceError::HttpError(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    async fn deliver(&self, request: &SendRequest<'_>) -> Result<(), ExternalServiceError> {
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExternalServiceError::Timeout(e.to_string())
                } else if e.is_connect() {
                    ExternalServiceError::Unavailable(e.to_string())
                } else {
                    ExternalServiceError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let detail = format!("{}: {}", status, body);
        Err(if status == StatusCode::TOO_MANY_REQUESTS {
            ExternalServiceError::RateLimited(detail)
        } else if status.is_server_error() {
            ExternalServiceError::Unavailable(detail)
        } else {
            ExternalServiceError::HttpError(detail)
        })
    }

    fn non_blank(value: Option<&str>) -> Option<&str> {
        value.filter(|v| !v.trim().is_empty())
    }
}

#[async_trait]
impl EmailNotifier for EmailJsNotifier {
    #[instrument(skip(self, email), fields(product_id = %email.product_id))]
    async fn send_registration(&self, email: &RegistrationEmail) -> EmailOutcome {
        let Some(public_key) =
            Self::non_blank(self.config.public_key.as_ref().map(|k| k.expose_secret()))
        else {
            warn!("EmailJS public key is not set, email will not be sent");
            return EmailOutcome::Skipped {
                reason: "missing public key".to_string(),
            };
        };

        if let Some(field) = email.missing_field() {
            warn!(field = field, "Missing required email parameter");
            return EmailOutcome::Skipped {
                reason: format!("missing parameter {}", field),
            };
        }

        let (Some(service_id), Some(template_id)) = (
            Self::non_blank(self.config.service_id.as_deref()),
            Self::non_blank(self.config.template_id.as_deref()),
        ) else {
            warn!("EmailJS service ID or template ID is not set, email will not be sent");
            return EmailOutcome::Skipped {
                reason: "missing service or template id".to_string(),
            };
        };

        let request = SendRequest {
            service_id,
            template_id,
            user_id: public_key,
            template_params: email,
        };

        match self.deliver(&request).await {
            Ok(()) => {
                info!("Registration email sent");
                EmailOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "Error sending email");
                EmailOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Used when email delivery is not configured at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl EmailNotifier for DisabledNotifier {
    async fn send_registration(&self, _email: &RegistrationEmail) -> EmailOutcome {
        EmailOutcome::Skipped {
            reason: "email delivery disabled".to_string(),
        }
    }
}
