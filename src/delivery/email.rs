//! Email delivery via SMTP (lettre).
//!
//! The SMTP transport is blocking; sends run in `spawn_blocking`.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::error::DeliveryError;
use crate::model::{Channel, Guest, MessageRecord};

use super::DeliveryProvider;

const DEFAULT_SUBJECT: &str = "A message from your hotel";

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailDeliveryConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl EmailDeliveryConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_SMTP_HOST` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("EMAIL_SMTP_HOST").ok()?;
        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("EMAIL_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());
        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

pub struct EmailDelivery {
    config: EmailDeliveryConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailDeliveryConfig) -> Self {
        Self { config }
    }
}

/// Send one email over SMTP (blocking — run in spawn_blocking).
fn send_email(
    config: &EmailDeliveryConfig,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<(), DeliveryError> {
    let send_failed = |reason: String| DeliveryError::SendFailed {
        channel: "email".into(),
        reason,
    };

    let creds = Credentials::new(config.username.clone(), config.password.clone());
    let transport = SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    let email = Message::builder()
        .from(
            config
                .from_address
                .parse()
                .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

    transport
        .send(&email)
        .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

    Ok(())
}

#[async_trait]
impl DeliveryProvider for EmailDelivery {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(
        &self,
        message: &MessageRecord,
        guest: Option<&Guest>,
    ) -> Result<(), DeliveryError> {
        let Some(to) = guest.and_then(|g| g.email.clone()) else {
            return Err(DeliveryError::NoRecipient {
                message_id: message.id.to_string(),
            });
        };

        let config = self.config.clone();
        let body = message.content.clone();
        let result = tokio::task::spawn_blocking(move || {
            send_email(&config, &to, DEFAULT_SUBJECT, &body)
        })
        .await
        .map_err(|e| DeliveryError::SendFailed {
            channel: "email".into(),
            reason: format!("send task panicked: {e}"),
        })?;

        if result.is_ok() {
            info!(message_id = %message.id, "Email sent");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn missing_email_is_no_recipient() {
        let provider = EmailDelivery::new(EmailDeliveryConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "svc".into(),
            password: "pw".into(),
            from_address: "frontdesk@example.com".into(),
        });
        let message = MessageRecord::outbound(Uuid::new_v4(), Channel::Email, "hello");

        let guest = Guest {
            id: Uuid::new_v4(),
            hotel_id: message.hotel_id,
            first_name: "Ira".into(),
            last_name: None,
            phone: Some("+15551110000".into()),
            email: None,
        };
        let result = provider.send(&message, Some(&guest)).await;
        assert!(matches!(result, Err(DeliveryError::NoRecipient { .. })));
    }

    #[test]
    fn invalid_recipient_address_fails_before_network() {
        let config = EmailDeliveryConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "svc".into(),
            password: "pw".into(),
            from_address: "frontdesk@example.com".into(),
        };
        let result = send_email(&config, "not-an-address", "subject", "body");
        assert!(matches!(result, Err(DeliveryError::SendFailed { .. })));
    }
}
