//! SMS/WhatsApp delivery via a provider webhook endpoint.
//!
//! Posts a small JSON payload to the configured messaging-provider URL
//! (Twilio-style gateway). One instance per channel.

use async_trait::async_trait;
use tracing::info;

use crate::error::DeliveryError;
use crate::model::{Channel, Guest, MessageRecord};

use super::DeliveryProvider;

/// SMS gateway configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmsDeliveryConfig {
    /// Provider endpoint to POST sends to.
    pub endpoint: String,
    /// Sender number shown to the guest.
    pub from_number: String,
}

impl SmsDeliveryConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMS_GATEWAY_URL` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("SMS_GATEWAY_URL").ok()?;
        let from_number = std::env::var("SMS_FROM_NUMBER").unwrap_or_default();
        Some(Self {
            endpoint,
            from_number,
        })
    }
}

pub struct WebhookSmsDelivery {
    channel: Channel,
    config: SmsDeliveryConfig,
    client: reqwest::Client,
}

impl WebhookSmsDelivery {
    pub fn new(channel: Channel, config: SmsDeliveryConfig) -> Self {
        Self {
            channel,
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliveryProvider for WebhookSmsDelivery {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(
        &self,
        message: &MessageRecord,
        guest: Option<&Guest>,
    ) -> Result<(), DeliveryError> {
        let Some(to) = guest.and_then(|g| g.phone.clone()) else {
            return Err(DeliveryError::NoRecipient {
                message_id: message.id.to_string(),
            });
        };

        let body = serde_json::json!({
            "to": to,
            "from": self.config.from_number,
            "body": message.content,
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::SendFailed {
                channel: self.channel.as_str().to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(DeliveryError::SendFailed {
                channel: self.channel.as_str().to_string(),
                reason: format!("gateway returned HTTP {}", resp.status()),
            });
        }

        info!(message_id = %message.id, channel = %self.channel, "Message handed to gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn missing_phone_is_no_recipient() {
        let provider = WebhookSmsDelivery::new(
            Channel::Sms,
            SmsDeliveryConfig {
                endpoint: "http://127.0.0.1:9".into(),
                from_number: "+15550000000".into(),
            },
        );
        let message = MessageRecord::outbound(Uuid::new_v4(), Channel::Sms, "hi");

        // No guest at all.
        let result = provider.send(&message, None).await;
        assert!(matches!(result, Err(DeliveryError::NoRecipient { .. })));

        // Guest without a phone number.
        let guest = Guest {
            id: Uuid::new_v4(),
            hotel_id: message.hotel_id,
            first_name: "Sam".into(),
            last_name: None,
            phone: None,
            email: Some("sam@example.com".into()),
        };
        let result = provider.send(&message, Some(&guest)).await;
        assert!(matches!(result, Err(DeliveryError::NoRecipient { .. })));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_send_failed() {
        // Port 9 (discard) refuses connections on loopback.
        let provider = WebhookSmsDelivery::new(
            Channel::Sms,
            SmsDeliveryConfig {
                endpoint: "http://127.0.0.1:9/send".into(),
                from_number: "+15550000000".into(),
            },
        );
        let message = MessageRecord::outbound(Uuid::new_v4(), Channel::Sms, "hi");
        let guest = Guest {
            id: Uuid::new_v4(),
            hotel_id: message.hotel_id,
            first_name: "Sam".into(),
            last_name: None,
            phone: Some("+15551112222".into()),
            email: None,
        };

        let result = provider.send(&message, Some(&guest)).await;
        assert!(matches!(result, Err(DeliveryError::SendFailed { .. })));
    }
}
