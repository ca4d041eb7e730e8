//! Outbound delivery — best-effort, per-channel "send" with no callback
//! confirmation.
//!
//! Providers are selected through a router keyed by the closed `Channel`
//! enum. Delivery is fire-and-forget: the pipelines log failures and move
//! on; a failed send never rolls back the persisted message.

pub mod email;
pub mod sms;

pub use email::{EmailDelivery, EmailDeliveryConfig};
pub use sms::{SmsDeliveryConfig, WebhookSmsDelivery};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::model::{Channel, Guest, MessageRecord};
use crate::store::Database;

/// A channel-specific delivery side effect. Pure I/O, no business logic.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// The channel this provider serves.
    fn channel(&self) -> Channel;

    /// Attempt to deliver `message` to the linked guest.
    async fn send(
        &self,
        message: &MessageRecord,
        guest: Option<&Guest>,
    ) -> Result<(), DeliveryError>;
}

/// Routes outbound messages to the provider registered for their channel.
pub struct DeliveryRouter {
    db: Arc<dyn Database>,
    providers: HashMap<Channel, Arc<dyn DeliveryProvider>>,
}

impl DeliveryRouter {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its channel. Later registrations replace
    /// earlier ones for the same channel.
    pub fn register(&mut self, provider: Arc<dyn DeliveryProvider>) {
        self.providers.insert(provider.channel(), provider);
    }

    /// Attempt delivery of an outbound message.
    ///
    /// Resolves the linked guest (tenant-scoped) for providers that need a
    /// contact address. Channels without a registered provider fail with
    /// `NotConfigured`.
    pub async fn deliver(&self, message: &MessageRecord) -> Result<(), DeliveryError> {
        let Some(provider) = self.providers.get(&message.channel) else {
            return Err(DeliveryError::NotConfigured {
                channel: message.channel.as_str().to_string(),
            });
        };

        let guest = match message.guest_id {
            Some(guest_id) => self
                .db
                .get_guest(message.hotel_id, guest_id)
                .await
                .map_err(|e| DeliveryError::SendFailed {
                    channel: message.channel.as_str().to_string(),
                    reason: format!("guest lookup failed: {e}"),
                })?,
            None => None,
        };

        provider.send(message, guest.as_ref()).await
    }
}

/// Logging no-op provider for channels without an external integration
/// (chat widget renders from the database; voice has no outbound text).
pub struct LogDelivery {
    channel: Channel,
}

impl LogDelivery {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DeliveryProvider for LogDelivery {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(
        &self,
        message: &MessageRecord,
        _guest: Option<&Guest>,
    ) -> Result<(), DeliveryError> {
        info!(
            message_id = %message.id,
            channel = %self.channel,
            "Delivery handled in-app; nothing to send"
        );
        debug!(content_len = message.content.len(), "Logged delivery");
        Ok(())
    }
}
