//! Message intake pipeline.
//!
//! One inbound guest message flows through:
//! 1. Receive — validate required fields, build the record
//! 2. Persist — store the inbound message (fatal on failure)
//! 3. Classify — LLM call with tenant/guest/booking context
//! 4. Escalate — high urgency opens a follow-up task
//! 5. Respond — persist the autonomous reply
//! 6. Annotate — write intent/sentiment back onto the inbound record
//! 7. Deliver — fire-and-forget channel send, then mark delivered
//!
//! A classification failure stops at step 3 and returns the persisted
//! message with no reply and no task; a human picks it up from the
//! back-office instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classify::ClassifyClient;
use crate::delivery::DeliveryRouter;
use crate::error::IntakeError;
use crate::model::{Channel, Direction, FollowUpTask, MessageRecord, MessageStatus};
use crate::policy;
use crate::store::{Database, MessageFilter};

use super::gather_context;

/// Normalized inbound message parameters, as produced by the webhook
/// adapters.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub hotel_id: Uuid,
    pub channel: Channel,
    pub content: String,
    #[serde(default)]
    pub guest_id: Option<Uuid>,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Staff-authored outbound send parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingMessage {
    pub channel: Channel,
    pub content: String,
    pub guest_id: Uuid,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
}

/// What one intake invocation produced. `ai_response` and `task` are
/// absent on degraded runs — callers must not assume a reply or a task
/// always accompanies a successful intake.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub message: MessageRecord,
    pub ai_response: Option<MessageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<FollowUpTask>,
}

/// Message intake pipeline over injected dependencies.
pub struct MessageIntake {
    db: Arc<dyn Database>,
    classifier: Arc<ClassifyClient>,
    delivery: Arc<DeliveryRouter>,
}

impl MessageIntake {
    pub fn new(
        db: Arc<dyn Database>,
        classifier: Arc<ClassifyClient>,
        delivery: Arc<DeliveryRouter>,
    ) -> Self {
        Self {
            db,
            classifier,
            delivery,
        }
    }

    /// Run one inbound message through the full pipeline.
    pub async fn handle_incoming(
        &self,
        input: IncomingMessage,
    ) -> Result<MessageOutcome, IntakeError> {
        // Receive: required fields first, before anything is persisted.
        if input.content.trim().is_empty() {
            return Err(IntakeError::Validation("content must not be empty".into()));
        }
        if input.hotel_id.is_nil() {
            return Err(IntakeError::Validation("hotel_id is required".into()));
        }

        let mut inbound = MessageRecord::inbound(input.hotel_id, input.channel, input.content.as_str());
        inbound.guest_id = input.guest_id;
        inbound.booking_id = input.booking_id;
        inbound.language = input.language.clone();

        // Persist inbound. Fatal: no record, no pipeline.
        self.db.insert_message(&inbound).await?;
        info!(
            message_id = %inbound.id,
            hotel_id = %inbound.hotel_id,
            channel = %inbound.channel,
            "Inbound message stored"
        );

        // Classify. From here on, failures degrade instead of aborting.
        let mut context = gather_context(
            &self.db,
            input.hotel_id,
            input.guest_id,
            input.booking_id,
            input.language,
        )
        .await;
        context.prior_context = self.recent_guest_messages(&inbound).await;

        let classification = match self.classifier.classify(&input.content, &context).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(
                    message_id = %inbound.id,
                    error = %e,
                    "Classification unavailable; message left for human review"
                );
                return Ok(MessageOutcome {
                    message: inbound,
                    ai_response: None,
                    task: None,
                });
            }
        };

        // Escalate.
        let decision = policy::decide(&classification.analysis);
        let task = if decision.should_escalate {
            let intent_label = classification
                .analysis
                .intent
                .as_ref()
                .map(|i| i.as_str().to_string())
                .unwrap_or_else(|| "General".to_string());
            let mut task = FollowUpTask::new(
                inbound.hotel_id,
                format!("Guest Request: {intent_label}"),
                decision.category,
                decision.priority,
            )
            .with_description(inbound.content.as_str())
            .with_metadata(serde_json::json!({
                "source": "message",
                "message_id": inbound.id.to_string(),
                "channel": inbound.channel.as_str(),
            }));
            task.guest_id = inbound.guest_id;
            task.booking_id = inbound.booking_id;

            match self.db.insert_task(&task).await {
                Ok(()) => {
                    info!(
                        task_id = %task.id,
                        message_id = %inbound.id,
                        priority = task.priority.as_str(),
                        category = task.category.as_str(),
                        "Escalated message to follow-up task"
                    );
                    Some(task)
                }
                Err(e) => {
                    error!(message_id = %inbound.id, error = %e, "Task creation failed");
                    None
                }
            }
        } else {
            None
        };

        // Respond.
        let reply = MessageRecord::reply_to(&inbound, classification.reply.as_str());
        let ai_response = match self.db.insert_message(&reply).await {
            Ok(()) => Some(reply),
            Err(e) => {
                error!(message_id = %inbound.id, error = %e, "Failed to store autonomous reply");
                None
            }
        };

        // Annotate the inbound record with intent/sentiment (not urgency).
        let intent = classification.analysis.intent.clone();
        let sentiment = classification.analysis.sentiment;
        if let Err(e) = self
            .db
            .update_message_analysis(inbound.hotel_id, inbound.id, intent.as_ref(), sentiment)
            .await
        {
            warn!(message_id = %inbound.id, error = %e, "Failed to annotate inbound message");
        } else {
            inbound.intent = intent;
            inbound.sentiment = Some(sentiment);
        }

        // Deliver.
        let ai_response = match ai_response {
            Some(mut reply) => {
                self.attempt_delivery(&mut reply).await;
                Some(reply)
            }
            None => None,
        };

        Ok(MessageOutcome {
            message: inbound,
            ai_response,
            task,
        })
    }

    /// Persist and deliver a staff-authored outbound message.
    pub async fn send_message(
        &self,
        hotel_id: Uuid,
        input: OutgoingMessage,
    ) -> Result<MessageRecord, IntakeError> {
        if input.content.trim().is_empty() {
            return Err(IntakeError::Validation("content must not be empty".into()));
        }

        let mut outbound = MessageRecord::outbound(hotel_id, input.channel, input.content.as_str())
            .with_guest(input.guest_id);
        outbound.booking_id = input.booking_id;

        self.db.insert_message(&outbound).await?;
        self.attempt_delivery(&mut outbound).await;
        Ok(outbound)
    }

    /// Most recent prior inbound messages from the same guest, for the
    /// classifier's context. Best-effort.
    async fn recent_guest_messages(&self, inbound: &MessageRecord) -> Option<String> {
        let guest_id = inbound.guest_id?;
        let filter = MessageFilter {
            guest_id: Some(guest_id),
            direction: Some(Direction::Inbound),
            limit: Some(4),
            ..Default::default()
        };
        let prior: Vec<String> = self
            .db
            .list_messages(inbound.hotel_id, &filter)
            .await
            .ok()?
            .into_iter()
            .filter(|m| m.id != inbound.id)
            .take(3)
            .map(|m| m.content)
            .collect();
        if prior.is_empty() {
            None
        } else {
            Some(prior.join("\n"))
        }
    }

    /// Fire-and-forget delivery: failures are logged, and the message is
    /// marked delivered once the attempt has been made either way.
    async fn attempt_delivery(&self, message: &mut MessageRecord) {
        if let Err(e) = self.delivery.deliver(message).await {
            warn!(message_id = %message.id, error = %e, "Delivery attempt failed");
        }
        match self
            .db
            .update_message_status(message.hotel_id, message.id, MessageStatus::Delivered)
            .await
        {
            Ok(()) => message.status = MessageStatus::Delivered,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to update delivery status");
            }
        }
    }
}
