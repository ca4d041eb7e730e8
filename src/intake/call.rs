//! Call intake pipeline.
//!
//! Webhook-driven and asynchronous: record creation, transcript arrival,
//! and completion may each arrive in separate provider invocations.
//!
//! Calls are analyzed like messages but never escalate to a follow-up
//! task; the analysis lands on the call record only.

use std::sync::Arc;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::ClassifyClient;
use crate::error::{DatabaseError, IntakeError};
use crate::model::{CallRecord, CallStatus};
use crate::store::Database;

use super::gather_context;

/// Dialable number: optional `+`, 7–15 digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone pattern"));

/// Normalized telephony webhook payload for an inbound call.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyWebhook {
    /// Caller's number (provider `From`).
    pub caller: String,
    /// Number the guest dialed (provider `To`) — the tenant routing key.
    pub dialed: String,
}

/// Provider-reported call end.
#[derive(Debug, Clone, Deserialize)]
pub struct CallCompletion {
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Call intake pipeline over injected dependencies.
pub struct CallIntake {
    db: Arc<dyn Database>,
    classifier: Arc<ClassifyClient>,
}

impl CallIntake {
    pub fn new(db: Arc<dyn Database>, classifier: Arc<ClassifyClient>) -> Self {
        Self { db, classifier }
    }

    /// Handle a provider webhook announcing an inbound call.
    ///
    /// The dialed number resolves the tenant — no match rejects the call.
    /// The caller's number is matched to a guest when possible; no match
    /// is not an error.
    pub async fn handle_inbound_call(
        &self,
        webhook: TelephonyWebhook,
    ) -> Result<CallRecord, IntakeError> {
        let hotel = self
            .db
            .find_hotel_by_routing_number(webhook.dialed.trim())
            .await?
            .ok_or_else(|| IntakeError::TenantResolution(webhook.dialed.clone()))?;

        let caller = normalize_phone(&webhook.caller).ok_or_else(|| {
            IntakeError::Validation(format!("unusable caller number: {}", webhook.caller))
        })?;

        let guest = self.db.find_guest_by_phone(hotel.id, &caller).await?;

        let mut call = CallRecord::inbound(hotel.id, caller.as_str());
        if let Some(ref guest) = guest {
            call = call.with_guest(guest.id);
        }

        self.db.insert_call(&call).await?;
        info!(
            call_id = %call.id,
            hotel_id = %hotel.id,
            caller = %caller,
            known_guest = guest.is_some(),
            "Inbound call recorded"
        );
        Ok(call)
    }

    /// Attach a transcript to an existing call and analyze it.
    ///
    /// The transcript is always stored; a classification failure leaves
    /// the analysis fields null instead of aborting the update.
    pub async fn attach_transcript(
        &self,
        hotel_id: Uuid,
        call_id: Uuid,
        transcript: &str,
    ) -> Result<CallRecord, IntakeError> {
        if transcript.trim().is_empty() {
            return Err(IntakeError::Validation("transcript must not be empty".into()));
        }

        let call = self
            .db
            .get_call(hotel_id, call_id)
            .await?
            .ok_or_else(|| not_found(call_id))?;

        self.db
            .update_call_transcript(hotel_id, call_id, transcript)
            .await?;

        let context =
            gather_context(&self.db, hotel_id, call.guest_id, call.booking_id, None).await;

        match self.classifier.analyze(transcript, &context).await {
            Ok(analysis) => {
                self.db
                    .update_call_analysis(
                        hotel_id,
                        call_id,
                        analysis.intent.as_ref(),
                        analysis.sentiment,
                        analysis.urgency,
                        &analysis.summary,
                    )
                    .await?;
                info!(
                    call_id = %call_id,
                    urgency = analysis.urgency,
                    "Call transcript analyzed"
                );
            }
            Err(e) => {
                warn!(
                    call_id = %call_id,
                    error = %e,
                    "Transcript stored without analysis"
                );
            }
        }

        self.db
            .get_call(hotel_id, call_id)
            .await?
            .ok_or_else(|| not_found(call_id))
    }

    /// Record a provider-reported call end.
    ///
    /// Duration comes from the provider's timestamps, never from a local
    /// clock.
    pub async fn complete_call(
        &self,
        hotel_id: Uuid,
        call_id: Uuid,
        completion: CallCompletion,
    ) -> Result<CallRecord, IntakeError> {
        if !completion.status.is_terminal() {
            return Err(IntakeError::Validation(format!(
                "{} is not a terminal call status",
                completion.status.as_str()
            )));
        }

        self.db
            .get_call(hotel_id, call_id)
            .await?
            .ok_or_else(|| not_found(call_id))?;

        let duration_secs = (completion.ended_at - completion.started_at)
            .num_seconds()
            .max(0);

        self.db
            .complete_call(
                hotel_id,
                call_id,
                completion.status,
                completion.ended_at,
                duration_secs,
            )
            .await?;

        self.db
            .get_call(hotel_id, call_id)
            .await?
            .ok_or_else(|| not_found(call_id))
    }
}

fn not_found(call_id: Uuid) -> IntakeError {
    IntakeError::Database(DatabaseError::NotFound {
        entity: "call".into(),
        id: call_id.to_string(),
    })
}

/// Strip formatting from a caller number and validate the result.
fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    PHONE_PATTERN.is_match(&cleaned).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifyClient;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::model::{Guest, Hotel, Intent, Sentiment};
    use crate::store::{LibSqlBackend, TaskFilter};
    use async_trait::async_trait;
    use std::time::Duration;

    const ROUTING: &str = "+15550001000";

    struct MockLlm {
        response: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.response {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 40,
                    output_tokens: 40,
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "unreachable".into(),
                }),
            }
        }
    }

    struct Fixture {
        db: Arc<dyn Database>,
        hotel_id: Uuid,
        guest_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let hotel = Hotel {
            id: Uuid::new_v4(),
            name: "Harbor View".into(),
            routing_number: Some(ROUTING.into()),
        };
        db.insert_hotel(&hotel).await.unwrap();
        let guest = Guest {
            id: Uuid::new_v4(),
            hotel_id: hotel.id,
            first_name: "Omar".into(),
            last_name: None,
            phone: Some("+15559990000".into()),
            email: None,
        };
        db.insert_guest(&guest).await.unwrap();
        Fixture {
            db,
            hotel_id: hotel.id,
            guest_id: guest.id,
        }
    }

    fn intake(fixture: &Fixture, response: Option<&str>) -> CallIntake {
        let llm: Arc<dyn LlmProvider> = Arc::new(MockLlm {
            response: response.map(String::from),
        });
        let classifier = Arc::new(ClassifyClient::new(llm, Duration::from_secs(5)));
        CallIntake::new(Arc::clone(&fixture.db), classifier)
    }

    #[tokio::test]
    async fn unknown_routing_number_is_rejected() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let result = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: "+19998887777".into(),
            })
            .await;
        assert!(matches!(result, Err(IntakeError::TenantResolution(_))));
    }

    #[tokio::test]
    async fn known_caller_links_guest() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+1 (555) 999-0000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        assert_eq!(call.hotel_id, fixture.hotel_id);
        assert_eq!(call.guest_id, Some(fixture.guest_id));
        assert_eq!(call.phone_number, "+15559990000");
        assert_eq!(call.status, CallStatus::InProgress);
    }

    #[tokio::test]
    async fn unknown_caller_proceeds_without_guest() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15551231234".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();
        assert!(call.guest_id.is_none());
    }

    #[tokio::test]
    async fn garbage_caller_number_is_rejected() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let result = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "anonymous".into(),
                dialed: ROUTING.into(),
            })
            .await;
        assert!(matches!(result, Err(IntakeError::Validation(_))));
    }

    #[tokio::test]
    async fn transcript_analysis_is_stored_on_the_call() {
        let fixture = fixture().await;
        let intake = intake(
            &fixture,
            Some(
                r#"{"intent": "complaint", "sentiment": "negative", "urgency": 9,
                    "summary": "No hot water", "actions": ["send maintenance"]}"#,
            ),
        );

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        let updated = intake
            .attach_transcript(fixture.hotel_id, call.id, "there is no hot water in 204")
            .await
            .unwrap();

        assert_eq!(updated.transcript.as_deref(), Some("there is no hot water in 204"));
        assert_eq!(updated.intent, Some(Intent::Complaint));
        assert_eq!(updated.sentiment, Some(Sentiment::Negative));
        assert_eq!(updated.urgency, Some(9));
        assert_eq!(updated.summary.as_deref(), Some("No hot water"));
    }

    #[tokio::test]
    async fn calls_never_escalate_to_tasks() {
        // Urgency 9 on a call stores the analysis but opens no task.
        let fixture = fixture().await;
        let intake = intake(
            &fixture,
            Some(r#"{"intent": "complaint", "sentiment": "negative", "urgency": 9, "summary": "x"}"#),
        );

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();
        intake
            .attach_transcript(fixture.hotel_id, call.id, "this is an emergency")
            .await
            .unwrap();

        let tasks = fixture
            .db
            .list_tasks(fixture.hotel_id, &TaskFilter::default())
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn classification_failure_leaves_analysis_null() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        let updated = intake
            .attach_transcript(fixture.hotel_id, call.id, "hello, about my reservation")
            .await
            .unwrap();

        assert_eq!(
            updated.transcript.as_deref(),
            Some("hello, about my reservation")
        );
        assert!(updated.intent.is_none());
        assert!(updated.sentiment.is_none());
        assert!(updated.urgency.is_none());
    }

    #[tokio::test]
    async fn reclassification_with_fixed_classifier_is_idempotent() {
        let fixture = fixture().await;
        let raw = r#"{"intent": "request", "sentiment": "neutral", "urgency": 5, "summary": "Late checkout"}"#;
        let intake = intake(&fixture, Some(raw));

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        let transcript = "could I get a late checkout tomorrow";
        let first = intake
            .attach_transcript(fixture.hotel_id, call.id, transcript)
            .await
            .unwrap();
        let second = intake
            .attach_transcript(fixture.hotel_id, call.id, transcript)
            .await
            .unwrap();

        assert_eq!(first.intent, second.intent);
        assert_eq!(first.sentiment, second.sentiment);
        assert_eq!(first.urgency, second.urgency);
        assert_eq!(first.summary, second.summary);
    }

    #[tokio::test]
    async fn transcript_for_foreign_tenant_call_id_is_not_found() {
        let fixture = fixture().await;
        let intake = intake(&fixture, Some(r#"{"urgency": 1}"#));

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        // Same call id under a different tenant: invisible, untouched.
        let other_hotel = Uuid::new_v4();
        let result = intake
            .attach_transcript(other_hotel, call.id, "should not land")
            .await;
        assert!(matches!(
            result,
            Err(IntakeError::Database(DatabaseError::NotFound { .. }))
        ));

        let untouched = fixture
            .db
            .get_call(fixture.hotel_id, call.id)
            .await
            .unwrap()
            .unwrap();
        assert!(untouched.transcript.is_none());
    }

    #[tokio::test]
    async fn completion_uses_provider_timestamps_for_duration() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        let started = Utc::now() - chrono::Duration::seconds(230);
        let ended = started + chrono::Duration::seconds(185);
        let completed = intake
            .complete_call(
                fixture.hotel_id,
                call.id,
                CallCompletion {
                    status: CallStatus::Completed,
                    started_at: started,
                    ended_at: ended,
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.status, CallStatus::Completed);
        assert_eq!(completed.duration_secs, Some(185));
        assert!(completed.ended_at.is_some());
    }

    #[tokio::test]
    async fn completion_rejects_non_terminal_status() {
        let fixture = fixture().await;
        let intake = intake(&fixture, None);

        let call = intake
            .handle_inbound_call(TelephonyWebhook {
                caller: "+15559990000".into(),
                dialed: ROUTING.into(),
            })
            .await
            .unwrap();

        let result = intake
            .complete_call(
                fixture.hotel_id,
                call.id,
                CallCompletion {
                    status: CallStatus::InProgress,
                    started_at: Utc::now(),
                    ended_at: Utc::now(),
                },
            )
            .await;
        assert!(matches!(result, Err(IntakeError::Validation(_))));
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(
            normalize_phone("+1 (555) 123-4567").as_deref(),
            Some("+15551234567")
        );
        assert_eq!(normalize_phone("5551234").as_deref(), Some("5551234"));
        assert!(normalize_phone("anonymous").is_none());
        assert!(normalize_phone("12").is_none());
        assert!(normalize_phone("").is_none());
    }
}
