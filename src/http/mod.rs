//! HTTP surface — webhook ingress for the intake pipelines plus filtered
//! reads over the records they create.
//!
//! Handlers never bypass tenant scoping: the tenant id comes from the
//! path (or, for ingress, from the payload/routing key) and is passed
//! explicitly into every store call.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::{DatabaseError, IntakeError};
use crate::intake::{
    CallCompletion, CallIntake, IncomingMessage, MessageIntake, OutgoingMessage, TelephonyWebhook,
};
use crate::model::{
    CallStatus, Channel, Direction, TaskCategory, TaskPriority, TaskStatus,
};
use crate::store::{CallFilter, Database, MessageFilter, TaskFilter};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub messages: Arc<MessageIntake>,
    pub calls: Arc<CallIntake>,
}

/// Build the Axum router.
pub fn api_routes(
    db: Arc<dyn Database>,
    messages: Arc<MessageIntake>,
    calls: Arc<CallIntake>,
) -> Router {
    let state = AppState {
        db,
        messages,
        calls,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/messages/incoming", post(incoming_message))
        .route("/api/hotels/{hotel_id}/messages", post(send_message))
        .route("/api/hotels/{hotel_id}/messages", get(list_messages))
        .route("/api/calls/webhook", post(call_webhook))
        .route(
            "/api/hotels/{hotel_id}/calls/{call_id}/transcript",
            post(attach_transcript),
        )
        .route(
            "/api/hotels/{hotel_id}/calls/{call_id}/complete",
            post(complete_call),
        )
        .route("/api/hotels/{hotel_id}/calls", get(list_calls))
        .route("/api/hotels/{hotel_id}/tasks", get(list_tasks))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Error mapping ───────────────────────────────────────────────────

/// Handler-level error with its HTTP status.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        let status = match &e {
            IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
            IntakeError::TenantResolution(_) => StatusCode::NOT_FOUND,
            IntakeError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            IntakeError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        let status = match &e {
            DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "guest-assist"
    }))
}

// ── Message handlers ────────────────────────────────────────────────

async fn incoming_message(
    State(state): State<AppState>,
    Json(input): Json<IncomingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.messages.handle_incoming(input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn send_message(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    Json(input): Json<OutgoingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.messages.send_message(hotel_id, input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    channel: Option<Channel>,
    direction: Option<Direction>,
    guest_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_messages(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MessageFilter {
        channel: query.channel,
        direction: query.direction,
        guest_id: query.guest_id,
        booking_id: query.booking_id,
        since: query.since,
        until: query.until,
        limit: query.limit,
        offset: query.offset,
    };
    let messages = state.db.list_messages(hotel_id, &filter).await?;
    Ok(Json(messages))
}

// ── Call handlers ───────────────────────────────────────────────────

async fn call_webhook(
    State(state): State<AppState>,
    Json(webhook): Json<TelephonyWebhook>,
) -> Result<impl IntoResponse, ApiError> {
    let call = state.calls.handle_inbound_call(webhook).await?;
    Ok((StatusCode::CREATED, Json(call)))
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    transcript: String,
}

async fn attach_transcript(
    State(state): State<AppState>,
    Path((hotel_id, call_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<TranscriptPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let call = state
        .calls
        .attach_transcript(hotel_id, call_id, &payload.transcript)
        .await?;
    Ok(Json(call))
}

async fn complete_call(
    State(state): State<AppState>,
    Path((hotel_id, call_id)): Path<(Uuid, Uuid)>,
    Json(completion): Json<CallCompletion>,
) -> Result<impl IntoResponse, ApiError> {
    let call = state
        .calls
        .complete_call(hotel_id, call_id, completion)
        .await?;
    Ok(Json(call))
}

#[derive(Debug, Deserialize)]
struct CallQuery {
    status: Option<CallStatus>,
    direction: Option<Direction>,
    guest_id: Option<Uuid>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_calls(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<CallQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CallFilter {
        status: query.status,
        direction: query.direction,
        guest_id: query.guest_id,
        since: query.since,
        until: query.until,
        limit: query.limit,
        offset: query.offset,
    };
    let calls = state.db.list_calls(hotel_id, &filter).await?;
    Ok(Json(calls))
}

// ── Task handlers ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TaskQuery {
    status: Option<TaskStatus>,
    category: Option<TaskCategory>,
    priority: Option<TaskPriority>,
    assigned_to: Option<Uuid>,
    guest_id: Option<Uuid>,
    #[serde(default)]
    overdue: bool,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(hotel_id): Path<Uuid>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = TaskFilter {
        status: query.status,
        category: query.category,
        priority: query.priority,
        assigned_to: query.assigned_to,
        guest_id: query.guest_id,
        overdue: query.overdue,
        limit: query.limit,
        offset: query.offset,
    };
    let tasks = state.db.list_tasks(hotel_id, &filter).await?;
    Ok(Json(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::classify::ClassifyClient;
    use crate::delivery::DeliveryRouter;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use std::time::Duration;

    struct MockLlm;

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: r#"{"reply": "Happy to help!", "intent": "information", "urgency": 1}"#
                    .into(),
                input_tokens: 10,
                output_tokens: 10,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    async fn router() -> Router {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let classifier = Arc::new(ClassifyClient::new(Arc::new(MockLlm), Duration::from_secs(5)));
        let delivery = Arc::new(DeliveryRouter::new(Arc::clone(&db)));
        let messages = Arc::new(MessageIntake::new(
            Arc::clone(&db),
            Arc::clone(&classifier),
            delivery,
        ));
        let calls = Arc::new(CallIntake::new(Arc::clone(&db), classifier));
        api_routes(db, messages, calls)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = router()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_content_maps_to_bad_request() {
        let body = serde_json::json!({
            "hotel_id": Uuid::new_v4(),
            "channel": "sms",
            "content": "",
        });
        let response = router()
            .await
            .oneshot(
                Request::post("/api/messages/incoming")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_routing_key_maps_to_not_found() {
        let body = serde_json::json!({
            "caller": "+15551234567",
            "dialed": "+10000000000",
        });
        let response = router()
            .await
            .oneshot(
                Request::post("/api/calls/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transcript_for_unknown_call_maps_to_not_found() {
        let hotel_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();
        let response = router()
            .await
            .oneshot(
                Request::post(format!(
                    "/api/hotels/{hotel_id}/calls/{call_id}/transcript"
                ))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({"transcript": "hello"}).to_string(),
                ))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
