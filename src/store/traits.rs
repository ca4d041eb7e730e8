//! Unified `Database` trait — single async interface for all persistence.
//!
//! Every read and write is scoped by `hotel_id`; callers always pass the
//! tenant explicitly and the backend bakes it into the WHERE clause, so a
//! colliding record id from another tenant can never be read or touched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    Booking, CallRecord, CallStatus, Channel, Direction, FollowUpTask, Guest, Hotel, Intent,
    MessageRecord, MessageStatus, Sentiment, TaskCategory, TaskPriority, TaskStatus,
};

/// Default page size for list queries.
pub const DEFAULT_LIMIT: usize = 50;

/// Hard cap on page size.
pub const MAX_LIMIT: usize = 500;

/// Resolve requested pagination into effective (limit, offset).
pub fn page(limit: Option<usize>, offset: Option<usize>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as i64;
    let offset = offset.unwrap_or(0) as i64;
    (limit, offset)
}

// ── Filters ─────────────────────────────────────────────────────────
//
// One optional field per supported predicate; anything unset is not part
// of the query. Pagination defaults are applied by `page()`.

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub channel: Option<Channel>,
    pub direction: Option<Direction>,
    pub guest_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    pub status: Option<CallStatus>,
    pub direction: Option<Direction>,
    pub guest_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub guest_id: Option<Uuid>,
    /// Only unresolved tasks whose due time has passed.
    pub overdue: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ── Trait ───────────────────────────────────────────────────────────

/// Backend-agnostic persistence covering communications, calls, tasks,
/// and the reference entities the pipelines read for context.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Reference data ──────────────────────────────────────────────

    async fn insert_hotel(&self, hotel: &Hotel) -> Result<(), DatabaseError>;

    async fn get_hotel(&self, id: Uuid) -> Result<Option<Hotel>, DatabaseError>;

    /// Resolve a tenant from its telephony routing key (the dialed number).
    async fn find_hotel_by_routing_number(
        &self,
        routing_number: &str,
    ) -> Result<Option<Hotel>, DatabaseError>;

    async fn insert_guest(&self, guest: &Guest) -> Result<(), DatabaseError>;

    async fn get_guest(&self, hotel_id: Uuid, id: Uuid) -> Result<Option<Guest>, DatabaseError>;

    /// Match a caller's number to a guest under the given tenant.
    async fn find_guest_by_phone(
        &self,
        hotel_id: Uuid,
        phone: &str,
    ) -> Result<Option<Guest>, DatabaseError>;

    async fn insert_booking(&self, booking: &Booking) -> Result<(), DatabaseError>;

    async fn get_booking(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Booking>, DatabaseError>;

    // ── Messages ────────────────────────────────────────────────────

    async fn insert_message(&self, message: &MessageRecord) -> Result<(), DatabaseError>;

    async fn get_message(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MessageRecord>, DatabaseError>;

    /// Attach classification results to an inbound message. Only intent
    /// and sentiment are stored on the message record.
    async fn update_message_analysis(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        intent: Option<&Intent>,
        sentiment: Sentiment,
    ) -> Result<(), DatabaseError>;

    async fn update_message_status(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<(), DatabaseError>;

    async fn list_messages(
        &self,
        hotel_id: Uuid,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageRecord>, DatabaseError>;

    // ── Calls ───────────────────────────────────────────────────────

    async fn insert_call(&self, call: &CallRecord) -> Result<(), DatabaseError>;

    async fn get_call(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CallRecord>, DatabaseError>;

    /// Store a transcript on an existing call.
    async fn update_call_transcript(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        transcript: &str,
    ) -> Result<(), DatabaseError>;

    /// Store transcript analysis on an existing call. Calls, unlike
    /// messages, keep urgency.
    async fn update_call_analysis(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        intent: Option<&Intent>,
        sentiment: Sentiment,
        urgency: u8,
        summary: &str,
    ) -> Result<(), DatabaseError>;

    /// Write a provider-reported terminal status and duration.
    async fn complete_call(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: CallStatus,
        ended_at: DateTime<Utc>,
        duration_secs: i64,
    ) -> Result<(), DatabaseError>;

    async fn list_calls(
        &self,
        hotel_id: Uuid,
        filter: &CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &FollowUpTask) -> Result<(), DatabaseError>;

    async fn get_task(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FollowUpTask>, DatabaseError>;

    async fn update_task_status(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<(), DatabaseError>;

    async fn list_tasks(
        &self,
        hotel_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<FollowUpTask>, DatabaseError>;

    /// All unresolved tasks that carry a due time, across tenants.
    /// Used by the overdue sweep.
    async fn list_open_due_tasks(&self) -> Result<Vec<FollowUpTask>, DatabaseError>;
}
