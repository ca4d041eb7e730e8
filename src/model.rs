//! Domain model — communications, calls, follow-up tasks, and the closed
//! enums they hang off.
//!
//! Records are created by the intake pipelines and read back through the
//! `Database` trait. Every record carries its owning `hotel_id`; nothing in
//! this module (or below it) links records across tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Channels & direction ────────────────────────────────────────────

/// Communication channel a message travels on. Calls are always `Voice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
    Email,
    WebChat,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::WebChat => "web_chat",
            Self::Voice => "voice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sms" => Some(Self::Sms),
            "whatsapp" => Some(Self::Whatsapp),
            "email" => Some(Self::Email),
            "web_chat" => Some(Self::WebChat),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

// ── Classification vocabulary ───────────────────────────────────────

/// Guest sentiment as reported by the classifier.
///
/// Anything the classifier returns outside this set coerces to `Neutral`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Coercing parse: unrecognized values become `Neutral`.
    pub fn coerce(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Classified guest intent.
///
/// The classifier reports a free-form string; known values parse into a
/// closed variant and everything else is carried verbatim in `Other`, so
/// the category mapping stays an exhaustive match while task titles keep
/// the classifier's wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    Request,
    Complaint,
    Maintenance,
    Housekeeping,
    Concierge,
    Booking,
    Cancellation,
    Modification,
    Information,
    Other(String),
}

impl Intent {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "request" => Self::Request,
            "complaint" => Self::Complaint,
            "maintenance" => Self::Maintenance,
            "housekeeping" => Self::Housekeeping,
            "concierge" => Self::Concierge,
            "booking" => Self::Booking,
            "cancellation" => Self::Cancellation,
            "modification" => Self::Modification,
            "information" => Self::Information,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Request => "request",
            Self::Complaint => "complaint",
            Self::Maintenance => "maintenance",
            Self::Housekeeping => "housekeeping",
            Self::Concierge => "concierge",
            Self::Booking => "booking",
            Self::Cancellation => "cancellation",
            Self::Modification => "modification",
            Self::Information => "information",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Intent {
    fn from(s: String) -> Self {
        Intent::parse(&s)
    }
}

impl From<Intent> for String {
    fn from(i: Intent) -> Self {
        i.as_str().to_string()
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Delivery/lifecycle status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A guest-facing communication on a text channel, inbound or outbound.
///
/// Content is immutable after creation; only the classification fields
/// (`intent`, `sentiment`) and `status` are ever updated. Urgency is
/// deliberately not a message field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub channel: Channel,
    pub direction: Direction,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// True when the content was generated by the classifier, not a human.
    pub autonomous: bool,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageRecord {
    /// A received guest message. Stored as already delivered to us.
    pub fn inbound(hotel_id: Uuid, channel: Channel, content: impl Into<String>) -> Self {
        Self::new(hotel_id, channel, Direction::Inbound, content, MessageStatus::Delivered)
    }

    /// A staff-authored outbound message, pending delivery.
    pub fn outbound(hotel_id: Uuid, channel: Channel, content: impl Into<String>) -> Self {
        Self::new(hotel_id, channel, Direction::Outbound, content, MessageStatus::Sent)
    }

    /// An autonomous reply to `original`, inheriting its channel, tenant,
    /// guest, booking, and language.
    pub fn reply_to(original: &MessageRecord, content: impl Into<String>) -> Self {
        let mut reply = Self::outbound(original.hotel_id, original.channel, content);
        reply.guest_id = original.guest_id;
        reply.booking_id = original.booking_id;
        reply.language = original.language.clone();
        reply.autonomous = true;
        reply
    }

    fn new(
        hotel_id: Uuid,
        channel: Channel,
        direction: Direction,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hotel_id,
            channel,
            direction,
            content: content.into(),
            guest_id: None,
            booking_id: None,
            language: None,
            intent: None,
            sentiment: None,
            autonomous: false,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_guest(mut self, guest_id: Uuid) -> Self {
        self.guest_id = Some(guest_id);
        self
    }

    pub fn with_booking(mut self, booking_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// ── Calls ───────────────────────────────────────────────────────────

/// Call lifecycle status. Terminal values come from the telephony provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    InProgress,
    Completed,
    Failed,
    NoAnswer,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NoAnswer => "no_answer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "no_answer" => Some(Self::NoAnswer),
            _ => None,
        }
    }

    /// True for provider-reported end states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A voice call. The transcript and its analysis arrive asynchronously,
/// possibly in a later webhook than the one that created the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub phone_number: String,
    pub direction: Direction,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// 0–10, clamped before storage. Unlike messages, calls keep it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallRecord {
    /// A newly-received inbound call, still in progress.
    pub fn inbound(hotel_id: Uuid, phone_number: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hotel_id,
            phone_number: phone_number.into(),
            direction: Direction::Inbound,
            status: CallStatus::InProgress,
            guest_id: None,
            booking_id: None,
            transcript: None,
            summary: None,
            intent: None,
            sentiment: None,
            urgency: None,
            duration_secs: None,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn with_guest(mut self, guest_id: Uuid) -> Self {
        self.guest_id = Some(guest_id);
        self
    }
}

// ── Follow-up tasks ─────────────────────────────────────────────────

/// Staff department/category a task falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    GuestRequest,
    FrontDesk,
    Maintenance,
    Housekeeping,
    Concierge,
    WakeUpCall,
    AmenityDelivery,
    RoomService,
    Other,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuestRequest => "guest_request",
            Self::FrontDesk => "front_desk",
            Self::Maintenance => "maintenance",
            Self::Housekeeping => "housekeeping",
            Self::Concierge => "concierge",
            Self::WakeUpCall => "wake_up_call",
            Self::AmenityDelivery => "amenity_delivery",
            Self::RoomService => "room_service",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest_request" => Some(Self::GuestRequest),
            "front_desk" => Some(Self::FrontDesk),
            "maintenance" => Some(Self::Maintenance),
            "housekeeping" => Some(Self::Housekeeping),
            "concierge" => Some(Self::Concierge),
            "wake_up_call" => Some(Self::WakeUpCall),
            "amenity_delivery" => Some(Self::AmenityDelivery),
            "room_service" => Some(Self::RoomService),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Task priority. Ordered so sorting puts urgent work first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Overdue,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    /// True while the task still needs staff attention.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Overdue)
    }
}

/// A staff follow-up task, created by escalation or by a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpTask {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_minutes: Option<u32>,
    /// Provenance link to the originating communication, e.g.
    /// `{"source":"message","message_id":"…","channel":"sms"}`.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FollowUpTask {
    pub fn new(
        hotel_id: Uuid,
        title: impl Into<String>,
        category: TaskCategory,
        priority: TaskPriority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hotel_id,
            title: title.into(),
            description: String::new(),
            category,
            priority,
            status: TaskStatus::Pending,
            guest_id: None,
            booking_id: None,
            assigned_to: None,
            due_at: None,
            sla_minutes: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_guest(mut self, guest_id: Uuid) -> Self {
        self.guest_id = Some(guest_id);
        self
    }

    pub fn with_booking(mut self, booking_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>, sla_minutes: u32) -> Self {
        self.due_at = Some(due_at);
        self.sla_minutes = Some(sla_minutes);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the SLA window has elapsed on an unresolved task.
    ///
    /// The window opens `sla_minutes` before `due_at`, so staff see the
    /// task flip to overdue with enough lead time to still act on it.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_open() {
            return false;
        }
        let Some(due_at) = self.due_at else {
            return false;
        };
        let window = chrono::Duration::minutes(i64::from(self.sla_minutes.unwrap_or(0)));
        now > due_at - window
    }
}

// ── Reference entities ──────────────────────────────────────────────
//
// Read-only to the pipelines: the wider back-office owns their lifecycle.

/// A tenant property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    /// Telephony routing key (the number guests dial), if provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_number: Option<String>,
}

/// A guest profile, scoped to one hotel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A booking, linking a guest to a stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub guest_id: Uuid,
    pub confirmation_number: String,
}
