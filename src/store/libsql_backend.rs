//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. All timestamps are stored
//! as RFC 3339 text; enums as their snake_case strings.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    Booking, CallRecord, CallStatus, Channel, Direction, FollowUpTask, Guest, Hotel, Intent,
    MessageRecord, MessageStatus, Sentiment, TaskCategory, TaskPriority, TaskStatus,
};
use crate::store::migrations;
use crate::store::traits::{CallFilter, Database, MessageFilter, TaskFilter, page};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_optional_uuid(s: &Option<String>) -> Option<Uuid> {
    s.as_ref().map(|s| parse_uuid(s))
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert an optional Uuid to a libsql Value.
fn opt_uuid(id: Option<Uuid>) -> libsql::Value {
    match id {
        Some(id) => libsql::Value::Text(id.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert an optional integer to a libsql Value.
fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

// ── Row mappers ─────────────────────────────────────────────────────

const MESSAGE_COLUMNS: &str = "id, hotel_id, channel, direction, content, guest_id, booking_id, \
     language, intent, sentiment, autonomous, status, created_at, updated_at";

fn row_to_message(row: &libsql::Row) -> Result<MessageRecord, libsql::Error> {
    let id: String = row.get(0)?;
    let hotel_id: String = row.get(1)?;
    let channel: String = row.get(2)?;
    let direction: String = row.get(3)?;
    let guest_id: Option<String> = row.get(5).ok();
    let booking_id: Option<String> = row.get(6).ok();
    let intent: Option<String> = row.get(8).ok();
    let sentiment: Option<String> = row.get(9).ok();
    let autonomous: i64 = row.get(10)?;
    let status: String = row.get(11)?;
    let created_str: String = row.get(12)?;
    let updated_str: String = row.get(13)?;

    Ok(MessageRecord {
        id: parse_uuid(&id),
        hotel_id: parse_uuid(&hotel_id),
        channel: Channel::parse(&channel).unwrap_or(Channel::WebChat),
        direction: Direction::parse(&direction).unwrap_or(Direction::Inbound),
        content: row.get(4)?,
        guest_id: parse_optional_uuid(&guest_id),
        booking_id: parse_optional_uuid(&booking_id),
        language: row.get(7).ok(),
        intent: intent.map(|s| Intent::parse(&s)),
        sentiment: sentiment.map(|s| Sentiment::coerce(&s)),
        autonomous: autonomous != 0,
        status: MessageStatus::parse(&status).unwrap_or(MessageStatus::Sent),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const CALL_COLUMNS: &str = "id, hotel_id, phone_number, direction, status, guest_id, booking_id, \
     transcript, summary, intent, sentiment, urgency, duration_secs, created_at, ended_at";

fn row_to_call(row: &libsql::Row) -> Result<CallRecord, libsql::Error> {
    let id: String = row.get(0)?;
    let hotel_id: String = row.get(1)?;
    let direction: String = row.get(3)?;
    let status: String = row.get(4)?;
    let guest_id: Option<String> = row.get(5).ok();
    let booking_id: Option<String> = row.get(6).ok();
    let intent: Option<String> = row.get(9).ok();
    let sentiment: Option<String> = row.get(10).ok();
    let urgency: Option<i64> = row.get(11).ok();
    let created_str: String = row.get(13)?;
    let ended_str: Option<String> = row.get(14).ok();

    Ok(CallRecord {
        id: parse_uuid(&id),
        hotel_id: parse_uuid(&hotel_id),
        phone_number: row.get(2)?,
        direction: Direction::parse(&direction).unwrap_or(Direction::Inbound),
        status: CallStatus::parse(&status).unwrap_or(CallStatus::InProgress),
        guest_id: parse_optional_uuid(&guest_id),
        booking_id: parse_optional_uuid(&booking_id),
        transcript: row.get(7).ok(),
        summary: row.get(8).ok(),
        intent: intent.map(|s| Intent::parse(&s)),
        sentiment: sentiment.map(|s| Sentiment::coerce(&s)),
        urgency: urgency.map(|u| u.clamp(0, 10) as u8),
        duration_secs: row.get(12).ok(),
        created_at: parse_datetime(&created_str),
        ended_at: parse_optional_datetime(&ended_str),
    })
}

const TASK_COLUMNS: &str = "id, hotel_id, title, description, category, priority, status, \
     guest_id, booking_id, assigned_to, due_at, sla_minutes, metadata, created_at, updated_at, \
     completed_at";

fn row_to_task(row: &libsql::Row) -> Result<FollowUpTask, libsql::Error> {
    let id: String = row.get(0)?;
    let hotel_id: String = row.get(1)?;
    let category: String = row.get(4)?;
    let priority: String = row.get(5)?;
    let status: String = row.get(6)?;
    let guest_id: Option<String> = row.get(7).ok();
    let booking_id: Option<String> = row.get(8).ok();
    let assigned_to: Option<String> = row.get(9).ok();
    let due_str: Option<String> = row.get(10).ok();
    let sla: Option<i64> = row.get(11).ok();
    let metadata: String = row.get(12)?;
    let created_str: String = row.get(13)?;
    let updated_str: String = row.get(14)?;
    let completed_str: Option<String> = row.get(15).ok();

    Ok(FollowUpTask {
        id: parse_uuid(&id),
        hotel_id: parse_uuid(&hotel_id),
        title: row.get(2)?,
        description: row.get(3)?,
        category: TaskCategory::parse(&category).unwrap_or(TaskCategory::Other),
        priority: TaskPriority::parse(&priority).unwrap_or(TaskPriority::Medium),
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Pending),
        guest_id: parse_optional_uuid(&guest_id),
        booking_id: parse_optional_uuid(&booking_id),
        assigned_to: parse_optional_uuid(&assigned_to),
        due_at: parse_optional_datetime(&due_str),
        sla_minutes: sla.map(|s| s.max(0) as u32),
        metadata: serde_json::from_str(&metadata).unwrap_or_else(|_| serde_json::json!({})),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
        completed_at: parse_optional_datetime(&completed_str),
    })
}

fn row_to_hotel(row: &libsql::Row) -> Result<Hotel, libsql::Error> {
    let id: String = row.get(0)?;
    Ok(Hotel {
        id: parse_uuid(&id),
        name: row.get(1)?,
        routing_number: row.get(2).ok(),
    })
}

fn row_to_guest(row: &libsql::Row) -> Result<Guest, libsql::Error> {
    let id: String = row.get(0)?;
    let hotel_id: String = row.get(1)?;
    Ok(Guest {
        id: parse_uuid(&id),
        hotel_id: parse_uuid(&hotel_id),
        first_name: row.get(2)?,
        last_name: row.get(3).ok(),
        phone: row.get(4).ok(),
        email: row.get(5).ok(),
    })
}

fn row_to_booking(row: &libsql::Row) -> Result<Booking, libsql::Error> {
    let id: String = row.get(0)?;
    let hotel_id: String = row.get(1)?;
    let guest_id: String = row.get(2)?;
    Ok(Booking {
        id: parse_uuid(&id),
        hotel_id: parse_uuid(&hotel_id),
        guest_id: parse_uuid(&guest_id),
        confirmation_number: row.get(3)?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Reference data ──────────────────────────────────────────────

    async fn insert_hotel(&self, hotel: &Hotel) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO hotels (id, name, routing_number) VALUES (?1, ?2, ?3)",
                params![
                    hotel.id.to_string(),
                    hotel.name.clone(),
                    opt_text(hotel.routing_number.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_hotel: {e}")))?;
        Ok(())
    }

    async fn get_hotel(&self, id: Uuid) -> Result<Option<Hotel>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, routing_number FROM hotels WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_hotel: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_hotel(&row).map_err(|e| {
                DatabaseError::Query(format!("get_hotel row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_hotel: {e}"))),
        }
    }

    async fn find_hotel_by_routing_number(
        &self,
        routing_number: &str,
    ) -> Result<Option<Hotel>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, routing_number FROM hotels WHERE routing_number = ?1",
                params![routing_number],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_hotel_by_routing_number: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_hotel(&row).map_err(|e| {
                DatabaseError::Query(format!("find_hotel_by_routing_number row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!(
                "find_hotel_by_routing_number: {e}"
            ))),
        }
    }

    async fn insert_guest(&self, guest: &Guest) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO guests (id, hotel_id, first_name, last_name, phone, email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    guest.id.to_string(),
                    guest.hotel_id.to_string(),
                    guest.first_name.clone(),
                    opt_text(guest.last_name.as_deref()),
                    opt_text(guest.phone.as_deref()),
                    opt_text(guest.email.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_guest: {e}")))?;
        Ok(())
    }

    async fn get_guest(&self, hotel_id: Uuid, id: Uuid) -> Result<Option<Guest>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, hotel_id, first_name, last_name, phone, email
                 FROM guests WHERE id = ?1 AND hotel_id = ?2",
                params![id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_guest: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_guest(&row).map_err(|e| {
                DatabaseError::Query(format!("get_guest row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_guest: {e}"))),
        }
    }

    async fn find_guest_by_phone(
        &self,
        hotel_id: Uuid,
        phone: &str,
    ) -> Result<Option<Guest>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, hotel_id, first_name, last_name, phone, email
                 FROM guests WHERE hotel_id = ?1 AND phone = ?2",
                params![hotel_id.to_string(), phone],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_guest_by_phone: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_guest(&row).map_err(|e| {
                DatabaseError::Query(format!("find_guest_by_phone row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_guest_by_phone: {e}"))),
        }
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO bookings (id, hotel_id, guest_id, confirmation_number)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    booking.id.to_string(),
                    booking.hotel_id.to_string(),
                    booking.guest_id.to_string(),
                    booking.confirmation_number.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_booking: {e}")))?;
        Ok(())
    }

    async fn get_booking(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, hotel_id, guest_id, confirmation_number
                 FROM bookings WHERE id = ?1 AND hotel_id = ?2",
                params![id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_booking: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_booking(&row).map_err(|e| {
                DatabaseError::Query(format!("get_booking row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_booking: {e}"))),
        }
    }

    // ── Messages ────────────────────────────────────────────────────

    async fn insert_message(&self, message: &MessageRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO messages (id, hotel_id, channel, direction, content, guest_id,
                     booking_id, language, intent, sentiment, autonomous, status,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    message.id.to_string(),
                    message.hotel_id.to_string(),
                    message.channel.as_str(),
                    message.direction.as_str(),
                    message.content.clone(),
                    opt_uuid(message.guest_id),
                    opt_uuid(message.booking_id),
                    opt_text(message.language.as_deref()),
                    opt_text(message.intent.as_ref().map(|i| i.as_str())),
                    opt_text(message.sentiment.map(|s| s.as_str())),
                    message.autonomous as i64,
                    message.status.as_str(),
                    message.created_at.to_rfc3339(),
                    message.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_message: {e}")))?;
        debug!(message_id = %message.id, hotel_id = %message.hotel_id, "Message inserted");
        Ok(())
    }

    async fn get_message(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<MessageRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND hotel_id = ?2"),
                params![id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_message(&row).map_err(|e| {
                DatabaseError::Query(format!("get_message row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message: {e}"))),
        }
    }

    async fn update_message_analysis(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        intent: Option<&Intent>,
        sentiment: Sentiment,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE messages SET intent = ?1, sentiment = ?2, updated_at = ?3
                 WHERE id = ?4 AND hotel_id = ?5",
                params![
                    opt_text(intent.map(|i| i.as_str())),
                    sentiment.as_str(),
                    now,
                    id.to_string(),
                    hotel_id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_message_analysis: {e}")))?;
        debug!(message_id = %id, "Message analysis updated");
        Ok(())
    }

    async fn update_message_status(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3 AND hotel_id = ?4",
                params![status.as_str(), now, id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_message_status: {e}")))?;
        Ok(())
    }

    async fn list_messages(
        &self,
        hotel_id: Uuid,
        filter: &MessageFilter,
    ) -> Result<Vec<MessageRecord>, DatabaseError> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let mut sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE hotel_id = ?1");
        let mut values: Vec<libsql::Value> =
            vec![libsql::Value::Text(hotel_id.to_string())];

        if let Some(channel) = filter.channel {
            values.push(libsql::Value::Text(channel.as_str().to_string()));
            sql.push_str(&format!(" AND channel = ?{}", values.len()));
        }
        if let Some(direction) = filter.direction {
            values.push(libsql::Value::Text(direction.as_str().to_string()));
            sql.push_str(&format!(" AND direction = ?{}", values.len()));
        }
        if let Some(guest_id) = filter.guest_id {
            values.push(libsql::Value::Text(guest_id.to_string()));
            sql.push_str(&format!(" AND guest_id = ?{}", values.len()));
        }
        if let Some(booking_id) = filter.booking_id {
            values.push(libsql::Value::Text(booking_id.to_string()));
            sql.push_str(&format!(" AND booking_id = ?{}", values.len()));
        }
        if let Some(since) = filter.since {
            values.push(libsql::Value::Text(since.to_rfc3339()));
            sql.push_str(&format!(" AND created_at >= ?{}", values.len()));
        }
        if let Some(until) = filter.until {
            values.push(libsql::Value::Text(until.to_rfc3339()));
            sql.push_str(&format!(" AND created_at <= ?{}", values.len()));
        }

        values.push(libsql::Value::Integer(limit));
        values.push(libsql::Value::Integer(offset));
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));

        let mut rows = self
            .conn()
            .query(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(row_to_message(&row).map_err(|e| {
                DatabaseError::Query(format!("list_messages row parse: {e}"))
            })?);
        }
        Ok(messages)
    }

    // ── Calls ───────────────────────────────────────────────────────

    async fn insert_call(&self, call: &CallRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO calls (id, hotel_id, phone_number, direction, status, guest_id,
                     booking_id, transcript, summary, intent, sentiment, urgency,
                     duration_secs, created_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    call.id.to_string(),
                    call.hotel_id.to_string(),
                    call.phone_number.clone(),
                    call.direction.as_str(),
                    call.status.as_str(),
                    opt_uuid(call.guest_id),
                    opt_uuid(call.booking_id),
                    opt_text(call.transcript.as_deref()),
                    opt_text(call.summary.as_deref()),
                    opt_text(call.intent.as_ref().map(|i| i.as_str())),
                    opt_text(call.sentiment.map(|s| s.as_str())),
                    opt_int(call.urgency.map(i64::from)),
                    opt_int(call.duration_secs),
                    call.created_at.to_rfc3339(),
                    opt_text(call.ended_at.map(|t| t.to_rfc3339()).as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_call: {e}")))?;
        debug!(call_id = %call.id, hotel_id = %call.hotel_id, "Call inserted");
        Ok(())
    }

    async fn get_call(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<CallRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?1 AND hotel_id = ?2"),
                params![id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_call: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_call(&row).map_err(|e| {
                DatabaseError::Query(format!("get_call row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_call: {e}"))),
        }
    }

    async fn update_call_transcript(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        transcript: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE calls SET transcript = ?1 WHERE id = ?2 AND hotel_id = ?3",
                params![transcript, id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_call_transcript: {e}")))?;
        Ok(())
    }

    async fn update_call_analysis(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        intent: Option<&Intent>,
        sentiment: Sentiment,
        urgency: u8,
        summary: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE calls SET intent = ?1, sentiment = ?2, urgency = ?3, summary = ?4
                 WHERE id = ?5 AND hotel_id = ?6",
                params![
                    opt_text(intent.map(|i| i.as_str())),
                    sentiment.as_str(),
                    i64::from(urgency),
                    summary,
                    id.to_string(),
                    hotel_id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_call_analysis: {e}")))?;
        debug!(call_id = %id, urgency, "Call analysis updated");
        Ok(())
    }

    async fn complete_call(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: CallStatus,
        ended_at: DateTime<Utc>,
        duration_secs: i64,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE calls SET status = ?1, ended_at = ?2, duration_secs = ?3
                 WHERE id = ?4 AND hotel_id = ?5",
                params![
                    status.as_str(),
                    ended_at.to_rfc3339(),
                    duration_secs,
                    id.to_string(),
                    hotel_id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_call: {e}")))?;
        debug!(call_id = %id, status = status.as_str(), "Call completed");
        Ok(())
    }

    async fn list_calls(
        &self,
        hotel_id: Uuid,
        filter: &CallFilter,
    ) -> Result<Vec<CallRecord>, DatabaseError> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let mut sql = format!("SELECT {CALL_COLUMNS} FROM calls WHERE hotel_id = ?1");
        let mut values: Vec<libsql::Value> =
            vec![libsql::Value::Text(hotel_id.to_string())];

        if let Some(status) = filter.status {
            values.push(libsql::Value::Text(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", values.len()));
        }
        if let Some(direction) = filter.direction {
            values.push(libsql::Value::Text(direction.as_str().to_string()));
            sql.push_str(&format!(" AND direction = ?{}", values.len()));
        }
        if let Some(guest_id) = filter.guest_id {
            values.push(libsql::Value::Text(guest_id.to_string()));
            sql.push_str(&format!(" AND guest_id = ?{}", values.len()));
        }
        if let Some(since) = filter.since {
            values.push(libsql::Value::Text(since.to_rfc3339()));
            sql.push_str(&format!(" AND created_at >= ?{}", values.len()));
        }
        if let Some(until) = filter.until {
            values.push(libsql::Value::Text(until.to_rfc3339()));
            sql.push_str(&format!(" AND created_at <= ?{}", values.len()));
        }

        values.push(libsql::Value::Integer(limit));
        values.push(libsql::Value::Integer(offset));
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));

        let mut rows = self
            .conn()
            .query(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("list_calls: {e}")))?;

        let mut calls = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            calls.push(
                row_to_call(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_calls row parse: {e}")))?,
            );
        }
        Ok(calls)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &FollowUpTask) -> Result<(), DatabaseError> {
        let metadata = serde_json::to_string(&task.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO tasks (id, hotel_id, title, description, category, priority,
                     status, guest_id, booking_id, assigned_to, due_at, sla_minutes,
                     metadata, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.id.to_string(),
                    task.hotel_id.to_string(),
                    task.title.clone(),
                    task.description.clone(),
                    task.category.as_str(),
                    task.priority.as_str(),
                    task.status.as_str(),
                    opt_uuid(task.guest_id),
                    opt_uuid(task.booking_id),
                    opt_uuid(task.assigned_to),
                    opt_text(task.due_at.map(|t| t.to_rfc3339()).as_deref()),
                    opt_int(task.sla_minutes.map(i64::from)),
                    metadata,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                    opt_text(task.completed_at.map(|t| t.to_rfc3339()).as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_task: {e}")))?;
        debug!(task_id = %task.id, hotel_id = %task.hotel_id, "Task inserted");
        Ok(())
    }

    async fn get_task(
        &self,
        hotel_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FollowUpTask>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND hotel_id = ?2"),
                params![id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_task(&row).map_err(|e| {
                DatabaseError::Query(format!("get_task row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_task: {e}"))),
        }
    }

    async fn update_task_status(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "UPDATE tasks SET status = ?1,
                     completed_at = CASE WHEN ?1 = 'completed' THEN ?2 ELSE NULL END,
                     updated_at = ?2
                 WHERE id = ?3 AND hotel_id = ?4",
                params![status.as_str(), now, id.to_string(), hotel_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_task_status: {e}")))?;
        debug!(task_id = %id, status = status.as_str(), "Task status updated");
        Ok(())
    }

    async fn list_tasks(
        &self,
        hotel_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<FollowUpTask>, DatabaseError> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE hotel_id = ?1");
        let mut values: Vec<libsql::Value> =
            vec![libsql::Value::Text(hotel_id.to_string())];

        if let Some(status) = filter.status {
            values.push(libsql::Value::Text(status.as_str().to_string()));
            sql.push_str(&format!(" AND status = ?{}", values.len()));
        }
        if let Some(category) = filter.category {
            values.push(libsql::Value::Text(category.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", values.len()));
        }
        if let Some(priority) = filter.priority {
            values.push(libsql::Value::Text(priority.as_str().to_string()));
            sql.push_str(&format!(" AND priority = ?{}", values.len()));
        }
        if let Some(assigned_to) = filter.assigned_to {
            values.push(libsql::Value::Text(assigned_to.to_string()));
            sql.push_str(&format!(" AND assigned_to = ?{}", values.len()));
        }
        if let Some(guest_id) = filter.guest_id {
            values.push(libsql::Value::Text(guest_id.to_string()));
            sql.push_str(&format!(" AND guest_id = ?{}", values.len()));
        }
        if filter.overdue {
            values.push(libsql::Value::Text(Utc::now().to_rfc3339()));
            sql.push_str(&format!(
                " AND status NOT IN ('completed', 'cancelled')
                  AND due_at IS NOT NULL AND due_at < ?{}",
                values.len()
            ));
        }

        values.push(libsql::Value::Integer(limit));
        values.push(libsql::Value::Integer(offset));
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));

        let mut rows = self
            .conn()
            .query(&sql, values)
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tasks.push(
                row_to_task(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_tasks row parse: {e}")))?,
            );
        }
        Ok(tasks)
    }

    async fn list_open_due_tasks(&self) -> Result<Vec<FollowUpTask>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status IN ('pending', 'in_progress') AND due_at IS NOT NULL"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_open_due_tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tasks.push(row_to_task(&row).map_err(|e| {
                DatabaseError::Query(format!("list_open_due_tasks row parse: {e}"))
            })?);
        }
        Ok(tasks)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn seed_hotel(db: &LibSqlBackend) -> Uuid {
        let hotel = Hotel {
            id: Uuid::new_v4(),
            name: "Test Hotel".into(),
            routing_number: Some("+15550001111".into()),
        };
        db.insert_hotel(&hotel).await.unwrap();
        hotel.id
    }

    #[tokio::test]
    async fn insert_and_get_message() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;
        let message = MessageRecord::inbound(hotel_id, Channel::Sms, "hello");
        db.insert_message(&message).await.unwrap();

        let loaded = db.get_message(hotel_id, message.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, message.id);
        assert_eq!(loaded.content, "hello");
        assert_eq!(loaded.channel, Channel::Sms);
        assert_eq!(loaded.status, MessageStatus::Delivered);
        assert!(loaded.intent.is_none());
    }

    #[tokio::test]
    async fn message_reads_are_tenant_scoped() {
        let db = backend().await;
        let hotel_a = seed_hotel(&db).await;
        let hotel_b = {
            let hotel = Hotel {
                id: Uuid::new_v4(),
                name: "Other Hotel".into(),
                routing_number: None,
            };
            db.insert_hotel(&hotel).await.unwrap();
            hotel.id
        };

        let message = MessageRecord::inbound(hotel_a, Channel::Email, "secret");
        db.insert_message(&message).await.unwrap();

        // Same record id, wrong tenant: invisible.
        assert!(db.get_message(hotel_b, message.id).await.unwrap().is_none());
        assert!(db.get_message(hotel_a, message.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn message_updates_are_tenant_scoped() {
        let db = backend().await;
        let hotel_a = seed_hotel(&db).await;
        let hotel_b = Uuid::new_v4();

        let message = MessageRecord::inbound(hotel_a, Channel::Sms, "hi");
        db.insert_message(&message).await.unwrap();

        // Update attempt under the wrong tenant must not stick.
        db.update_message_analysis(hotel_b, message.id, Some(&Intent::Request), Sentiment::Positive)
            .await
            .unwrap();
        let loaded = db.get_message(hotel_a, message.id).await.unwrap().unwrap();
        assert!(loaded.intent.is_none());

        db.update_message_analysis(hotel_a, message.id, Some(&Intent::Request), Sentiment::Positive)
            .await
            .unwrap();
        let loaded = db.get_message(hotel_a, message.id).await.unwrap().unwrap();
        assert_eq!(loaded.intent, Some(Intent::Request));
        assert_eq!(loaded.sentiment, Some(Sentiment::Positive));
    }

    #[tokio::test]
    async fn list_messages_filters_by_channel_and_direction() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;

        db.insert_message(&MessageRecord::inbound(hotel_id, Channel::Sms, "a"))
            .await
            .unwrap();
        db.insert_message(&MessageRecord::inbound(hotel_id, Channel::Email, "b"))
            .await
            .unwrap();
        db.insert_message(&MessageRecord::outbound(hotel_id, Channel::Sms, "c"))
            .await
            .unwrap();

        let sms = db
            .list_messages(
                hotel_id,
                &MessageFilter {
                    channel: Some(Channel::Sms),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(sms.len(), 2);

        let inbound_sms = db
            .list_messages(
                hotel_id,
                &MessageFilter {
                    channel: Some(Channel::Sms),
                    direction: Some(Direction::Inbound),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(inbound_sms.len(), 1);
        assert_eq!(inbound_sms[0].content, "a");
    }

    #[tokio::test]
    async fn list_messages_respects_limit_and_offset() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;
        for i in 0..5 {
            db.insert_message(&MessageRecord::inbound(
                hotel_id,
                Channel::WebChat,
                format!("msg {i}"),
            ))
            .await
            .unwrap();
        }

        let first_page = db
            .list_messages(
                hotel_id,
                &MessageFilter {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first_page.len(), 2);

        let second_page = db
            .list_messages(
                hotel_id,
                &MessageFilter {
                    limit: Some(2),
                    offset: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(second_page.len(), 2);
        assert_ne!(first_page[0].id, second_page[0].id);
    }

    #[tokio::test]
    async fn call_lifecycle() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;

        let call = CallRecord::inbound(hotel_id, "+15551234567");
        db.insert_call(&call).await.unwrap();

        db.update_call_transcript(hotel_id, call.id, "I need a late checkout")
            .await
            .unwrap();
        db.update_call_analysis(
            hotel_id,
            call.id,
            Some(&Intent::Request),
            Sentiment::Neutral,
            4,
            "Late checkout request",
        )
        .await
        .unwrap();

        let ended = Utc::now();
        db.complete_call(hotel_id, call.id, CallStatus::Completed, ended, 145)
            .await
            .unwrap();

        let loaded = db.get_call(hotel_id, call.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CallStatus::Completed);
        assert_eq!(loaded.transcript.as_deref(), Some("I need a late checkout"));
        assert_eq!(loaded.intent, Some(Intent::Request));
        assert_eq!(loaded.urgency, Some(4));
        assert_eq!(loaded.duration_secs, Some(145));
        assert!(loaded.ended_at.is_some());
    }

    #[tokio::test]
    async fn find_hotel_by_routing_number() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;

        let found = db
            .find_hotel_by_routing_number("+15550001111")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, hotel_id);

        assert!(
            db.find_hotel_by_routing_number("+19999999999")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn find_guest_by_phone_is_tenant_scoped() {
        let db = backend().await;
        let hotel_a = seed_hotel(&db).await;
        let hotel_b = {
            let hotel = Hotel {
                id: Uuid::new_v4(),
                name: "B".into(),
                routing_number: None,
            };
            db.insert_hotel(&hotel).await.unwrap();
            hotel.id
        };

        let guest = Guest {
            id: Uuid::new_v4(),
            hotel_id: hotel_a,
            first_name: "Maya".into(),
            last_name: None,
            phone: Some("+15557654321".into()),
            email: None,
        };
        db.insert_guest(&guest).await.unwrap();

        let found = db
            .find_guest_by_phone(hotel_a, "+15557654321")
            .await
            .unwrap();
        assert_eq!(found.map(|g| g.id), Some(guest.id));

        assert!(
            db.find_guest_by_phone(hotel_b, "+15557654321")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn task_insert_list_and_overdue_filter() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;

        let overdue = FollowUpTask::new(
            hotel_id,
            "Fix shower",
            TaskCategory::Maintenance,
            TaskPriority::High,
        )
        .with_due(Utc::now() - chrono::Duration::hours(2), 0);
        db.insert_task(&overdue).await.unwrap();

        let future = FollowUpTask::new(
            hotel_id,
            "Evening turndown",
            TaskCategory::Housekeeping,
            TaskPriority::Low,
        )
        .with_due(Utc::now() + chrono::Duration::hours(2), 0);
        db.insert_task(&future).await.unwrap();

        let all = db.list_tasks(hotel_id, &TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let overdue_only = db
            .list_tasks(
                hotel_id,
                &TaskFilter {
                    overdue: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(overdue_only.len(), 1);
        assert_eq!(overdue_only[0].id, overdue.id);

        let urgent = db
            .list_tasks(
                hotel_id,
                &TaskFilter {
                    priority: Some(TaskPriority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);
    }

    #[tokio::test]
    async fn task_completion_sets_and_clears_completed_at() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;
        let task = FollowUpTask::new(
            hotel_id,
            "Deliver towels",
            TaskCategory::GuestRequest,
            TaskPriority::Medium,
        );
        db.insert_task(&task).await.unwrap();

        db.update_task_status(hotel_id, task.id, TaskStatus::Completed)
            .await
            .unwrap();
        let loaded = db.get_task(hotel_id, task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert!(loaded.completed_at.is_some());

        db.update_task_status(hotel_id, task.id, TaskStatus::InProgress)
            .await
            .unwrap();
        let loaded = db.get_task(hotel_id, task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn task_metadata_round_trips() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;
        let source_id = Uuid::new_v4();
        let task = FollowUpTask::new(
            hotel_id,
            "Guest Request: request",
            TaskCategory::GuestRequest,
            TaskPriority::Urgent,
        )
        .with_metadata(serde_json::json!({
            "source": "message",
            "message_id": source_id.to_string(),
            "channel": "sms",
        }));
        db.insert_task(&task).await.unwrap();

        let loaded = db.get_task(hotel_id, task.id).await.unwrap().unwrap();
        assert_eq!(loaded.metadata["source"], "message");
        assert_eq!(loaded.metadata["message_id"], source_id.to_string());
        assert_eq!(loaded.metadata["channel"], "sms");
    }

    #[tokio::test]
    async fn list_open_due_tasks_skips_resolved() {
        let db = backend().await;
        let hotel_id = seed_hotel(&db).await;

        let open = FollowUpTask::new(hotel_id, "A", TaskCategory::Other, TaskPriority::Low)
            .with_due(Utc::now(), 5);
        db.insert_task(&open).await.unwrap();

        let done = FollowUpTask::new(hotel_id, "B", TaskCategory::Other, TaskPriority::Low)
            .with_due(Utc::now(), 5);
        db.insert_task(&done).await.unwrap();
        db.update_task_status(hotel_id, done.id, TaskStatus::Completed)
            .await
            .unwrap();

        let no_due = FollowUpTask::new(hotel_id, "C", TaskCategory::Other, TaskPriority::Low);
        db.insert_task(&no_due).await.unwrap();

        let due = db.list_open_due_tasks().await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, open.id);
    }
}
