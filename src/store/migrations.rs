//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS hotels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                routing_number TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_hotels_routing ON hotels(routing_number);

            CREATE TABLE IF NOT EXISTS guests (
                id TEXT PRIMARY KEY,
                hotel_id TEXT NOT NULL REFERENCES hotels(id),
                first_name TEXT NOT NULL,
                last_name TEXT,
                phone TEXT,
                email TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_guests_hotel ON guests(hotel_id);
            CREATE INDEX IF NOT EXISTS idx_guests_phone ON guests(hotel_id, phone);

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                hotel_id TEXT NOT NULL REFERENCES hotels(id),
                guest_id TEXT NOT NULL REFERENCES guests(id),
                confirmation_number TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_hotel ON bookings(hotel_id);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                hotel_id TEXT NOT NULL REFERENCES hotels(id),
                channel TEXT NOT NULL,
                direction TEXT NOT NULL,
                content TEXT NOT NULL,
                guest_id TEXT,
                booking_id TEXT,
                language TEXT,
                intent TEXT,
                sentiment TEXT,
                autonomous INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_hotel ON messages(hotel_id);
            CREATE INDEX IF NOT EXISTS idx_messages_hotel_created
                ON messages(hotel_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status);

            CREATE TABLE IF NOT EXISTS calls (
                id TEXT PRIMARY KEY,
                hotel_id TEXT NOT NULL REFERENCES hotels(id),
                phone_number TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                guest_id TEXT,
                booking_id TEXT,
                transcript TEXT,
                summary TEXT,
                intent TEXT,
                sentiment TEXT,
                urgency INTEGER,
                duration_secs INTEGER,
                created_at TEXT NOT NULL,
                ended_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_calls_hotel ON calls(hotel_id);
            CREATE INDEX IF NOT EXISTS idx_calls_hotel_created ON calls(hotel_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_calls_status ON calls(status);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                hotel_id TEXT NOT NULL REFERENCES hotels(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                guest_id TEXT,
                booking_id TEXT,
                assigned_to TEXT,
                due_at TEXT,
                sla_minutes INTEGER,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_hotel ON tasks(hotel_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_at);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        conn.execute_batch(migration.sql).await.map_err(|e| {
            DatabaseError::Migration(format!(
                "Migration V{} ({}) failed: {e}",
                migration.version, migration.name
            ))
        })?;
        record_version(conn, migration.version, migration.name).await?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("Failed to parse migration version: {e}"))),
        None => Ok(0),
    }
}

async fn record_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut tables = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tables.push(row.get::<String>(0).unwrap());
        }
        for expected in ["hotels", "guests", "bookings", "messages", "calls", "tasks"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT COUNT(*) FROM _migrations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), MIGRATIONS.len() as i64);
    }
}
