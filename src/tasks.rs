//! Follow-up task SLA handling — the periodic overdue sweep.
//!
//! A task with a due time becomes overdue once its SLA window elapses
//! while it is still open (`FollowUpTask::is_overdue`). The sweep flips
//! those tasks to `Overdue` so staff views and the overdue filter pick
//! them up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::model::TaskStatus;
use crate::store::Database;

/// One sweep pass: mark every open, past-SLA task overdue.
/// Returns the number of tasks flipped.
pub async fn mark_overdue_tasks(db: &Arc<dyn Database>) -> Result<usize, DatabaseError> {
    let now = Utc::now();
    let candidates = db.list_open_due_tasks().await?;

    let mut flipped = 0;
    for task in candidates {
        if task.is_overdue(now) {
            db.update_task_status(task.hotel_id, task.id, TaskStatus::Overdue)
                .await?;
            info!(
                task_id = %task.id,
                hotel_id = %task.hotel_id,
                title = %task.title,
                "Task is overdue"
            );
            flipped += 1;
        }
    }
    Ok(flipped)
}

/// Spawn the periodic overdue sweep.
pub fn spawn_overdue_sweep(
    db: Arc<dyn Database>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = mark_overdue_tasks(&db).await {
                warn!(error = %e, "Overdue sweep failed");
            }
        }
    })
}
