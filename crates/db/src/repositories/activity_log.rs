use async_trait::async_trait;
use millwork_core::audit::{AuditEntry, AuditSink};
use serde_json::Value;
use tracing::error;

use super::ts;
use crate::DbPool;

/// Audit persistence is deliberately best-effort: a failed insert is logged
/// and swallowed so the primary mutation never rolls back on it.
pub struct SqlAuditSink {
    pool: DbPool,
}

impl SqlAuditSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn record(&self, entry: AuditEntry) {
        let diff = match &entry.diff {
            Value::Null => None,
            other => serde_json::to_string(other).ok(),
        };

        let result = sqlx::query(
            "INSERT INTO activity_log
                (actor_user_id, actor_label, action, target_type, target_id, diff, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.actor_user_id.map(|id| id.0))
        .bind(&entry.actor_label)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(entry.target_id)
        .bind(&diff)
        .bind(ts(entry.occurred_at))
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            error!(
                event_name = "audit.write_failed",
                action = %entry.action,
                target_id = entry.target_id,
                error = %err,
                "failed to persist activity log entry"
            );
        }
    }
}
