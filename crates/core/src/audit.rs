use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::user::UserId;

/// Append-only activity record: actor, action label, target, diff payload.
/// Written once per mutating operation; never updated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_user_id: Option<UserId>,
    pub actor_label: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub diff: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, target_type: impl Into<String>, target_id: i64) -> Self {
        Self {
            actor_user_id: None,
            actor_label: None,
            action: action.into(),
            target_type: target_type.into(),
            target_id,
            diff: Value::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn by_user(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn by_label(mut self, label: impl Into<String>) -> Self {
        self.actor_label = Some(label.into());
        self
    }

    pub fn with_diff(mut self, diff: Value) -> Self {
        self.diff = diff;
        self
    }
}

/// Best-effort sink. Implementations must swallow their own persistence
/// failures (logging them) so audit writes never roll back the primary
/// mutation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AuditEntry, AuditSink, InMemoryAuditSink};
    use crate::domain::user::UserId;

    #[tokio::test]
    async fn in_memory_sink_records_actor_and_diff() {
        let sink = InMemoryAuditSink::default();
        sink.record(
            AuditEntry::new("proposal.update", "Proposal", 12)
                .by_user(UserId(3))
                .with_diff(json!({"before": {"status": "draft"}, "after": {"status": "sent"}})),
        )
        .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "proposal.update");
        assert_eq!(entries[0].actor_user_id, Some(UserId(3)));
        assert_eq!(entries[0].diff["after"]["status"], "sent");
    }
}
