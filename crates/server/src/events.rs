//! Bridge from the core's fire-and-forget publisher onto a tokio channel,
//! with an in-process consumer that records acceptance activity and logs.
//! Acceptance never blocks on the consumer; a dropped receiver just drops
//! events.

use millwork_core::audit::{AuditEntry, AuditSink};
use millwork_core::events::{DomainEvent, EventPublisher};
use millwork_db::repositories::SqlAuditSink;
use millwork_db::DbPool;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::info;

#[derive(Clone)]
pub struct ChannelPublisher {
    tx: UnboundedSender<DomainEvent>,
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }
}

/// Spawn the acceptance listener and return the publisher feeding it.
pub fn spawn_listener(pool: DbPool) -> ChannelPublisher {
    let (tx, mut rx) = mpsc::unbounded_channel::<DomainEvent>();
    let sink = SqlAuditSink::new(pool);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_event(&sink, event).await;
        }
    });

    ChannelPublisher { tx }
}

async fn handle_event(sink: &SqlAuditSink, event: DomainEvent) {
    match event {
        DomainEvent::ProposalAccepted(accepted) => {
            info!(
                event_name = "proposal.accepted",
                proposal_id = accepted.proposal_id.0,
                owner_group_id = accepted.owner_group_id.map(|g| g.0),
                total = %accepted.total,
                accepted_by = %accepted.accepted_by.label(),
                is_external = accepted.is_external_acceptance,
                "proposal accepted"
            );

            let mut entry = AuditEntry::new(
                "proposal.accept.event",
                "Proposal",
                accepted.proposal_id.0,
            )
            .with_diff(json!({
                "owner_group_id": accepted.owner_group_id.map(|g| g.0),
                "total": accepted.total,
                "customer_id": accepted.customer.as_ref().map(|c| c.id.0),
                "accepted_at": accepted.accepted_at,
                "is_external_acceptance": accepted.is_external_acceptance,
            }));
            entry = match &accepted.accepted_by {
                millwork_core::Acceptor::User(user_id) => entry.by_user(*user_id),
                millwork_core::Acceptor::External(label) => entry.by_label(label.clone()),
            };
            sink.record(entry).await;
        }
    }
}
