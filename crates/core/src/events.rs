use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::proposal::{Acceptor, ProposalId};
use crate::domain::user::GroupId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: CustomerId,
    pub name: String,
    pub email: Option<String>,
}

impl CustomerSummary {
    pub fn from_customer(customer: &crate::domain::customer::Customer) -> Self {
        Self { id: customer.id, name: customer.name.clone(), email: customer.email.clone() }
    }
}

/// Payload published when a proposal is accepted. Consumed out-of-process-
/// of-mind by notification/reporting listeners; acceptance never waits on
/// them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalAccepted {
    pub proposal_id: ProposalId,
    pub owner_group_id: Option<GroupId>,
    pub total: Decimal,
    pub customer: Option<CustomerSummary>,
    pub accepted_by: Acceptor,
    pub accepted_at: DateTime<Utc>,
    pub is_external_acceptance: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    ProposalAccepted(ProposalAccepted),
}

/// Fire-and-forget publication seam. `publish` must not block and must not
/// fail the caller; implementations drop events they cannot deliver.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Discards everything. Useful where no listener is wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: DomainEvent) {}
}

#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl InMemoryEventBus {
    pub fn events(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: DomainEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
