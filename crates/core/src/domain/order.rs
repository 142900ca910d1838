use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::proposal::{Acceptor, ProposalId};
use crate::pricing::PricingSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

/// Immutable acceptance record. The embedded snapshot is a deep copy of the
/// proposal's pricing at acceptance time; later proposal edits never reach it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub proposal_id: ProposalId,
    pub customer_id: Option<CustomerId>,
    pub order_number: Option<String>,
    pub accepted_by: Acceptor,
    pub accepted_at: DateTime<Utc>,
    pub snapshot: PricingSnapshot,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub proposal_id: ProposalId,
    pub customer_id: Option<CustomerId>,
    pub accepted_by: Acceptor,
    pub accepted_at: DateTime<Utc>,
    pub snapshot: PricingSnapshot,
}
