//! Persistence seams consumed by the lifecycle service. The `millwork-db`
//! crate provides the SQL implementations; [`memory`] provides in-process
//! fakes for tests and wiring without a database.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::customer::{Customer, CustomerId, NewCustomer};
use crate::domain::order::{NewOrder, Order};
use crate::domain::proposal::{
    Acceptance, NewProposal, Proposal, ProposalId, ProposalKind, ProposalPatch,
};
use crate::domain::session::{NewSession, ProposalSession};
use crate::domain::user::GroupId;
use crate::scoping::ListScope;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("storage error: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProposalFilter {
    pub kind: Option<ProposalKind>,
    pub scope: ListScope,
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn find(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError>;

    /// Soft-deleted rows excluded; newest first.
    async fn list(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, StoreError>;

    async fn create(&self, new: NewProposal) -> Result<Proposal, StoreError>;

    async fn update(&self, id: ProposalId, patch: ProposalPatch) -> Result<Proposal, StoreError>;

    /// Single conditional update: applies the acceptance only while the row
    /// is still in `sent` status and unlocked. Returns `false` when zero
    /// rows matched; the caller treats that as "already accepted" instead
    /// of trusting an earlier read.
    async fn accept_if_sent(
        &self,
        id: ProposalId,
        acceptance: Acceptance,
    ) -> Result<bool, StoreError>;

    async fn soft_delete(&self, id: ProposalId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// Email match within one tenancy scope (`None` = ungrouped/admin).
    async fn find_by_email(
        &self,
        email: &str,
        group_id: Option<GroupId>,
    ) -> Result<Option<Customer>, StoreError>;

    async fn create(&self, new: NewCustomer) -> Result<Customer, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<ProposalSession>, StoreError>;

    async fn create(&self, new: NewSession) -> Result<ProposalSession, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, new: NewOrder) -> Result<Order, StoreError>;

    async fn find_by_proposal(&self, id: ProposalId) -> Result<Option<Order>, StoreError>;
}

/// Seam onto the external pricing-catalog service: the contractor price
/// multiplier applied when freezing a snapshot.
#[async_trait]
pub trait MultiplierSource: Send + Sync {
    async fn multiplier_for(&self, group_id: Option<GroupId>) -> Result<Decimal, StoreError>;
}

/// Constant multiplier; `Default` is 1 (catalog prices unchanged).
#[derive(Clone, Copy, Debug)]
pub struct FixedMultiplier(pub Decimal);

impl Default for FixedMultiplier {
    fn default() -> Self {
        Self(Decimal::ONE)
    }
}

#[async_trait]
impl MultiplierSource for FixedMultiplier {
    async fn multiplier_for(&self, _group_id: Option<GroupId>) -> Result<Decimal, StoreError> {
        Ok(self.0)
    }
}
