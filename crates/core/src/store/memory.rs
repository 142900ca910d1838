//! In-memory store implementations backed by mutex-guarded maps. Used by
//! lifecycle tests and database-free wiring; behavior mirrors the SQL
//! stores, including the conditional acceptance update.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::customer::{Customer, CustomerId, NewCustomer};
use crate::domain::order::{NewOrder, Order, OrderId};
use crate::domain::proposal::{
    Acceptance, NewProposal, Proposal, ProposalId, ProposalPatch,
};
use crate::domain::session::{NewSession, ProposalSession, SessionId};
use crate::domain::user::GroupId;
use crate::scoping::ListScope;
use crate::status::ProposalStatus;
use crate::store::{
    CustomerStore, OrderStore, ProposalFilter, ProposalStore, SessionStore, StoreError,
};

#[derive(Default)]
pub struct InMemoryProposalStore {
    inner: Mutex<ProposalTable>,
}

#[derive(Default)]
struct ProposalTable {
    rows: HashMap<i64, Proposal>,
    next_id: i64,
}

fn scope_admits(scope: &ListScope, proposal: &Proposal) -> bool {
    match scope {
        ListScope::Unrestricted => true,
        ListScope::GroupOnly { group_id } => proposal.owner_group_id == Some(*group_id),
        ListScope::Group { group_id, creator_fallback } => {
            proposal.owner_group_id == Some(*group_id)
                || (proposal.owner_group_id.is_none()
                    && proposal.created_by_user_id == Some(*creator_fallback))
        }
        ListScope::Creator { user_id } => proposal.created_by_user_id == Some(*user_id),
    }
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn find(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        let table = self.inner.lock().expect("proposal table");
        Ok(table.rows.get(&id.0).filter(|p| !p.is_deleted).cloned())
    }

    async fn list(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, StoreError> {
        let table = self.inner.lock().expect("proposal table");
        let mut rows: Vec<Proposal> = table
            .rows
            .values()
            .filter(|p| !p.is_deleted)
            .filter(|p| filter.kind.map_or(true, |kind| p.kind == kind))
            .filter(|p| scope_admits(&filter.scope, p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(rows)
    }

    async fn create(&self, new: NewProposal) -> Result<Proposal, StoreError> {
        let mut table = self.inner.lock().expect("proposal table");
        table.next_id += 1;
        let id = table.next_id;
        let now = Utc::now();
        let proposal = Proposal {
            id: ProposalId(id),
            proposal_number: Some(format!("MWQ-{id:03}")),
            customer_id: new.customer_id,
            description: new.description,
            status: new.status,
            kind: new.kind,
            is_locked: false,
            is_deleted: false,
            manufacturers_data: new.manufacturers_data,
            owner_group_id: new.owner_group_id,
            created_by_user_id: new.created_by_user_id,
            designer: new.designer,
            location: new.location,
            sales_rep: new.sales_rep,
            lead_source: new.lead_source,
            manufacturer_id: new.manufacturer_id,
            date: Some(new.date),
            sent_at: None,
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, proposal.clone());
        Ok(proposal)
    }

    async fn update(&self, id: ProposalId, patch: ProposalPatch) -> Result<Proposal, StoreError> {
        let mut table = self.inner.lock().expect("proposal table");
        let row = table.rows.get_mut(&id.0).ok_or(StoreError::NotFound)?;

        row.customer_id = patch.customer_id;
        row.description = patch.description;
        row.status = patch.status;
        row.manufacturers_data = patch.manufacturers_data;
        row.location = patch.location;
        row.sales_rep = patch.sales_rep;
        row.lead_source = patch.lead_source;
        row.manufacturer_id = patch.manufacturer_id;
        row.date = Some(patch.date);

        if let Some(designer) = patch.designer {
            row.designer = Some(designer);
        }
        if let Some(sent_at) = patch.sent_at {
            row.sent_at = Some(sent_at);
        }
        if let Some(accepted_at) = patch.accepted_at {
            row.accepted_at = Some(accepted_at);
        }
        if let Some(accepted_by) = patch.accepted_by {
            row.accepted_by = Some(accepted_by);
        }
        if let Some(is_locked) = patch.is_locked {
            row.is_locked = is_locked;
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn accept_if_sent(
        &self,
        id: ProposalId,
        acceptance: Acceptance,
    ) -> Result<bool, StoreError> {
        let mut table = self.inner.lock().expect("proposal table");
        let row = table.rows.get_mut(&id.0).ok_or(StoreError::NotFound)?;

        let still_sent = !row.is_locked
            && ProposalStatus::parse(&row.status) == Some(ProposalStatus::Sent);
        if !still_sent {
            return Ok(false);
        }

        row.status = ProposalStatus::Accepted.label().to_owned();
        row.accepted_at = Some(acceptance.accepted_at);
        row.accepted_by = Some(acceptance.accepted_by);
        row.is_locked = true;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn soft_delete(&self, id: ProposalId) -> Result<(), StoreError> {
        let mut table = self.inner.lock().expect("proposal table");
        let row = table.rows.get_mut(&id.0).ok_or(StoreError::NotFound)?;
        row.is_deleted = true;
        row.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerStore {
    inner: Mutex<CustomerTable>,
}

#[derive(Default)]
struct CustomerTable {
    rows: HashMap<i64, Customer>,
    next_id: i64,
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let table = self.inner.lock().expect("customer table");
        Ok(table.rows.get(&id.0).filter(|c| !c.is_deleted).cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
        group_id: Option<GroupId>,
    ) -> Result<Option<Customer>, StoreError> {
        let table = self.inner.lock().expect("customer table");
        Ok(table
            .rows
            .values()
            .find(|c| {
                !c.is_deleted
                    && c.group_id == group_id
                    && c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        let mut table = self.inner.lock().expect("customer table");
        table.next_id += 1;
        let customer = Customer {
            id: CustomerId(table.next_id),
            name: new.name,
            email: new.email,
            mobile: None,
            address: None,
            group_id: new.group_id,
            is_deleted: false,
        };
        table.rows.insert(customer.id.0, customer.clone());
        Ok(customer)
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<SessionTable>,
}

#[derive(Default)]
struct SessionTable {
    rows: Vec<ProposalSession>,
    next_id: i64,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<ProposalSession>, StoreError> {
        let table = self.inner.lock().expect("session table");
        Ok(table.rows.iter().find(|s| s.token == token).cloned())
    }

    async fn create(&self, new: NewSession) -> Result<ProposalSession, StoreError> {
        let mut table = self.inner.lock().expect("session table");
        if table.rows.iter().any(|s| s.token == new.token) {
            return Err(StoreError::Backend("session token already exists".to_owned()));
        }
        table.next_id += 1;
        let session = ProposalSession {
            id: SessionId(table.next_id),
            proposal_id: new.proposal_id,
            token: new.token,
            expires_at: new.expires_at,
            created_by_user_id: new.created_by_user_id,
            customer_email: new.customer_email,
        };
        table.rows.push(session.clone());
        Ok(session)
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<OrderTable>,
}

#[derive(Default)]
struct OrderTable {
    rows: Vec<Order>,
    next_id: i64,
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, new: NewOrder) -> Result<Order, StoreError> {
        let mut table = self.inner.lock().expect("order table");
        table.next_id += 1;
        let id = table.next_id;
        let order = Order {
            id: OrderId(id),
            proposal_id: new.proposal_id,
            customer_id: new.customer_id,
            order_number: Some(format!("MW-{id:03}")),
            accepted_by: new.accepted_by,
            accepted_at: new.accepted_at,
            snapshot: new.snapshot,
            created_at: Utc::now(),
        };
        table.rows.push(order.clone());
        Ok(order)
    }

    async fn find_by_proposal(&self, id: ProposalId) -> Result<Option<Order>, StoreError> {
        let table = self.inner.lock().expect("order table");
        Ok(table.rows.iter().find(|o| o.proposal_id == id).cloned())
    }
}
