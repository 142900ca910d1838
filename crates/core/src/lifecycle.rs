//! Proposal lifecycle service: create/update/accept/status operations with
//! tenancy scoping, transition validation, locking, snapshot freezing, audit
//! logging, and domain-event publication.
//!
//! Every operation loads fresh state, decides against it, and persists in a
//! single store call; the acceptance flip itself is a conditional update so
//! two racing accepts cannot both win.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::audit::{AuditEntry, AuditSink};
use crate::domain::customer::{CustomerId, NewCustomer};
use crate::domain::order::{NewOrder, Order};
use crate::domain::proposal::{
    Acceptance, Acceptor, NewProposal, Proposal, ProposalId, ProposalKind, ProposalPatch,
};
use crate::domain::session::{generate_token, NewSession, ProposalSession};
use crate::domain::user::{AuthUser, GroupId, UserId};
use crate::errors::{DomainError, ServiceError};
use crate::events::{CustomerSummary, DomainEvent, EventPublisher, ProposalAccepted};
use crate::pricing::{self, PricingSnapshot};
use crate::scoping::{build_list_scope, can_access_proposal, can_set_designer, OwnershipPolicy};
use crate::status::{is_valid_transition, ProposalStatus};
use crate::store::{
    CustomerStore, MultiplierSource, OrderStore, ProposalFilter, ProposalStore, SessionStore,
};

const TARGET_PROPOSAL: &str = "Proposal";

/// Mutation verb carried alongside the form payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    #[default]
    Save,
    Send,
    Accept,
    Reject,
    Expire,
}

impl ProposalAction {
    /// Anything unrecognized (legacy numeric markers included) is a plain
    /// save.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "send" => Self::Send,
            "accept" => Self::Accept,
            "reject" => Self::Reject,
            "expire" => Self::Expire,
            _ => Self::Save,
        }
    }
}

/// Inbound `formData` payload, camelCase on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProposalForm {
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub designer: Option<i64>,
    pub location: Option<String>,
    pub sales_rep: Option<String>,
    pub lead_source: Option<String>,
    pub manufacturer_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<i64>,
    pub manufacturers_data: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptRequest {
    pub external_signer_name: Option<String>,
    pub external_signer_email: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusChange {
    pub action: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AcceptOutcome {
    pub proposal: Proposal,
    pub order: Order,
    pub event: ProposalAccepted,
}

/// Reduced field set for the unauthenticated acceptance page. Deliberately
/// excludes ownership, creator, designer, and soft-delete internals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProposal {
    pub id: ProposalId,
    pub proposal_number: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub date: Option<DateTime<Utc>>,
    pub manufacturers_data: Value,
    pub customer: Option<CustomerSummary>,
    pub session_expires_at: DateTime<Utc>,
}

pub struct ProposalServiceDeps {
    pub proposals: Arc<dyn ProposalStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub orders: Arc<dyn OrderStore>,
    pub multipliers: Arc<dyn MultiplierSource>,
    pub audit: Arc<dyn AuditSink>,
    pub events: Arc<dyn EventPublisher>,
}

pub struct ProposalService {
    proposals: Arc<dyn ProposalStore>,
    customers: Arc<dyn CustomerStore>,
    sessions: Arc<dyn SessionStore>,
    orders: Arc<dyn OrderStore>,
    multipliers: Arc<dyn MultiplierSource>,
    audit: Arc<dyn AuditSink>,
    events: Arc<dyn EventPublisher>,
    session_ttl: Duration,
}

impl ProposalService {
    pub fn new(deps: ProposalServiceDeps, session_ttl_minutes: i64) -> Self {
        Self {
            proposals: deps.proposals,
            customers: deps.customers,
            sessions: deps.sessions,
            orders: deps.orders,
            multipliers: deps.multipliers,
            audit: deps.audit,
            events: deps.events,
            session_ttl: Duration::minutes(session_ttl_minutes.max(1)),
        }
    }

    pub async fn create(
        &self,
        form: ProposalForm,
        user: &AuthUser,
    ) -> Result<Proposal, ServiceError> {
        let customer_scope = user.is_contractor().then_some(user.group_id).flatten();
        let customer_id = self.resolve_customer(&form, customer_scope).await?;

        let designer =
            if can_set_designer(user) { form.designer.map(UserId) } else { None };

        let status = clean(form.status.as_deref()).unwrap_or_else(|| "Draft".to_owned());
        let date = parse_form_date(form.date.as_deref()).unwrap_or_else(Utc::now);

        let proposal = self
            .proposals
            .create(NewProposal {
                customer_id,
                description: clean(form.description.as_deref()),
                status,
                kind: ProposalKind::from_i64(form.kind.unwrap_or(0)),
                manufacturers_data: form.manufacturers_data,
                owner_group_id: user.group_id,
                created_by_user_id: Some(user.id),
                designer,
                location: clean(form.location.as_deref()),
                sales_rep: clean(form.sales_rep.as_deref()),
                lead_source: clean(form.lead_source.as_deref()),
                manufacturer_id: form.manufacturer_id,
                date,
            })
            .await?;

        self.audit
            .record(
                AuditEntry::new("proposal.create", TARGET_PROPOSAL, proposal.id.0)
                    .by_user(user.id)
                    .with_diff(json!({ "after": to_diff(&proposal) })),
            )
            .await;

        Ok(proposal)
    }

    pub async fn update(
        &self,
        id: ProposalId,
        form: ProposalForm,
        action: ProposalAction,
        user: &AuthUser,
    ) -> Result<Proposal, ServiceError> {
        let existing = self.load(id).await?;
        if existing.is_locked {
            return Err(DomainError::Locked.into());
        }
        self.check_access(user, &existing, OwnershipPolicy::Creator)?;

        let customer_scope = user.is_contractor().then_some(user.group_id).flatten();
        let customer_id = self.resolve_customer(&form, customer_scope).await?;

        let now = Utc::now();
        let mut status = clean(form.status.as_deref()).unwrap_or_else(|| existing.status.clone());
        let mut sent_at = None;
        let mut accepted_at = None;
        let mut accepted_by = None;
        let mut is_locked = None;

        match action {
            ProposalAction::Save => {}
            ProposalAction::Send => {
                status = ProposalStatus::Sent.label().to_owned();
                sent_at = Some(now);
            }
            ProposalAction::Accept => {
                status = ProposalStatus::Accepted.label().to_owned();
                accepted_at = Some(now);
                accepted_by = Some(Acceptor::User(user.id));
                is_locked = Some(true);
            }
            ProposalAction::Reject => {
                status = ProposalStatus::Rejected.label().to_owned();
            }
            ProposalAction::Expire => {
                status = ProposalStatus::Expired.label().to_owned();
            }
        }

        if !is_valid_transition(&existing.status, &status) {
            return Err(DomainError::InvalidTransition {
                from: existing.status.clone(),
                to: status,
            }
            .into());
        }

        let designer = if can_set_designer(user) { form.designer.map(UserId) } else { None };
        let date = parse_form_date(form.date.as_deref())
            .or(existing.date)
            .unwrap_or_else(Utc::now);

        let updated = self
            .proposals
            .update(
                id,
                ProposalPatch {
                    customer_id,
                    description: clean(form.description.as_deref()),
                    status,
                    manufacturers_data: form.manufacturers_data,
                    location: clean(form.location.as_deref()),
                    sales_rep: clean(form.sales_rep.as_deref()),
                    lead_source: clean(form.lead_source.as_deref()),
                    manufacturer_id: form.manufacturer_id,
                    date,
                    designer,
                    sent_at,
                    accepted_at,
                    accepted_by,
                    is_locked,
                },
            )
            .await?;

        self.audit
            .record(
                AuditEntry::new("proposal.update", TARGET_PROPOSAL, id.0)
                    .by_user(user.id)
                    .with_diff(json!({ "before": to_diff(&existing), "after": to_diff(&updated) })),
            )
            .await;

        Ok(updated)
    }

    /// Narrow status/action mutation without the full form payload. Same
    /// locking, scoping, and transition rules as [`Self::update`].
    pub async fn update_status(
        &self,
        id: ProposalId,
        change: StatusChange,
        user: &AuthUser,
    ) -> Result<Proposal, ServiceError> {
        let existing = self.load(id).await?;
        if existing.is_locked {
            return Err(DomainError::Locked.into());
        }
        self.check_access(user, &existing, OwnershipPolicy::Creator)?;

        let now = Utc::now();
        let action = change.action.as_deref().map(ProposalAction::parse).unwrap_or_default();

        let mut sent_at = None;
        let mut accepted_at = None;
        let mut accepted_by = None;
        let mut is_locked = None;

        let status = match action {
            ProposalAction::Send => {
                sent_at = Some(now);
                ProposalStatus::Sent.label().to_owned()
            }
            ProposalAction::Accept => {
                accepted_at = Some(now);
                accepted_by = Some(Acceptor::User(user.id));
                is_locked = Some(true);
                ProposalStatus::Accepted.label().to_owned()
            }
            ProposalAction::Reject => ProposalStatus::Rejected.label().to_owned(),
            ProposalAction::Expire => ProposalStatus::Expired.label().to_owned(),
            ProposalAction::Save => clean(change.status.as_deref()).ok_or_else(|| {
                ServiceError::Validation("either `action` or `status` is required".to_owned())
            })?,
        };

        if !is_valid_transition(&existing.status, &status) {
            return Err(DomainError::InvalidTransition {
                from: existing.status.clone(),
                to: status,
            }
            .into());
        }

        let updated = self
            .proposals
            .update(
                id,
                ProposalPatch {
                    customer_id: existing.customer_id,
                    description: existing.description.clone(),
                    status: status.clone(),
                    manufacturers_data: existing.manufacturers_data.clone(),
                    location: existing.location.clone(),
                    sales_rep: existing.sales_rep.clone(),
                    lead_source: existing.lead_source.clone(),
                    manufacturer_id: existing.manufacturer_id,
                    date: existing.date.unwrap_or(now),
                    designer: None,
                    sent_at,
                    accepted_at,
                    accepted_by,
                    is_locked,
                },
            )
            .await?;

        self.audit
            .record(
                AuditEntry::new("proposal.status", TARGET_PROPOSAL, id.0)
                    .by_user(user.id)
                    .with_diff(json!({
                        "before": { "status": existing.status },
                        "after": { "status": status },
                    })),
            )
            .await;

        Ok(updated)
    }

    /// Acceptance pipeline: identity resolution, snapshot freezing, the
    /// conditional lock flip, order creation, event emission.
    pub async fn accept(
        &self,
        id: ProposalId,
        request: AcceptRequest,
        user: Option<&AuthUser>,
    ) -> Result<AcceptOutcome, ServiceError> {
        let proposal = self.load(id).await?;

        let canonical = ProposalStatus::parse(&proposal.status);
        if proposal.is_locked || canonical == Some(ProposalStatus::Accepted) {
            return Err(ServiceError::Validation("proposal is already accepted".to_owned()));
        }
        if canonical != Some(ProposalStatus::Sent) {
            return Err(ServiceError::Validation(format!(
                "proposal must be in `sent` status to be accepted (current: `{}`)",
                proposal.status
            )));
        }

        let (acceptor, is_external) = self.resolve_acceptor(&proposal, &request, user).await?;

        let multiplier = self.multipliers.multiplier_for(proposal.owner_group_id).await?;
        let snapshot: PricingSnapshot =
            pricing::snapshot_from_value(&proposal.manufacturers_data, multiplier)?;

        let accepted_at = Utc::now();
        let applied = self
            .proposals
            .accept_if_sent(
                id,
                Acceptance { accepted_by: acceptor.clone(), accepted_at },
            )
            .await?;
        if !applied {
            // A concurrent accept won the conditional update.
            return Err(ServiceError::Validation("proposal is already accepted".to_owned()));
        }

        let customer = match proposal.customer_id {
            Some(customer_id) => self.customers.find(customer_id).await?,
            None => None,
        };

        let order = self
            .orders
            .create(NewOrder {
                proposal_id: id,
                customer_id: proposal.customer_id,
                accepted_by: acceptor.clone(),
                accepted_at,
                snapshot: snapshot.clone(),
            })
            .await?;

        let event = ProposalAccepted {
            proposal_id: id,
            owner_group_id: proposal.owner_group_id,
            total: snapshot.grand_total,
            customer: customer.as_ref().map(CustomerSummary::from_customer),
            accepted_by: acceptor.clone(),
            accepted_at,
            is_external_acceptance: is_external,
        };
        self.events.publish(DomainEvent::ProposalAccepted(event.clone()));

        let mut entry = AuditEntry::new("proposal.accept", TARGET_PROPOSAL, id.0).with_diff(json!({
            "before": { "status": proposal.status },
            "after": {
                "status": ProposalStatus::Accepted.label(),
                "accepted_by": acceptor.label(),
                "order_id": order.id.0,
                "grand_total": snapshot.grand_total,
            },
        }));
        entry = match &acceptor {
            Acceptor::User(user_id) => entry.by_user(*user_id),
            Acceptor::External(label) => entry.by_label(label.clone()),
        };
        self.audit.record(entry).await;

        let proposal = self
            .load(id)
            .await
            .map_err(|_| ServiceError::Internal("accepted proposal disappeared".to_owned()))?;

        Ok(AcceptOutcome { proposal, order, event })
    }

    pub async fn get(&self, id: ProposalId, user: &AuthUser) -> Result<Proposal, ServiceError> {
        let proposal = self.load(id).await?;
        self.check_access(user, &proposal, OwnershipPolicy::Creator)?;
        Ok(proposal)
    }

    pub async fn list(
        &self,
        user: &AuthUser,
        kind: Option<ProposalKind>,
        requested_group: Option<GroupId>,
    ) -> Result<Vec<Proposal>, ServiceError> {
        let scope = build_list_scope(user, requested_group);
        Ok(self.proposals.list(&ProposalFilter { kind, scope }).await?)
    }

    pub async fn delete(&self, id: ProposalId, user: &AuthUser) -> Result<(), ServiceError> {
        let proposal = self.load(id).await?;
        self.check_access(user, &proposal, OwnershipPolicy::Creator)?;

        self.proposals.soft_delete(id).await?;
        self.audit
            .record(
                AuditEntry::new("proposal.delete", TARGET_PROPOSAL, id.0)
                    .by_user(user.id)
                    .with_diff(json!({ "before": { "is_deleted": false }, "after": { "is_deleted": true } })),
            )
            .await;
        Ok(())
    }

    /// Token-gated read for the unauthenticated acceptance page. Expiry is
    /// checked against the wall clock at the moment of use.
    pub async fn get_public_by_token(&self, token: &str) -> Result<PublicProposal, ServiceError> {
        let session = self
            .sessions
            .find_by_token(token.trim())
            .await?
            .ok_or_else(|| ServiceError::NotFound("proposal session not found".to_owned()))?;

        if session.is_expired(Utc::now()) {
            return Err(ServiceError::Unauthenticated(
                "proposal session token has expired".to_owned(),
            ));
        }

        let proposal = self.load(session.proposal_id).await?;
        let customer = match proposal.customer_id {
            Some(customer_id) => self.customers.find(customer_id).await?,
            None => None,
        };

        Ok(PublicProposal {
            id: proposal.id,
            proposal_number: proposal.proposal_number,
            description: proposal.description,
            status: proposal.status,
            date: proposal.date,
            manufacturers_data: proposal.manufacturers_data,
            customer: customer.as_ref().map(CustomerSummary::from_customer),
            session_expires_at: session.expires_at,
        })
    }

    /// Share-link flow: issue a tokenized session and mark a draft proposal
    /// as sent (first send wins the `sent_at` stamp).
    pub async fn create_session(
        &self,
        id: ProposalId,
        user: &AuthUser,
    ) -> Result<ProposalSession, ServiceError> {
        let proposal = self.load(id).await?;
        self.check_access(user, &proposal, OwnershipPolicy::Creator)?;

        let customer_email = match proposal.customer_id {
            Some(customer_id) => {
                self.customers.find(customer_id).await?.and_then(|c| c.email)
            }
            None => None,
        };

        let now = Utc::now();
        let session = self
            .sessions
            .create(NewSession {
                proposal_id: id,
                token: generate_token(),
                expires_at: now + self.session_ttl,
                created_by_user_id: Some(user.id),
                customer_email,
            })
            .await?;

        let needs_sent_at = proposal.sent_at.is_none();
        let is_draft = ProposalStatus::parse(&proposal.status) == Some(ProposalStatus::Draft);
        if !proposal.is_locked && (needs_sent_at || is_draft) {
            let status = if is_draft {
                ProposalStatus::Sent.label().to_owned()
            } else {
                proposal.status.clone()
            };
            self.proposals
                .update(
                    id,
                    ProposalPatch {
                        customer_id: proposal.customer_id,
                        description: proposal.description.clone(),
                        status: status.clone(),
                        manufacturers_data: proposal.manufacturers_data.clone(),
                        location: proposal.location.clone(),
                        sales_rep: proposal.sales_rep.clone(),
                        lead_source: proposal.lead_source.clone(),
                        manufacturer_id: proposal.manufacturer_id,
                        date: proposal.date.unwrap_or(now),
                        designer: None,
                        sent_at: needs_sent_at.then_some(now),
                        accepted_at: None,
                        accepted_by: None,
                        is_locked: None,
                    },
                )
                .await?;

            self.audit
                .record(
                    AuditEntry::new("proposal.send.share", TARGET_PROPOSAL, id.0)
                        .by_user(user.id)
                        .with_diff(json!({
                            "before": { "status": proposal.status, "sent_at": proposal.sent_at },
                            "after": { "status": status, "sent_at": now },
                        })),
                )
                .await;
        }

        self.audit
            .record(
                AuditEntry::new("proposal.session.create", TARGET_PROPOSAL, id.0)
                    .by_user(user.id)
                    .with_diff(json!({
                        "session_id": session.id.0,
                        "expires_at": session.expires_at,
                    })),
            )
            .await;

        Ok(session)
    }

    async fn load(&self, id: ProposalId) -> Result<Proposal, ServiceError> {
        self.proposals
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("proposal not found".to_owned()))
    }

    fn check_access(
        &self,
        user: &AuthUser,
        proposal: &Proposal,
        policy: OwnershipPolicy,
    ) -> Result<(), ServiceError> {
        if can_access_proposal(user, proposal, policy) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "you do not have access to this proposal".to_owned(),
            ))
        }
    }

    async fn resolve_customer(
        &self,
        form: &ProposalForm,
        group_id: Option<GroupId>,
    ) -> Result<Option<CustomerId>, ServiceError> {
        if let Some(id) = form.customer_id {
            return Ok(Some(CustomerId(id)));
        }

        let name = clean(form.customer_name.as_deref());
        let email = clean(form.customer_email.as_deref());
        let (Some(name), Some(email)) = (name, email) else {
            return Ok(None);
        };

        if let Some(existing) = self.customers.find_by_email(&email, group_id).await? {
            return Ok(Some(existing.id));
        }

        let created =
            self.customers.create(NewCustomer { name, email: Some(email), group_id }).await?;
        Ok(Some(created.id))
    }

    /// Acceptor identity, strongest source first: authenticated user, then
    /// session token, then bare external signer details.
    async fn resolve_acceptor(
        &self,
        proposal: &Proposal,
        request: &AcceptRequest,
        user: Option<&AuthUser>,
    ) -> Result<(Acceptor, bool), ServiceError> {
        if let Some(user) = user {
            if !can_access_proposal(user, proposal, OwnershipPolicy::Group) {
                return Err(ServiceError::Forbidden(
                    "you do not have access to this proposal".to_owned(),
                ));
            }
            return Ok((Acceptor::User(user.id), false));
        }

        if let Some(token) = clean(request.session_token.as_deref()) {
            let session = self
                .sessions
                .find_by_token(&token)
                .await?
                .ok_or_else(|| {
                    ServiceError::Unauthenticated("invalid proposal session token".to_owned())
                })?;
            if session.proposal_id != proposal.id {
                return Err(ServiceError::Unauthenticated(
                    "session token does not match this proposal".to_owned(),
                ));
            }
            if session.is_expired(Utc::now()) {
                return Err(ServiceError::Unauthenticated(
                    "proposal session token has expired".to_owned(),
                ));
            }
            let label = session.customer_email.unwrap_or_else(|| "customer session".to_owned());
            return Ok((Acceptor::External(label), true));
        }

        let name = clean(request.external_signer_name.as_deref());
        let email = clean(request.external_signer_email.as_deref());
        match (name, email) {
            (Some(name), Some(email)) => Ok((Acceptor::External(format!("{name} <{email}>")), true)),
            (Some(name), None) => Ok((Acceptor::External(name), true)),
            (None, Some(email)) => Ok((Acceptor::External(email), true)),
            (None, None) => Err(ServiceError::Unauthenticated(
                "no valid acceptor identity was provided".to_owned(),
            )),
        }
    }
}

fn clean(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn parse_form_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn to_diff(proposal: &Proposal) -> Value {
    serde_json::to_value(proposal).unwrap_or(Value::Null)
}
