pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod pricing;
pub mod scoping;
pub mod status;
pub mod store;

pub use audit::{AuditEntry, AuditSink, InMemoryAuditSink};
pub use domain::customer::{Customer, CustomerId, NewCustomer};
pub use domain::order::{NewOrder, Order, OrderId};
pub use domain::proposal::{
    Acceptance, Acceptor, NewProposal, Proposal, ProposalId, ProposalKind, ProposalPatch,
};
pub use domain::session::{generate_token, NewSession, ProposalSession, SessionId};
pub use domain::user::{AuthUser, GroupId, GroupKind, Role, UserId};
pub use errors::{DomainError, ServiceError};
pub use events::{CustomerSummary, DomainEvent, EventPublisher, InMemoryEventBus, ProposalAccepted};
pub use lifecycle::{
    AcceptOutcome, AcceptRequest, ProposalAction, ProposalForm, ProposalService,
    ProposalServiceDeps, PublicProposal, StatusChange,
};
pub use pricing::{PricingError, PricingSnapshot, StyleSummary};
pub use scoping::{build_list_scope, can_access_proposal, can_set_designer, ListScope, OwnershipPolicy};
pub use status::{is_valid_transition, ProposalStatus};
pub use store::{
    CustomerStore, FixedMultiplier, MultiplierSource, OrderStore, ProposalFilter, ProposalStore,
    SessionStore, StoreError,
};
