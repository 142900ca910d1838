use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::customer::CustomerId;
use crate::domain::user::{GroupId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub i64);

/// Quote vs. contract marker, persisted as the legacy 0/1 column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    #[default]
    Quote,
    Contract,
}

impl ProposalKind {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Quote => 0,
            Self::Contract => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            Self::Contract
        } else {
            Self::Quote
        }
    }
}

/// Who accepted a proposal: an authenticated user id, or a free-form label
/// for external signers ("Jane Doe <jane@example.com>", session emails).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptor {
    User(UserId),
    External(String),
}

impl Acceptor {
    /// Single-column storage form: numeric user id or the raw label.
    pub fn label(&self) -> String {
        match self {
            Self::User(id) => id.0.to_string(),
            Self::External(label) => label.clone(),
        }
    }

    pub fn from_label(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => Self::User(UserId(id)),
            Err(_) => Self::External(raw.to_owned()),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposal_number: Option<String>,
    pub customer_id: Option<CustomerId>,
    pub description: Option<String>,
    /// Raw status label as stored. Legacy rows carry case variants
    /// ("Draft"/"draft") and long-form labels ("Proposal accepted");
    /// canonicalization happens only in [`crate::status`].
    pub status: String,
    pub kind: ProposalKind,
    pub is_locked: bool,
    pub is_deleted: bool,
    /// Manufacturer/item/modification blob, possibly double-string-encoded
    /// by legacy writers. Decoded defensively by [`crate::pricing`].
    pub manufacturers_data: Value,
    pub owner_group_id: Option<GroupId>,
    pub created_by_user_id: Option<UserId>,
    pub designer: Option<UserId>,
    pub location: Option<String>,
    pub sales_rep: Option<String>,
    pub lead_source: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<Acceptor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProposal {
    pub customer_id: Option<CustomerId>,
    pub description: Option<String>,
    pub status: String,
    pub kind: ProposalKind,
    pub manufacturers_data: Value,
    pub owner_group_id: Option<GroupId>,
    pub created_by_user_id: Option<UserId>,
    pub designer: Option<UserId>,
    pub location: Option<String>,
    pub sales_rep: Option<String>,
    pub lead_source: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub date: DateTime<Utc>,
}

/// Full-row update payload. Fields in the second block use
/// leave-unchanged-when-`None` semantics (persisted via `COALESCE`);
/// the first block is always written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalPatch {
    pub customer_id: Option<CustomerId>,
    pub description: Option<String>,
    pub status: String,
    pub manufacturers_data: Value,
    pub location: Option<String>,
    pub sales_rep: Option<String>,
    pub lead_source: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub date: DateTime<Utc>,

    pub designer: Option<UserId>,
    pub sent_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<Acceptor>,
    pub is_locked: Option<bool>,
}

/// Conditional acceptance update, applied only while the row is still in
/// `sent` status and unlocked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acceptance {
    pub accepted_by: Acceptor,
    pub accepted_at: DateTime<Utc>,
}
