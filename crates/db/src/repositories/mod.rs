pub mod activity_log;
pub mod customer;
pub mod multiplier;
pub mod order;
pub mod proposal;
pub mod session;

pub use activity_log::SqlAuditSink;
pub use customer::SqlCustomerStore;
pub use multiplier::SqlMultiplierSource;
pub use order::SqlOrderStore;
pub use proposal::SqlProposalStore;
pub use session::SqlSessionStore;

use chrono::{DateTime, Utc};
use millwork_core::StoreError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

pub(crate) fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}

pub(crate) fn parse_opt_ts(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.as_deref().map(parse_ts).transpose()
}

/// JSON column decode. The stored text may itself be a JSON-encoded string
/// (the legacy double-encoding quirk); it is preserved as-is for the
/// pricing decoder rather than flattened here.
pub(crate) fn parse_json(raw: Option<String>) -> Result<Value, RepositoryError> {
    match raw {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(&text)
            .map_err(|error| RepositoryError::Decode(format!("bad json column: {error}"))),
    }
}
