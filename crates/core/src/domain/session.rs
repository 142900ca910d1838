use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::proposal::ProposalId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

/// Time-boxed, tokenized grant letting an unauthenticated customer view and
/// accept one proposal. Expiry is rechecked at every use, not at issuance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposalSession {
    pub id: SessionId,
    pub proposal_id: ProposalId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_user_id: Option<UserId>,
    pub customer_email: Option<String>,
}

impl ProposalSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub proposal_id: ProposalId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_by_user_id: Option<UserId>,
    pub customer_email: Option<String>,
}

/// URL-safe random token for share links.
pub fn generate_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{generate_token, ProposalSession, SessionId};
    use crate::domain::proposal::ProposalId;

    #[test]
    fn expiry_is_checked_against_the_supplied_clock() {
        let now = Utc::now();
        let session = ProposalSession {
            id: SessionId(1),
            proposal_id: ProposalId(10),
            token: generate_token(),
            expires_at: now + Duration::minutes(5),
            created_by_user_id: None,
            customer_email: None,
        };

        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::minutes(5)));
        assert!(session.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn tokens_are_url_safe_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
