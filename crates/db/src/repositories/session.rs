use async_trait::async_trait;
use chrono::Utc;
use millwork_core::domain::proposal::ProposalId;
use millwork_core::domain::session::{NewSession, ProposalSession, SessionId};
use millwork_core::domain::user::UserId;
use millwork_core::store::{SessionStore, StoreError};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_ts, ts, RepositoryError};
use crate::DbPool;

pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &SqliteRow) -> Result<ProposalSession, RepositoryError> {
    Ok(ProposalSession {
        id: SessionId(row.try_get("id")?),
        proposal_id: ProposalId(row.try_get("proposal_id")?),
        token: row.try_get("token")?,
        expires_at: parse_ts(&row.try_get::<String, _>("expires_at")?)?,
        created_by_user_id: row.try_get::<Option<i64>, _>("created_by_user_id")?.map(UserId),
        customer_email: row.try_get("customer_email")?,
    })
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<ProposalSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM proposal_session WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    async fn create(&self, new: NewSession) -> Result<ProposalSession, StoreError> {
        let result = sqlx::query(
            "INSERT INTO proposal_session
                (proposal_id, token, expires_at, created_by_user_id, customer_email, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new.proposal_id.0)
        .bind(&new.token)
        .bind(ts(new.expires_at))
        .bind(new.created_by_user_id.map(|id| id.0))
        .bind(&new.customer_email)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let row = sqlx::query("SELECT * FROM proposal_session WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(session_from_row(&row)?)
    }
}
