use async_trait::async_trait;
use chrono::Utc;
use millwork_core::domain::proposal::{
    Acceptance, Acceptor, NewProposal, Proposal, ProposalId, ProposalKind, ProposalPatch,
};
use millwork_core::domain::user::{GroupId, UserId};
use millwork_core::scoping::ListScope;
use millwork_core::status::ProposalStatus;
use millwork_core::store::{ProposalFilter, ProposalStore, StoreError};
use millwork_core::CustomerId;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row};

use super::{parse_json, parse_opt_ts, parse_ts, ts, RepositoryError};
use crate::numbering::{self, PROPOSAL_PREFIX};
use crate::DbPool;

pub struct SqlProposalStore {
    pool: DbPool,
}

impl SqlProposalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM proposal WHERE id = ? AND is_deleted = 0")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(proposal_from_row).transpose()
    }
}

fn proposal_from_row(row: &SqliteRow) -> Result<Proposal, RepositoryError> {
    let accepted_by: Option<String> = row.try_get("accepted_by")?;
    Ok(Proposal {
        id: ProposalId(row.try_get("id")?),
        proposal_number: row.try_get("proposal_number")?,
        customer_id: row.try_get::<Option<i64>, _>("customer_id")?.map(CustomerId),
        description: row.try_get("description")?,
        status: row.try_get("status")?,
        kind: ProposalKind::from_i64(row.try_get("kind")?),
        is_locked: row.try_get("is_locked")?,
        is_deleted: row.try_get("is_deleted")?,
        manufacturers_data: parse_json(row.try_get("manufacturers_data")?)?,
        owner_group_id: row.try_get::<Option<i64>, _>("owner_group_id")?.map(GroupId),
        created_by_user_id: row.try_get::<Option<i64>, _>("created_by_user_id")?.map(UserId),
        designer: row.try_get::<Option<i64>, _>("designer")?.map(UserId),
        location: row.try_get("location")?,
        sales_rep: row.try_get("sales_rep")?,
        lead_source: row.try_get("lead_source")?,
        manufacturer_id: row.try_get("manufacturer_id")?,
        date: parse_opt_ts(row.try_get("date")?)?,
        sent_at: parse_opt_ts(row.try_get("sent_at")?)?,
        accepted_at: parse_opt_ts(row.try_get("accepted_at")?)?,
        accepted_by: accepted_by.map(|raw| Acceptor::from_label(&raw)),
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn json_column(value: &Value) -> Result<Option<String>, RepositoryError> {
    match value {
        Value::Null => Ok(None),
        other => serde_json::to_string(other)
            .map(Some)
            .map_err(|error| RepositoryError::Decode(format!("bad json payload: {error}"))),
    }
}

#[async_trait]
impl ProposalStore for SqlProposalStore {
    async fn find(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        Ok(self.fetch(id).await?)
    }

    async fn list(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT * FROM proposal WHERE is_deleted = 0");

        if let Some(kind) = filter.kind {
            builder.push(" AND kind = ");
            builder.push_bind(kind.as_i64());
        }

        match filter.scope {
            ListScope::Unrestricted => {}
            ListScope::GroupOnly { group_id } => {
                builder.push(" AND owner_group_id = ");
                builder.push_bind(group_id.0);
            }
            ListScope::Group { group_id, creator_fallback } => {
                builder.push(" AND (owner_group_id = ");
                builder.push_bind(group_id.0);
                builder.push(" OR (owner_group_id IS NULL AND created_by_user_id = ");
                builder.push_bind(creator_fallback.0);
                builder.push("))");
            }
            ListScope::Creator { user_id } => {
                builder.push(" AND created_by_user_id = ");
                builder.push_bind(user_id.0);
            }
        }

        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        let proposals = rows
            .iter()
            .map(proposal_from_row)
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        Ok(proposals)
    }

    async fn create(&self, new: NewProposal) -> Result<Proposal, StoreError> {
        let now = Utc::now();
        let today = now.date_naive();
        let bucket = numbering::date_bucket(today);
        let blob = json_column(&new.manufacturers_data)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let max_seq: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(proposal_number_seq) FROM proposal WHERE proposal_number_date = ?",
        )
        .bind(&bucket)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;
        let seq = max_seq.unwrap_or(0) + 1;
        let number = numbering::format_number(PROPOSAL_PREFIX, seq, today);

        let result = sqlx::query(
            "INSERT INTO proposal
                (proposal_number, proposal_number_date, proposal_number_seq,
                 customer_id, description, status, kind, manufacturers_data,
                 owner_group_id, created_by_user_id, designer, location,
                 sales_rep, lead_source, manufacturer_id, date,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&number)
        .bind(&bucket)
        .bind(seq)
        .bind(new.customer_id.map(|id| id.0))
        .bind(&new.description)
        .bind(&new.status)
        .bind(new.kind.as_i64())
        .bind(&blob)
        .bind(new.owner_group_id.map(|id| id.0))
        .bind(new.created_by_user_id.map(|id| id.0))
        .bind(new.designer.map(|id| id.0))
        .bind(&new.location)
        .bind(&new.sales_rep)
        .bind(&new.lead_source)
        .bind(new.manufacturer_id)
        .bind(ts(new.date))
        .bind(ts(now))
        .bind(ts(now))
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let id = ProposalId(result.last_insert_rowid());
        tx.commit().await.map_err(RepositoryError::from)?;

        self.fetch(id)
            .await?
            .ok_or_else(|| StoreError::Backend("created proposal is not readable".to_owned()))
    }

    async fn update(&self, id: ProposalId, patch: ProposalPatch) -> Result<Proposal, StoreError> {
        let blob = json_column(&patch.manufacturers_data)?;
        let result = sqlx::query(
            "UPDATE proposal SET
                customer_id = ?,
                description = ?,
                status = ?,
                manufacturers_data = ?,
                location = ?,
                sales_rep = ?,
                lead_source = ?,
                manufacturer_id = ?,
                date = ?,
                designer = COALESCE(?, designer),
                sent_at = COALESCE(?, sent_at),
                accepted_at = COALESCE(?, accepted_at),
                accepted_by = COALESCE(?, accepted_by),
                is_locked = COALESCE(?, is_locked),
                updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(patch.customer_id.map(|id| id.0))
        .bind(&patch.description)
        .bind(&patch.status)
        .bind(&blob)
        .bind(&patch.location)
        .bind(&patch.sales_rep)
        .bind(&patch.lead_source)
        .bind(patch.manufacturer_id)
        .bind(ts(patch.date))
        .bind(patch.designer.map(|id| id.0))
        .bind(patch.sent_at.map(ts))
        .bind(patch.accepted_at.map(ts))
        .bind(patch.accepted_by.as_ref().map(Acceptor::label))
        .bind(patch.is_locked)
        .bind(ts(Utc::now()))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.fetch(id)
            .await?
            .ok_or_else(|| StoreError::Backend("updated proposal is not readable".to_owned()))
    }

    /// The double-accept guard: one conditional update, applied only while
    /// the row is still unlocked and canonically `sent`. Zero rows affected
    /// means a concurrent accept already won.
    async fn accept_if_sent(
        &self,
        id: ProposalId,
        acceptance: Acceptance,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE proposal SET
                status = ?,
                accepted_at = ?,
                accepted_by = ?,
                is_locked = 1,
                updated_at = ?
             WHERE id = ?
               AND is_deleted = 0
               AND is_locked = 0
               AND LOWER(TRIM(status)) IN ('sent', 'proposal sent')",
        )
        .bind(ProposalStatus::Accepted.label())
        .bind(ts(acceptance.accepted_at))
        .bind(acceptance.accepted_by.label())
        .bind(ts(Utc::now()))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(&self, id: ProposalId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE proposal SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(ts(Utc::now()))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
