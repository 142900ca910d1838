use async_trait::async_trait;
use chrono::Utc;
use millwork_core::domain::order::{NewOrder, Order, OrderId};
use millwork_core::domain::proposal::{Acceptor, ProposalId};
use millwork_core::pricing::PricingSnapshot;
use millwork_core::store::{OrderStore, StoreError};
use millwork_core::CustomerId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_ts, ts, RepositoryError};
use crate::numbering::{self, ORDER_PREFIX};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let accepted_by: String = row.try_get("accepted_by")?;
    let snapshot_raw: String = row.try_get("snapshot")?;
    let snapshot: PricingSnapshot = serde_json::from_str(&snapshot_raw)
        .map_err(|error| RepositoryError::Decode(format!("bad order snapshot: {error}")))?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        proposal_id: ProposalId(row.try_get("proposal_id")?),
        customer_id: row.try_get::<Option<i64>, _>("customer_id")?.map(CustomerId),
        order_number: row.try_get("order_number")?,
        accepted_by: Acceptor::from_label(&accepted_by),
        accepted_at: parse_ts(&row.try_get::<String, _>("accepted_at")?)?,
        snapshot,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn create(&self, new: NewOrder) -> Result<Order, StoreError> {
        let snapshot = serde_json::to_string(&new.snapshot)
            .map_err(|error| StoreError::Backend(format!("bad snapshot payload: {error}")))?;

        let now = Utc::now();
        let today = new.accepted_at.date_naive();
        let bucket = numbering::date_bucket(today);

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let max_seq: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(order_number_seq) FROM proposal_order WHERE order_number_date = ?",
        )
        .bind(&bucket)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;
        let seq = max_seq.unwrap_or(0) + 1;
        let number = numbering::format_number(ORDER_PREFIX, seq, today);

        let result = sqlx::query(
            "INSERT INTO proposal_order
                (proposal_id, customer_id, order_number, order_number_date, order_number_seq,
                 accepted_by, accepted_at, snapshot, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.proposal_id.0)
        .bind(new.customer_id.map(|id| id.0))
        .bind(&number)
        .bind(&bucket)
        .bind(seq)
        .bind(new.accepted_by.label())
        .bind(ts(new.accepted_at))
        .bind(&snapshot)
        .bind(ts(now))
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let id = result.last_insert_rowid();
        tx.commit().await.map_err(RepositoryError::from)?;

        let row = sqlx::query("SELECT * FROM proposal_order WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(order_from_row(&row)?)
    }

    async fn find_by_proposal(&self, id: ProposalId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM proposal_order WHERE proposal_id = ? ORDER BY id LIMIT 1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(row.as_ref().map(order_from_row).transpose()?)
    }
}
