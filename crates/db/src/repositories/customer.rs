use async_trait::async_trait;
use chrono::Utc;
use millwork_core::domain::customer::{Customer, CustomerId, NewCustomer};
use millwork_core::domain::user::GroupId;
use millwork_core::store::{CustomerStore, StoreError};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{ts, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerStore {
    pool: DbPool,
}

impl SqlCustomerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        mobile: row.try_get("mobile")?,
        address: row.try_get("address")?,
        group_id: row.try_get::<Option<i64>, _>("group_id")?.map(GroupId),
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait]
impl CustomerStore for SqlCustomerStore {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT * FROM customer WHERE id = ? AND is_deleted = 0")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(row.as_ref().map(customer_from_row).transpose()?)
    }

    async fn find_by_email(
        &self,
        email: &str,
        group_id: Option<GroupId>,
    ) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM customer
             WHERE is_deleted = 0 AND LOWER(email) = LOWER(?) AND group_id IS ?
             ORDER BY id LIMIT 1",
        )
        .bind(email)
        .bind(group_id.map(|id| id.0))
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(row.as_ref().map(customer_from_row).transpose()?)
    }

    async fn create(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        let now = ts(Utc::now());
        let result = sqlx::query(
            "INSERT INTO customer (name, email, group_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.group_id.map(|id| id.0))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let id = CustomerId(result.last_insert_rowid());
        self.find(id)
            .await?
            .ok_or_else(|| StoreError::Backend("created customer is not readable".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use millwork_core::domain::customer::NewCustomer;
    use millwork_core::domain::user::GroupId;
    use millwork_core::store::CustomerStore;

    use super::SqlCustomerStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlCustomerStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCustomerStore::new(pool)
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive_and_tenancy_scoped() {
        let store = store().await;
        store
            .create(NewCustomer {
                name: "Jane".to_owned(),
                email: Some("jane@example.com".to_owned()),
                group_id: Some(GroupId(5)),
            })
            .await
            .expect("create");

        let found = store
            .find_by_email("JANE@Example.COM", Some(GroupId(5)))
            .await
            .expect("lookup");
        assert!(found.is_some());

        let other_group = store.find_by_email("jane@example.com", Some(GroupId(6))).await.expect("lookup");
        assert!(other_group.is_none());

        let ungrouped = store.find_by_email("jane@example.com", None).await.expect("lookup");
        assert!(ungrouped.is_none(), "ungrouped scope must not see contractor customers");
    }
}
