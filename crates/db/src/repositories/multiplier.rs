use async_trait::async_trait;
use millwork_core::domain::user::GroupId;
use millwork_core::store::{MultiplierSource, StoreError};
use rust_decimal::Decimal;

use super::RepositoryError;
use crate::DbPool;

/// Contractor price multipliers from the pricing-catalog tables. Groups
/// without a row (and ungrouped callers) price at catalog rates.
pub struct SqlMultiplierSource {
    pool: DbPool,
}

impl SqlMultiplierSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MultiplierSource for SqlMultiplierSource {
    async fn multiplier_for(&self, group_id: Option<GroupId>) -> Result<Decimal, StoreError> {
        let Some(group_id) = group_id else {
            return Ok(Decimal::ONE);
        };

        let raw: Option<String> =
            sqlx::query_scalar("SELECT multiplier FROM group_multiplier WHERE group_id = ?")
                .bind(group_id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        match raw {
            None => Ok(Decimal::ONE),
            Some(text) => text.trim().parse().map_err(|_| {
                StoreError::Backend(format!(
                    "group {} has a non-decimal multiplier `{text}`",
                    group_id.0
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use millwork_core::domain::user::GroupId;
    use millwork_core::store::MultiplierSource;
    use rust_decimal::Decimal;

    use super::SqlMultiplierSource;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn unknown_groups_price_at_catalog_rates() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query("INSERT INTO group_multiplier (group_id, multiplier) VALUES (5, '1.25')")
            .execute(&pool)
            .await
            .expect("seed");

        let source = SqlMultiplierSource::new(pool);
        assert_eq!(
            source.multiplier_for(Some(GroupId(5))).await.expect("known"),
            "1.25".parse::<Decimal>().expect("decimal")
        );
        assert_eq!(source.multiplier_for(Some(GroupId(6))).await.expect("unknown"), Decimal::ONE);
        assert_eq!(source.multiplier_for(None).await.expect("ungrouped"), Decimal::ONE);
    }
}
