use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "customer",
        "proposal",
        "proposal_session",
        "proposal_order",
        "activity_log",
        "group_multiplier",
        "idx_customer_email",
        "idx_customer_group",
        "idx_proposal_status",
        "idx_proposal_owner_group",
        "idx_proposal_created_by",
        "idx_proposal_customer",
        "idx_proposal_number_date",
        "idx_proposal_session_proposal",
        "idx_proposal_order_proposal",
        "idx_proposal_order_number_date",
        "idx_activity_log_target",
        "idx_activity_log_action",
    ];

    #[tokio::test]
    async fn migrations_create_every_managed_object() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");

        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await
        .expect("schema listing");

        let names: Vec<String> =
            rows.iter().map(|row| row.get::<String, _>("name")).collect();

        for expected in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == expected), "missing schema object {expected}");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent_across_reruns() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
