//! Deterministic demo/e2e fixtures covering the three lifecycle stages a
//! fresh environment needs: an editable draft, a sent proposal with a live
//! share session, and an accepted, locked proposal with its frozen order.

use crate::repositories::RepositoryError;
use crate::DbPool;

const SEED_SQL: &str = r#"
INSERT INTO customer (id, name, email, mobile, address, group_id, is_deleted, created_at, updated_at) VALUES
    (9001, 'Harbor Homes LLC', 'estimating@harborhomes.example', NULL, '12 Wharf Rd', 41, 0,
     '2026-01-05T09:00:00+00:00', '2026-01-05T09:00:00+00:00'),
    (9002, 'Dana Whitfield', 'dana@whitfield.example', NULL, NULL, NULL, 0,
     '2026-01-06T10:30:00+00:00', '2026-01-06T10:30:00+00:00');

INSERT INTO group_multiplier (group_id, multiplier) VALUES (41, '1.15');

INSERT INTO proposal
    (id, proposal_number, proposal_number_date, proposal_number_seq, customer_id, description,
     status, kind, is_locked, is_deleted, manufacturers_data, owner_group_id, created_by_user_id,
     designer, date, sent_at, accepted_at, accepted_by, created_at, updated_at) VALUES
    (9101, 'MWQ-001-010726', '2026-01-07', 1, 9001, 'Galley kitchen refresh',
     'Draft', 0, 0, 0,
     '[{"manufacturerName":"Artisan Casework","styleName":"Shaker Moss","items":[{"name":"B12","price":171,"quantity":1,"assemblyFee":100,"modifications":[{"name":"Depth reduction","cost":130}]}],"summary":{"deliveryFee":200,"taxRate":6.67}}]',
     41, 501, NULL, '2026-01-07T08:00:00+00:00', NULL, NULL, NULL,
     '2026-01-07T08:00:00+00:00', '2026-01-07T08:00:00+00:00'),
    (9102, 'MWQ-002-010726', '2026-01-07', 2, 9002, 'Walnut island build',
     'sent', 0, 0, 0,
     '"[{\"manufacturerName\":\"Coastal Millhouse\",\"styleName\":\"Flat Slab\",\"items\":[{\"name\":\"ISL36\",\"price\":420,\"quantity\":1}],\"summary\":{\"deliveryFee\":150,\"taxRate\":6.67}}]"',
     NULL, 1, NULL, '2026-01-07T09:00:00+00:00', '2026-01-08T12:00:00+00:00', NULL, NULL,
     '2026-01-07T09:00:00+00:00', '2026-01-08T12:00:00+00:00'),
    (9103, 'MWQ-003-010726', '2026-01-07', 3, 9001, 'Mudroom built-ins',
     'accepted', 0, 1, 0,
     '[{"manufacturerName":"Artisan Casework","styleName":"Shaker Moss","items":[{"name":"T24","price":260,"quantity":2}],"summary":{"deliveryFee":0,"taxRate":0}}]',
     41, 501, NULL, '2026-01-07T10:00:00+00:00', '2026-01-09T08:00:00+00:00',
     '2026-01-12T15:45:00+00:00', '501',
     '2026-01-07T10:00:00+00:00', '2026-01-12T15:45:00+00:00');

INSERT INTO proposal_session
    (id, proposal_id, token, expires_at, created_by_user_id, customer_email, created_at) VALUES
    (9201, 9102, 'seed-share-token-walnut-island-01', '2027-01-01T00:00:00+00:00', 1,
     'dana@whitfield.example', '2026-01-08T12:00:00+00:00');

INSERT INTO proposal_order
    (id, proposal_id, customer_id, order_number, order_number_date, order_number_seq,
     accepted_by, accepted_at, snapshot, created_at) VALUES
    (9301, 9103, 9001, 'MW-001-011226', '2026-01-12', 1, '501', '2026-01-12T15:45:00+00:00',
     '{"styles":[{"manufacturerName":"Artisan Casework","styleName":"Shaker Moss","cabinets":"598.00","assemblyFee":"0.00","modificationsCost":"0.00","styleTotal":"598.00","discountAmount":"0.00","total":"598.00","taxRate":"0","taxAmount":"0.00","deliveryFee":"0.00","grandTotal":"598.00"}],"subtotal":"598.00","taxAmount":"0.00","deliveryFee":"0.00","grandTotal":"598.00"}',
     '2026-01-12T15:45:00+00:00');

INSERT INTO activity_log (actor_user_id, actor_label, action, target_type, target_id, diff, occurred_at) VALUES
    (501, NULL, 'proposal.create', 'Proposal', 9101, NULL, '2026-01-07T08:00:00+00:00'),
    (1, NULL, 'proposal.send.share', 'Proposal', 9102, NULL, '2026-01-08T12:00:00+00:00'),
    (501, NULL, 'proposal.accept', 'Proposal', 9103, NULL, '2026-01-12T15:45:00+00:00');
"#;

pub struct SeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedVerification {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl SeedDataset {
    pub async fn load(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query(SEED_SQL).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn verify(pool: &DbPool) -> Result<SeedVerification, RepositoryError> {
        let mut checks = Vec::new();

        let customers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer WHERE id IN (9001, 9002)")
                .fetch_one(pool)
                .await?;
        checks.push(("customers", customers == 2));

        let proposals: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposal WHERE id IN (9101, 9102, 9103) AND is_deleted = 0",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("proposals", proposals == 3));

        let locked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposal WHERE id = 9103 AND is_locked = 1 AND status = 'accepted'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("accepted_proposal_locked", locked == 1));

        let session: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM proposal_session WHERE proposal_id = 9102",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("share_session", session == 1));

        let order: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM proposal_order WHERE proposal_id = 9103")
                .fetch_one(pool)
                .await?;
        checks.push(("order_snapshot", order == 1));

        let activity: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM activity_log WHERE target_id IN (9101, 9102, 9103)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("activity_entries", activity == 3));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(SeedVerification { all_present, checks })
    }
}
