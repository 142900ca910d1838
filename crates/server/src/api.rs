//! Proposal API routes.
//!
//! Endpoints:
//! - `POST   /api/proposals`                  — create from `{action, formData}`
//! - `GET    /api/proposals`                  — scoped listing (`kind`, `group_id`)
//! - `GET    /api/proposals/{id}`             — scoped single read
//! - `PUT    /api/proposals/{id}`             — update with `{action, formData}`
//! - `POST   /api/proposals/{id}/status`      — narrow status/action change
//! - `POST   /api/proposals/{id}/accept`      — acceptance pipeline
//! - `POST   /api/proposals/{id}/sessions`    — issue a share-link session
//! - `DELETE /api/proposals/{id}`             — soft delete
//! - `GET    /api/public/proposals/{token}`   — token-gated reduced read, no auth
//!
//! The (out-of-scope) gateway authenticates callers and forwards the user
//! context as an `x-millwork-user` JSON header; handlers stay thin and all
//! policy lives in the lifecycle service.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use millwork_core::{
    AcceptOutcome, AcceptRequest, AuthUser, GroupId, Proposal, ProposalAction, ProposalForm,
    ProposalId, ProposalKind, ProposalService, PublicProposal, ServiceError, StatusChange,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

pub const USER_HEADER: &str = "x-millwork-user";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ProposalService>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data: Some(data), message: None })
    }

    fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, data: None, message: Some(message.into()) })
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse<Value>>);

fn from_service_error(err: ServiceError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match &err {
        ServiceError::Internal(detail) => {
            error!(event_name = "api.internal_error", error = %detail, "request failed");
            "an internal error occurred".to_owned()
        }
        other => other.to_string(),
    };
    (status, Json(ApiResponse { success: false, data: None, message: Some(message) }))
}

fn unauthenticated(message: &str) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse { success: false, data: None, message: Some(message.to_owned()) }),
    )
}

/// Identity installed by the gateway. Absent header → 401 on protected
/// routes; a present but malformed header is always a 401.
fn optional_user(headers: &HeaderMap) -> Result<Option<AuthUser>, ApiError> {
    let Some(raw) = headers.get(USER_HEADER) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| unauthenticated("user context header is not valid text"))?;
    let user = serde_json::from_str(raw)
        .map_err(|_| unauthenticated("user context header is not valid JSON"))?;
    Ok(Some(user))
}

fn require_user(headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    optional_user(headers)?.ok_or_else(|| unauthenticated("authentication required"))
}

#[derive(Debug, Default, Deserialize)]
pub struct MutationBody {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(rename = "formData", default)]
    pub form_data: ProposalForm,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
    pub group_id: Option<i64>,
}

fn parse_kind(raw: Option<&str>) -> Result<Option<ProposalKind>, ApiError> {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(None),
        Some("quote") | Some("0") => Ok(Some(ProposalKind::Quote)),
        Some("contract") | Some("1") => Ok(Some(ProposalKind::Contract)),
        Some(other) => Err(from_service_error(ServiceError::Validation(format!(
            "unknown proposal kind `{other}`"
        )))),
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub token: String,
    pub expires_at: String,
}

pub fn router(service: Arc<ProposalService>) -> Router {
    Router::new()
        .route("/api/proposals", post(create_proposal))
        .route("/api/proposals", get(list_proposals))
        .route("/api/proposals/{id}", get(get_proposal))
        .route("/api/proposals/{id}", put(update_proposal))
        .route("/api/proposals/{id}", delete(delete_proposal))
        .route("/api/proposals/{id}/status", post(update_status))
        .route("/api/proposals/{id}/accept", post(accept_proposal))
        .route("/api/proposals/{id}/sessions", post(create_session))
        .route("/api/public/proposals/{token}", get(public_proposal))
        .with_state(ApiState { service })
}

async fn create_proposal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<MutationBody>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let user = require_user(&headers)?;
    let proposal =
        state.service.create(body.form_data, &user).await.map_err(from_service_error)?;
    Ok(ApiResponse::ok(proposal))
}

async fn list_proposals(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Proposal>>>, ApiError> {
    let user = require_user(&headers)?;
    let kind = parse_kind(query.kind.as_deref())?;
    let proposals = state
        .service
        .list(&user, kind, query.group_id.map(GroupId))
        .await
        .map_err(from_service_error)?;
    Ok(ApiResponse::ok(proposals))
}

async fn get_proposal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let user = require_user(&headers)?;
    let proposal =
        state.service.get(ProposalId(id), &user).await.map_err(from_service_error)?;
    Ok(ApiResponse::ok(proposal))
}

async fn update_proposal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<MutationBody>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let user = require_user(&headers)?;
    let action = body.action.as_deref().map(ProposalAction::parse).unwrap_or_default();
    let proposal = state
        .service
        .update(ProposalId(id), body.form_data, action, &user)
        .await
        .map_err(from_service_error)?;
    Ok(ApiResponse::ok(proposal))
}

async fn update_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<ApiResponse<Proposal>>, ApiError> {
    let user = require_user(&headers)?;
    let proposal = state
        .service
        .update_status(ProposalId(id), change, &user)
        .await
        .map_err(from_service_error)?;
    Ok(ApiResponse::ok(proposal))
}

async fn accept_proposal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<ApiResponse<AcceptOutcome>>, ApiError> {
    let user = optional_user(&headers)?;
    let outcome = state
        .service
        .accept(ProposalId(id), request, user.as_ref())
        .await
        .map_err(from_service_error)?;
    Ok(ApiResponse::ok(outcome))
}

async fn delete_proposal(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let user = require_user(&headers)?;
    state.service.delete(ProposalId(id), &user).await.map_err(from_service_error)?;
    Ok(ApiResponse::message("proposal deleted"))
}

async fn create_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let user = require_user(&headers)?;
    let session = state
        .service
        .create_session(ProposalId(id), &user)
        .await
        .map_err(from_service_error)?;
    Ok(ApiResponse::ok(SessionResponse {
        id: session.id.0,
        token: session.token,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

async fn public_proposal(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<PublicProposal>>, ApiError> {
    let public =
        state.service.get_public_by_token(&token).await.map_err(from_service_error)?;
    Ok(ApiResponse::ok(public))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::Json;
    use chrono::{Duration, Utc};
    use millwork_core::events::NoopPublisher;
    use millwork_core::{
        AcceptRequest, ProposalForm, ProposalService, ProposalServiceDeps, StatusChange,
    };
    use millwork_db::repositories::{
        SqlAuditSink, SqlCustomerStore, SqlMultiplierSource, SqlOrderStore, SqlProposalStore,
        SqlSessionStore,
    };
    use millwork_db::{connect_with_settings, migrations, DbPool};
    use serde_json::json;

    use super::{
        accept_proposal, create_proposal, create_session, get_proposal, list_proposals,
        public_proposal, update_proposal, update_status, ApiState, MutationBody, USER_HEADER,
    };

    async fn setup() -> (DbPool, State<ApiState>) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let service = Arc::new(ProposalService::new(
            ProposalServiceDeps {
                proposals: Arc::new(SqlProposalStore::new(pool.clone())),
                customers: Arc::new(SqlCustomerStore::new(pool.clone())),
                sessions: Arc::new(SqlSessionStore::new(pool.clone())),
                orders: Arc::new(SqlOrderStore::new(pool.clone())),
                multipliers: Arc::new(SqlMultiplierSource::new(pool.clone())),
                audit: Arc::new(SqlAuditSink::new(pool.clone())),
                events: Arc::new(NoopPublisher),
            },
            60,
        ));

        (pool.clone(), State(ApiState { service }))
    }

    fn headers_for(payload: serde_json::Value) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_HEADER,
            HeaderValue::from_str(&payload.to_string()).expect("header value"),
        );
        headers
    }

    fn admin_headers() -> HeaderMap {
        headers_for(json!({"id": 1, "name": "Back Office", "role": "admin"}))
    }

    fn contractor_headers(id: i64, group: i64) -> HeaderMap {
        headers_for(json!({
            "id": id,
            "name": format!("Contractor {id}"),
            "group_id": group,
            "group_type": "contractor",
        }))
    }

    fn kitchen_body(action: Option<&str>) -> MutationBody {
        let form: ProposalForm = serde_json::from_value(json!({
            "customerName": "Test Customer",
            "customerEmail": "customer@example.com",
            "description": "Kitchen remodel",
            "manufacturersData": [{
                "manufacturerName": "Artisan Casework",
                "styleName": "Shaker Moss",
                "items": [{
                    "name": "B12", "price": 171, "quantity": 1, "assemblyFee": 100,
                    "modifications": [{"name": "Depth reduction", "cost": 130}]
                }],
                "summary": {"deliveryFee": 200, "taxRate": 6.67}
            }]
        }))
        .expect("form");
        MutationBody { action: action.map(str::to_owned), form_data: form }
    }

    #[tokio::test]
    async fn missing_user_header_is_unauthorized() {
        let (_pool, state) = setup().await;
        let result =
            create_proposal(state, HeaderMap::new(), Json(kitchen_body(None))).await;
        let (status, body) = result.expect_err("no identity");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.0.success);
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (_pool, state) = setup().await;

        let created =
            create_proposal(state.clone(), admin_headers(), Json(kitchen_body(None)))
                .await
                .expect("create")
                .0
                .data
                .expect("payload");
        assert_eq!(created.status, "Draft");

        let fetched = get_proposal(state, admin_headers(), Path(created.id.0))
            .await
            .expect("get")
            .0
            .data
            .expect("payload");
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.description.as_deref(), Some("Kitchen remodel"));
    }

    #[tokio::test]
    async fn contractors_cannot_read_foreign_proposals() {
        let (_pool, state) = setup().await;

        let created = create_proposal(
            state.clone(),
            contractor_headers(7, 5),
            Json(kitchen_body(None)),
        )
        .await
        .expect("create")
        .0
        .data
        .expect("payload");

        let (status, body) =
            get_proposal(state, contractor_headers(9, 6), Path(created.id.0))
                .await
                .expect_err("foreign contractor");
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.0.message.expect("message").contains("access"));
    }

    #[tokio::test]
    async fn full_lifecycle_create_send_accept() {
        let (pool, state) = setup().await;

        let created =
            create_proposal(state.clone(), admin_headers(), Json(kitchen_body(None)))
                .await
                .expect("create")
                .0
                .data
                .expect("payload");

        update_status(
            state.clone(),
            admin_headers(),
            Path(created.id.0),
            Json(StatusChange { action: Some("send".to_owned()), status: None }),
        )
        .await
        .expect("send");

        let outcome = accept_proposal(
            state.clone(),
            admin_headers(),
            Path(created.id.0),
            Json(AcceptRequest::default()),
        )
        .await
        .expect("accept")
        .0
        .data
        .expect("payload");

        assert!(outcome.proposal.is_locked);
        assert_eq!(outcome.order.snapshot.grand_total, outcome.event.total);

        let orders: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM proposal_order WHERE proposal_id = ?")
                .bind(created.id.0)
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(orders, 1);

        // Second accept: already accepted.
        let (status, body) = accept_proposal(
            state,
            admin_headers(),
            Path(created.id.0),
            Json(AcceptRequest::default()),
        )
        .await
        .expect_err("double accept");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.message.expect("message").contains("already accepted"));
    }

    #[tokio::test]
    async fn locked_proposals_refuse_updates_with_a_distinct_message() {
        let (_pool, state) = setup().await;

        let created =
            create_proposal(state.clone(), admin_headers(), Json(kitchen_body(None)))
                .await
                .expect("create")
                .0
                .data
                .expect("payload");
        update_status(
            state.clone(),
            admin_headers(),
            Path(created.id.0),
            Json(StatusChange { action: Some("send".to_owned()), status: None }),
        )
        .await
        .expect("send");
        accept_proposal(
            state.clone(),
            admin_headers(),
            Path(created.id.0),
            Json(AcceptRequest::default()),
        )
        .await
        .expect("accept");

        let (status, body) = update_proposal(
            state,
            admin_headers(),
            Path(created.id.0),
            Json(kitchen_body(None)),
        )
        .await
        .expect_err("locked");
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.0.message.expect("message").contains("locked"));
    }

    #[tokio::test]
    async fn share_session_enables_public_read_and_external_accept() {
        let (_pool, state) = setup().await;

        let created =
            create_proposal(state.clone(), admin_headers(), Json(kitchen_body(None)))
                .await
                .expect("create")
                .0
                .data
                .expect("payload");

        let session = create_session(state.clone(), admin_headers(), Path(created.id.0))
            .await
            .expect("session")
            .0
            .data
            .expect("payload");

        let public = public_proposal(state.clone(), Path(session.token.clone()))
            .await
            .expect("public read")
            .0
            .data
            .expect("payload");
        assert_eq!(public.status, "sent", "share link marks drafts sent");

        let outcome = accept_proposal(
            state,
            HeaderMap::new(),
            Path(created.id.0),
            Json(AcceptRequest { session_token: Some(session.token), ..AcceptRequest::default() }),
        )
        .await
        .expect("external accept")
        .0
        .data
        .expect("payload");
        assert!(outcome.event.is_external_acceptance);
    }

    #[tokio::test]
    async fn expired_session_tokens_are_unauthorized_everywhere() {
        let (pool, state) = setup().await;

        let created =
            create_proposal(state.clone(), admin_headers(), Json(kitchen_body(None)))
                .await
                .expect("create")
                .0
                .data
                .expect("payload");
        update_status(
            state.clone(),
            admin_headers(),
            Path(created.id.0),
            Json(StatusChange { action: Some("send".to_owned()), status: None }),
        )
        .await
        .expect("send");

        let expired_at = (Utc::now() - Duration::minutes(1)).to_rfc3339();
        sqlx::query(
            "INSERT INTO proposal_session (proposal_id, token, expires_at, created_at)
             VALUES (?, 'expired-token', ?, ?)",
        )
        .bind(created.id.0)
        .bind(&expired_at)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .expect("seed expired session");

        let (status, _) = public_proposal(state.clone(), Path("expired-token".to_owned()))
            .await
            .expect_err("expired public read");
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = accept_proposal(
            state,
            HeaderMap::new(),
            Path(created.id.0),
            Json(AcceptRequest {
                session_token: Some("expired-token".to_owned()),
                ..AcceptRequest::default()
            }),
        )
        .await
        .expect_err("expired accept");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_is_scoped_per_tenant() {
        let (_pool, state) = setup().await;

        create_proposal(state.clone(), contractor_headers(7, 5), Json(kitchen_body(None)))
            .await
            .expect("mine");
        create_proposal(state.clone(), contractor_headers(9, 6), Json(kitchen_body(None)))
            .await
            .expect("other");

        let mine = list_proposals(
            state.clone(),
            contractor_headers(7, 5),
            Query(super::ListQuery::default()),
        )
        .await
        .expect("list")
        .0
        .data
        .expect("payload");
        assert_eq!(mine.len(), 1);

        let all = list_proposals(state, admin_headers(), Query(super::ListQuery::default()))
            .await
            .expect("admin list")
            .0
            .data
            .expect("payload");
        assert_eq!(all.len(), 2);
    }
}
