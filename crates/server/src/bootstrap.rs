use std::sync::Arc;

use millwork_core::config::{AppConfig, ConfigError, LoadOptions};
use millwork_core::{ProposalService, ProposalServiceDeps};
use millwork_db::repositories::{
    SqlAuditSink, SqlCustomerStore, SqlMultiplierSource, SqlOrderStore, SqlProposalStore,
    SqlSessionStore,
};
use millwork_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::events::spawn_listener;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<ProposalService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let events = spawn_listener(db_pool.clone());
    let service = Arc::new(ProposalService::new(
        ProposalServiceDeps {
            proposals: Arc::new(SqlProposalStore::new(db_pool.clone())),
            customers: Arc::new(SqlCustomerStore::new(db_pool.clone())),
            sessions: Arc::new(SqlSessionStore::new(db_pool.clone())),
            orders: Arc::new(SqlOrderStore::new(db_pool.clone())),
            multipliers: Arc::new(SqlMultiplierSource::new(db_pool.clone())),
            audit: Arc::new(SqlAuditSink::new(db_pool.clone())),
            events: Arc::new(events),
        },
        config.sessions.token_ttl_minutes,
    ));

    Ok(Application { config, db_pool, service })
}
