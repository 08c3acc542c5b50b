use std::sync::Arc;

use chrono::Datelike;
use thiserror::Error;
use tracing::info;

use carfleet_agent::{
    client_from_config, ApprovalService, CarManagementService, CarProcessingWorkflow, FleetAgents,
};
use carfleet_core::approvals::{ApprovalPolicy, HumanInputService};
use carfleet_core::audit::TracingAuditSink;
use carfleet_core::config::{AppConfig, ConfigError, LoadOptions};
use carfleet_db::{
    connect_with_settings, migrations, DbPool, FleetSeed, RepositoryError, SqlCarRepository,
    SqlProposalRepository,
};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("fleet seed failed: {0}")]
    Seed(#[source] RepositoryError),
    #[error("agent setup failed: {0}")]
    Agents(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let seeded = FleetSeed::load(&db_pool).await.map_err(BootstrapError::Seed)?;
    info!(
        event_name = "system.bootstrap.fleet_seeded",
        correlation_id = "bootstrap",
        cars_inserted = seeded.cars_inserted,
        fleet_size = seeded.fleet_size,
        "demo fleet loaded"
    );

    let state = build_state(&config, db_pool.clone())?;
    Ok(Application { config, db_pool, state })
}

fn build_state(config: &AppConfig, db_pool: DbPool) -> Result<AppState, BootstrapError> {
    let audit = Arc::new(TracingAuditSink);
    let llm = client_from_config(&config.llm).map_err(BootstrapError::Agents)?;
    let agents = FleetAgents::new(llm, chrono::Utc::now().year()).map_err(BootstrapError::Agents)?;

    let approvals = Arc::new(ApprovalService::new(
        Arc::new(SqlProposalRepository::new(db_pool.clone())),
        ApprovalPolicy::from(&config.approval),
        audit.clone(),
    ));
    let workflow = Arc::new(CarProcessingWorkflow::new(Arc::new(agents), Arc::clone(&approvals)));
    let cars =
        Arc::new(CarManagementService::new(
            Arc::new(SqlCarRepository::new(db_pool)),
            workflow,
            audit,
        ));

    Ok(AppState { cars, approvals, human_input: Arc::new(HumanInputService::new()) })
}
