use std::sync::Arc;

use axum::Router;

use carfleet_agent::{ApprovalService, CarManagementService};
use carfleet_core::approvals::HumanInputService;

use crate::{approvals, car_management, cars, human_input};

#[derive(Clone)]
pub struct AppState {
    pub cars: Arc<CarManagementService>,
    pub approvals: Arc<ApprovalService>,
    pub human_input: Arc<HumanInputService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(cars::router())
        .merge(car_management::router())
        .merge(approvals::router())
        .merge(human_input::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use carfleet_agent::{
        CarManagementService, CarProcessingWorkflow, FleetAgents, OfflineLlmClient,
    };
    use carfleet_agent::ApprovalService;
    use carfleet_core::approvals::{ApprovalPolicy, HumanInputService};
    use carfleet_core::audit::InMemoryAuditSink;
    use carfleet_db::{
        connect_with_settings, migrations, FleetSeed, SqlCarRepository, SqlProposalRepository,
    };

    use super::AppState;

    /// Seeded in-memory database with the offline model behind every agent.
    pub async fn state(approval_timeout: Duration) -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        FleetSeed::load(&pool).await.expect("seed fleet");

        let audit = Arc::new(InMemoryAuditSink::default());
        let approvals = Arc::new(ApprovalService::new(
            Arc::new(SqlProposalRepository::new(pool.clone())),
            ApprovalPolicy {
                high_value_threshold: Decimal::from(15_000),
                timeout: approval_timeout,
            },
            audit.clone(),
        ));
        let agents = Arc::new(FleetAgents::new(Arc::new(OfflineLlmClient), 2026).expect("agents"));
        let workflow = Arc::new(CarProcessingWorkflow::new(agents, Arc::clone(&approvals)));
        let cars = Arc::new(CarManagementService::new(
            Arc::new(SqlCarRepository::new(pool)),
            workflow,
            audit,
        ));
        AppState { cars, approvals, human_input: Arc::new(HumanInputService::new()) }
    }
}
