use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use carfleet_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use carfleet_core::domain::car::{CarInfo, CarNumber, ReturnFeedback, ReturnSource};
use carfleet_core::domain::conditions::{CarAssignment, CarConditions};
use carfleet_core::errors::ApplicationError;
use carfleet_db::CarRepository;

use crate::workflow::{CarProcessingWorkflow, WorkflowOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOutcome {
    pub car: CarInfo,
    pub conditions: CarConditions,
    pub workflow: WorkflowOutcome,
}

/// Entry point for returned cars: runs the processing workflow and writes the
/// resulting condition and status back to the fleet record.
pub struct CarManagementService {
    cars: Arc<dyn CarRepository>,
    workflow: Arc<CarProcessingWorkflow>,
    audit: Arc<dyn AuditSink>,
}

impl CarManagementService {
    pub fn new(
        cars: Arc<dyn CarRepository>,
        workflow: Arc<CarProcessingWorkflow>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { cars, workflow, audit }
    }

    pub async fn list_cars(&self) -> Result<Vec<CarInfo>, ApplicationError> {
        Ok(self.cars.list().await?)
    }

    pub async fn get_car(&self, number: CarNumber) -> Result<CarInfo, ApplicationError> {
        self.cars
            .find_by_number(number)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("car {number}")))
    }

    pub async fn process_return(
        &self,
        number: CarNumber,
        source: ReturnSource,
        feedback: &str,
        correlation_id: &str,
    ) -> Result<ReturnOutcome, ApplicationError> {
        let mut car = self.get_car(number).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(number),
                correlation_id,
                "car.return_received",
                AuditCategory::Ingress,
                "api",
                AuditOutcome::Success,
            )
            .with_metadata("source", source.as_str()),
        );
        tracing::info!(
            event_name = "car.return_received",
            car_number = number.0,
            source = source.as_str(),
            correlation_id,
            "processing car return"
        );

        let feedback = ReturnFeedback::from_source(source, feedback);
        let workflow = match self.workflow.process(&car, &feedback, correlation_id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(number),
                        correlation_id,
                        "car.return_failed",
                        AuditCategory::Workflow,
                        "system",
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", format!("{error:#}")),
                );
                return Err(ApplicationError::Integration(format!("{error:#}")));
            }
        };

        let conditions = workflow.conditions.clone();
        car.condition = conditions.general_condition.clone();
        car.status = conditions.assignment.status();
        car.disposition_date = match conditions.assignment {
            CarAssignment::Disposition => Some(Utc::now().date_naive()),
            _ => None,
        };
        self.cars.save(car.clone()).await?;

        self.audit.emit(
            AuditEvent::new(
                Some(number),
                correlation_id,
                "car.processed",
                AuditCategory::Workflow,
                "system",
                AuditOutcome::Success,
            )
            .with_metadata("status", car.status.as_key())
            .with_metadata("disposition_status", format!("{:?}", conditions.disposition_status)),
        );
        tracing::info!(
            event_name = "car.processed",
            car_number = number.0,
            status = car.status.as_key(),
            correlation_id,
            "car return processed"
        );

        Ok(ReturnOutcome { car, conditions, workflow })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use carfleet_core::approvals::ApprovalPolicy;
    use carfleet_core::audit::InMemoryAuditSink;
    use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus, ReturnSource};
    use carfleet_core::errors::ApplicationError;
    use carfleet_db::{CarRepository, InMemoryCarRepository, InMemoryProposalRepository};

    use super::CarManagementService;
    use crate::agents::FleetAgents;
    use crate::approval::ApprovalService;
    use crate::llm::OfflineLlmClient;
    use crate::workflow::CarProcessingWorkflow;

    fn fleet() -> Vec<CarInfo> {
        vec![
            CarInfo {
                number: CarNumber(1),
                make: "Toyota".to_string(),
                model: "Corolla".to_string(),
                year: 2020,
                condition: "Good".to_string(),
                status: CarStatus::Rented,
                disposition_date: None,
            },
            CarInfo {
                number: CarNumber(8),
                make: "Nissan".to_string(),
                model: "Altima".to_string(),
                year: 2012,
                condition: "Fair".to_string(),
                status: CarStatus::Rented,
                disposition_date: None,
            },
        ]
    }

    fn service() -> (CarManagementService, Arc<InMemoryCarRepository>, InMemoryAuditSink) {
        let cars = Arc::new(InMemoryCarRepository::with_cars(fleet()));
        let audit = InMemoryAuditSink::default();
        let agents = Arc::new(FleetAgents::new(Arc::new(OfflineLlmClient), 2026).expect("agents"));
        let approvals = Arc::new(ApprovalService::new(
            Arc::new(InMemoryProposalRepository::default()),
            ApprovalPolicy {
                high_value_threshold: Decimal::from(15_000),
                timeout: Duration::from_secs(1),
            },
            Arc::new(audit.clone()),
        ));
        let workflow = Arc::new(CarProcessingWorkflow::new(agents, approvals));
        let service = CarManagementService::new(cars.clone(), workflow, Arc::new(audit.clone()));
        (service, cars, audit)
    }

    #[tokio::test]
    async fn cleaning_return_with_dirty_car_goes_back_to_cleaning() {
        let (service, cars, audit) = service();
        let outcome = service
            .process_return(CarNumber(1), ReturnSource::Cleaning, "Still smells of smoke", "c")
            .await
            .expect("process");
        assert_eq!(outcome.car.status, CarStatus::AtCleaning);

        let stored = cars.find_by_number(CarNumber(1)).await.expect("find").expect("exists");
        assert_eq!(stored.status, CarStatus::AtCleaning);
        assert!(stored.condition.starts_with("Good, needs cleaning"));
        assert_eq!(audit.events_of_type("car.processed").len(), 1);
    }

    #[tokio::test]
    async fn disposed_car_gets_a_disposition_date() {
        let (service, _, _) = service();
        let outcome = service
            .process_return(
                CarNumber(8),
                ReturnSource::Rental,
                "The car is not drivable after a crash",
                "c",
            )
            .await
            .expect("process");
        assert_eq!(outcome.car.status, CarStatus::PendingDisposition);
        assert!(outcome.car.disposition_date.is_some());
    }

    #[tokio::test]
    async fn unknown_car_is_not_found() {
        let (service, _, _) = service();
        let outcome =
            service.process_return(CarNumber(99), ReturnSource::Rental, "fine", "c").await;
        assert!(matches!(outcome, Err(ApplicationError::NotFound(_))));
    }
}
