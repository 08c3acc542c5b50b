use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use carfleet_core::domain::car::{CarInfo, CarNumber};
use carfleet_core::domain::proposal::{ApprovalProposal, HumanDecision, ProposalId};

use super::{CarRepository, ProposalRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCarRepository {
    cars: RwLock<BTreeMap<CarNumber, CarInfo>>,
}

impl InMemoryCarRepository {
    pub fn with_cars(cars: impl IntoIterator<Item = CarInfo>) -> Self {
        Self { cars: RwLock::new(cars.into_iter().map(|car| (car.number, car)).collect()) }
    }
}

#[async_trait::async_trait]
impl CarRepository for InMemoryCarRepository {
    async fn find_by_number(&self, number: CarNumber) -> Result<Option<CarInfo>, RepositoryError> {
        let cars = self.cars.read().await;
        Ok(cars.get(&number).cloned())
    }

    async fn list(&self) -> Result<Vec<CarInfo>, RepositoryError> {
        let cars = self.cars.read().await;
        Ok(cars.values().cloned().collect())
    }

    async fn save(&self, car: CarInfo) -> Result<(), RepositoryError> {
        let mut cars = self.cars.write().await;
        cars.insert(car.number, car);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<HashMap<String, ApprovalProposal>>,
}

#[async_trait::async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn insert(&self, proposal: ApprovalProposal) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        let car_busy = proposals
            .values()
            .any(|existing| existing.car_number == proposal.car_number && existing.is_pending());
        if car_busy {
            return Err(RepositoryError::Conflict(format!(
                "car {} already has a pending proposal",
                proposal.car_number
            )));
        }
        proposals.insert(proposal.id.0.clone(), proposal);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ApprovalProposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.get(&id.0).cloned())
    }

    async fn find_pending_for_car(
        &self,
        car_number: CarNumber,
    ) -> Result<Option<ApprovalProposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals
            .values()
            .find(|proposal| proposal.car_number == car_number && proposal.is_pending())
            .cloned())
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalProposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        let mut pending: Vec<_> =
            proposals.values().filter(|proposal| proposal.is_pending()).cloned().collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn decide_if_pending(
        &self,
        id: &ProposalId,
        decision: &HumanDecision,
    ) -> Result<bool, RepositoryError> {
        let mut proposals = self.proposals.write().await;
        match proposals.get_mut(&id.0) {
            Some(proposal) => Ok(proposal.apply_decision(decision.clone()).is_ok()),
            None => Ok(false),
        }
    }
}
