use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use thiserror::Error;

use carfleet_core::domain::car::{CarInfo, CarNumber};
use carfleet_core::domain::proposal::{ApprovalProposal, HumanDecision, ProposalId};
use carfleet_core::errors::ApplicationError;

pub mod car;
pub mod memory;
pub mod proposal;

pub use car::SqlCarRepository;
pub use memory::{InMemoryCarRepository, InMemoryProposalRepository};
pub use proposal::SqlProposalRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) => ApplicationError::Conflict(message),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CarRepository: Send + Sync {
    async fn find_by_number(&self, number: CarNumber) -> Result<Option<CarInfo>, RepositoryError>;
    async fn list(&self) -> Result<Vec<CarInfo>, RepositoryError>;
    async fn save(&self, car: CarInfo) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] when the car already has a pending proposal.
    async fn insert(&self, proposal: ApprovalProposal) -> Result<(), RepositoryError>;
    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ApprovalProposal>, RepositoryError>;
    async fn find_pending_for_car(
        &self,
        car_number: CarNumber,
    ) -> Result<Option<ApprovalProposal>, RepositoryError>;
    async fn list_pending(&self) -> Result<Vec<ApprovalProposal>, RepositoryError>;
    /// Records `decision` only if the proposal is still pending. Returns whether
    /// this call made the change.
    async fn decide_if_pending(
        &self,
        id: &ProposalId,
        decision: &HumanDecision,
    ) -> Result<bool, RepositoryError>;
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}
