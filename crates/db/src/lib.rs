pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{FleetSeed, SeedResult, VerificationResult};
pub use repositories::{
    CarRepository, InMemoryCarRepository, InMemoryProposalRepository, ProposalRepository,
    RepositoryError, SqlCarRepository, SqlProposalRepository,
};
