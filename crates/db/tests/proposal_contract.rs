//! Both proposal stores must behave the same way under the approval gate.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus};
use carfleet_core::domain::proposal::{
    ApprovalProposal, DispositionAction, HumanDecision, ProposalDraft, ProposalId,
};
use carfleet_db::{
    connect_with_settings, migrations, CarRepository, FleetSeed, InMemoryProposalRepository,
    ProposalRepository, RepositoryError, SqlCarRepository, SqlProposalRepository,
};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

fn draft_for(car: CarInfo) -> ProposalDraft {
    ProposalDraft {
        car,
        estimated_value: Decimal::from(52_000),
        proposed_action: DispositionAction::Scrap,
        reasoning: "Structural damage".to_string(),
        car_condition: "Frame bent".to_string(),
        rental_feedback: "car was totaled in a collision".to_string(),
    }
}

async fn sql_store() -> ContractResult<(Arc<dyn ProposalRepository>, CarInfo)> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    FleetSeed::load(&pool).await.map_err(|e| e.to_string())?;
    let car = SqlCarRepository::new(pool.clone())
        .find_by_number(CarNumber(5))
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "seed car 5 missing".to_string())?;
    Ok((Arc::new(SqlProposalRepository::new(pool)), car))
}

fn memory_store() -> (Arc<dyn ProposalRepository>, CarInfo) {
    let car = CarInfo {
        number: CarNumber(5),
        make: "BMW".to_string(),
        model: "X5".to_string(),
        year: 2022,
        condition: "Excellent".to_string(),
        status: CarStatus::Rented,
        disposition_date: None,
    };
    (Arc::new(InMemoryProposalRepository::default()), car)
}

async fn concurrent_decisions_have_one_winner(
    repo: Arc<dyn ProposalRepository>,
    car: CarInfo,
) -> ContractResult {
    let proposal = ApprovalProposal::from_draft(ProposalId::generate(), draft_for(car), Utc::now());
    let id = proposal.id.clone();
    repo.insert(proposal).await.map_err(|e| e.to_string())?;

    let mut handles = Vec::new();
    for reviewer in 0..8 {
        let repo = Arc::clone(&repo);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let decision = HumanDecision::by_reviewer(
                reviewer % 2 == 0,
                format!("reviewer {reviewer}"),
                format!("reviewer-{reviewer}"),
                None,
            );
            repo.decide_if_pending(&id, &decision).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        let decided = handle.await.map_err(|e| e.to_string())?.map_err(|e| e.to_string())?;
        if decided {
            winners += 1;
        }
    }
    require!(winners == 1, "expected exactly one accepted decision, got {winners}");

    let stored = repo
        .find_by_id(&id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "proposal vanished".to_string())?;
    require!(!stored.is_pending());
    require!(stored.decision.is_some());
    Ok(())
}

async fn duplicate_pending_is_a_conflict(
    repo: Arc<dyn ProposalRepository>,
    car: CarInfo,
) -> ContractResult {
    let first =
        ApprovalProposal::from_draft(ProposalId::generate(), draft_for(car.clone()), Utc::now());
    let second = ApprovalProposal::from_draft(ProposalId::generate(), draft_for(car), Utc::now());
    repo.insert(first).await.map_err(|e| e.to_string())?;

    let outcome = repo.insert(second).await;
    require!(
        matches!(outcome, Err(RepositoryError::Conflict(_))),
        "second pending proposal should conflict, got {outcome:?}"
    );
    let pending = repo.list_pending().await.map_err(|e| e.to_string())?;
    require!(pending.len() == 1, "expected one pending proposal, got {}", pending.len());
    Ok(())
}

#[tokio::test]
async fn sql_store_accepts_one_of_many_concurrent_decisions() -> ContractResult {
    let (repo, car) = sql_store().await?;
    concurrent_decisions_have_one_winner(repo, car).await
}

#[tokio::test]
async fn memory_store_accepts_one_of_many_concurrent_decisions() -> ContractResult {
    let (repo, car) = memory_store();
    concurrent_decisions_have_one_winner(repo, car).await
}

#[tokio::test]
async fn sql_store_rejects_duplicate_pending_proposal() -> ContractResult {
    let (repo, car) = sql_store().await?;
    duplicate_pending_is_a_conflict(repo, car).await
}

#[tokio::test]
async fn memory_store_rejects_duplicate_pending_proposal() -> ContractResult {
    let (repo, car) = memory_store();
    duplicate_pending_is_a_conflict(repo, car).await
}
