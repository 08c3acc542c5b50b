use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use carfleet_core::domain::car::CarNumber;
use carfleet_core::domain::proposal::{
    ApprovalProposal, DecisionSource, FleetVerdict, HumanDecision, ProposalId, ProposalStatus,
};

use super::{column, ProposalRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProposalRepository {
    pool: DbPool,
}

impl SqlProposalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{field} `{value}`: {e}")))
}

fn row_to_proposal(row: &SqliteRow) -> Result<ApprovalProposal, RepositoryError> {
    let decode = |e: carfleet_core::DomainError| RepositoryError::Decode(e.to_string());

    let estimated_value: String = column(row, "estimated_value")?;
    let estimated_value = estimated_value
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("estimated_value: {e}")))?;
    let proposed_action: String = column(row, "proposed_action")?;
    let status: String = column(row, "status")?;
    let status = ProposalStatus::parse_key(&status).map_err(decode)?;
    let created_at: String = column(row, "created_at")?;

    let decision = if status == ProposalStatus::Pending {
        None
    } else {
        let decided_at: Option<String> = column(row, "decided_at")?;
        let decided_at = decided_at
            .ok_or_else(|| RepositoryError::Decode("decided proposal has no decided_at".into()))?;
        let choice: Option<String> = column(row, "decision_choice")?;
        let source: Option<String> = column(row, "decision_source")?;
        let reason: Option<String> = column(row, "decision_reason")?;
        let decided_by: Option<String> = column(row, "decided_by")?;
        Some(HumanDecision {
            approved: status == ProposalStatus::Approved,
            reason: reason.unwrap_or_default(),
            decided_by: decided_by.unwrap_or_default(),
            decided_at: parse_timestamp("decided_at", &decided_at)?,
            choice: choice.map(|value| value.parse::<FleetVerdict>()).transpose().map_err(decode)?,
            source: source
                .map(|value| DecisionSource::parse_key(&value))
                .transpose()
                .map_err(decode)?
                .unwrap_or(DecisionSource::Human),
        })
    };

    Ok(ApprovalProposal {
        id: ProposalId(column(row, "id")?),
        car_number: CarNumber(column(row, "car_number")?),
        car_make: column(row, "car_make")?,
        car_model: column(row, "car_model")?,
        car_year: column(row, "car_year")?,
        estimated_value,
        proposed_action: proposed_action.parse().map_err(decode)?,
        reasoning: column(row, "reasoning")?,
        car_condition: column(row, "car_condition")?,
        rental_feedback: column(row, "rental_feedback")?,
        status,
        decision,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl ProposalRepository for SqlProposalRepository {
    async fn insert(&self, proposal: ApprovalProposal) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO approval_proposal (id, car_number, car_make, car_model, car_year,
                                            estimated_value, proposed_action, reasoning,
                                            car_condition, rental_feedback, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&proposal.id.0)
        .bind(proposal.car_number.0)
        .bind(&proposal.car_make)
        .bind(&proposal.car_model)
        .bind(proposal.car_year)
        .bind(proposal.estimated_value.to_string())
        .bind(proposal.proposed_action.as_key())
        .bind(&proposal.reasoning)
        .bind(&proposal.car_condition)
        .bind(&proposal.rental_feedback)
        .bind(proposal.status.as_key())
        .bind(proposal.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::Conflict(format!(
                    "car {} already has a pending proposal",
                    proposal.car_number
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find_by_id(
        &self,
        id: &ProposalId,
    ) -> Result<Option<ApprovalProposal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM approval_proposal WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn find_pending_for_car(
        &self,
        car_number: CarNumber,
    ) -> Result<Option<ApprovalProposal>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM approval_proposal WHERE car_number = ? AND status = 'pending'",
        )
        .bind(car_number.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalProposal>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_proposal WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_proposal).collect()
    }

    async fn decide_if_pending(
        &self,
        id: &ProposalId,
        decision: &HumanDecision,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE approval_proposal
             SET status = ?, decision_reason = ?, decided_by = ?, decision_choice = ?,
                 decision_source = ?, decided_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(decision.status().as_key())
        .bind(&decision.reason)
        .bind(&decision.decided_by)
        .bind(decision.choice.map(FleetVerdict::as_str))
        .bind(decision.source.as_key())
        .bind(decision.decided_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
