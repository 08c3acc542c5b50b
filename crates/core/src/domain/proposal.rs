use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::car::{CarInfo, CarNumber};
use crate::errors::DomainError;

pub const TIMEOUT_ACTOR: &str = "System (Timeout)";
pub const ERROR_ACTOR: &str = "System (Error)";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub String);

impl ProposalId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("PROP-{}", raw[..12].to_ascii_uppercase()))
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse_key(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown proposal status `{other}`")))
            }
        }
    }
}

/// What the fleet should do with a car that may leave service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispositionAction {
    Scrap,
    Sell,
    Donate,
    Keep,
}

impl DispositionAction {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Scrap => "SCRAP",
            Self::Sell => "SELL",
            Self::Donate => "DONATE",
            Self::Keep => "KEEP",
        }
    }

    pub fn verdict(self) -> FleetVerdict {
        match self {
            Self::Keep => FleetVerdict::KeepCar,
            Self::Scrap | Self::Sell | Self::Donate => FleetVerdict::DisposeCar,
        }
    }
}

impl FromStr for DispositionAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_matches('_').to_ascii_uppercase().as_str() {
            "SCRAP" => Ok(Self::Scrap),
            "SELL" => Ok(Self::Sell),
            "DONATE" => Ok(Self::Donate),
            "KEEP" => Ok(Self::Keep),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown disposition action `{other}` (expected SCRAP|SELL|DONATE|KEEP)"
            ))),
        }
    }
}

/// Final keep-or-dispose call for a car whose disposition was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FleetVerdict {
    KeepCar,
    DisposeCar,
}

impl FleetVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeepCar => "KEEP_CAR",
            Self::DisposeCar => "DISPOSE_CAR",
        }
    }
}

impl FromStr for FleetVerdict {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "KEEP_CAR" => Ok(Self::KeepCar),
            "DISPOSE_CAR" => Ok(Self::DisposeCar),
            other => Err(DomainError::InvariantViolation(format!(
                "decision must be KEEP_CAR or DISPOSE_CAR, got `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Human,
    Timeout,
    Error,
}

impl DecisionSource {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }

    pub fn parse_key(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "timeout" => Ok(Self::Timeout),
            "error" => Ok(Self::Error),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown decision source `{other}`")))
            }
        }
    }
}

/// The outcome a paused workflow observes when its approval gate opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanDecision {
    pub approved: bool,
    pub reason: String,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    /// Explicit keep/dispose choice made by the reviewer, overriding the proposal.
    pub choice: Option<FleetVerdict>,
    pub source: DecisionSource,
}

impl HumanDecision {
    pub fn by_reviewer(
        approved: bool,
        reason: impl Into<String>,
        decided_by: impl Into<String>,
        choice: Option<FleetVerdict>,
    ) -> Self {
        Self {
            approved,
            reason: reason.into(),
            decided_by: decided_by.into(),
            decided_at: Utc::now(),
            choice,
            source: DecisionSource::Human,
        }
    }

    pub fn timeout_default(timeout: Duration) -> Self {
        Self {
            approved: false,
            reason: format!(
                "No reviewer decision within {}s; disposal rejected by default",
                timeout.as_secs()
            ),
            decided_by: TIMEOUT_ACTOR.to_string(),
            decided_at: Utc::now(),
            choice: None,
            source: DecisionSource::Timeout,
        }
    }

    pub fn error_default(message: impl fmt::Display) -> Self {
        Self {
            approved: false,
            reason: format!("Approval could not be completed: {message}"),
            decided_by: ERROR_ACTOR.to_string(),
            decided_at: Utc::now(),
            choice: None,
            source: DecisionSource::Error,
        }
    }

    pub fn status(&self) -> ProposalStatus {
        if self.approved {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Rejected
        }
    }

    /// Text block handed back to the supervising agent.
    pub fn render_for_agent(&self) -> String {
        let mut rendered = format!(
            "Human Decision: {}\nReason: {}\nApproved By: {}\nDecision Time: {}",
            self.status().as_key().to_ascii_uppercase(),
            self.reason,
            self.decided_by,
            self.decided_at.to_rfc3339(),
        );
        if let Some(choice) = self.choice {
            rendered.push_str(&format!("\nRequested Action: {}", choice.as_str()));
        }
        rendered
    }
}

/// Input for opening a proposal. Snapshot of the car at the time of the request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub car: CarInfo,
    pub estimated_value: Decimal,
    pub proposed_action: DispositionAction,
    pub reasoning: String,
    pub car_condition: String,
    pub rental_feedback: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalProposal {
    pub id: ProposalId,
    pub car_number: CarNumber,
    pub car_make: String,
    pub car_model: String,
    pub car_year: i32,
    pub estimated_value: Decimal,
    pub proposed_action: DispositionAction,
    pub reasoning: String,
    pub car_condition: String,
    pub rental_feedback: String,
    pub status: ProposalStatus,
    pub decision: Option<HumanDecision>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalProposal {
    pub fn from_draft(id: ProposalId, draft: ProposalDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            car_number: draft.car.number,
            car_make: draft.car.make,
            car_model: draft.car.model,
            car_year: draft.car.year,
            estimated_value: draft.estimated_value,
            proposed_action: draft.proposed_action,
            reasoning: draft.reasoning,
            car_condition: draft.car_condition,
            rental_feedback: draft.rental_feedback,
            status: ProposalStatus::Pending,
            decision: None,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self.status, next),
            (ProposalStatus::Pending, ProposalStatus::Approved)
                | (ProposalStatus::Pending, ProposalStatus::Rejected)
        )
    }

    pub fn apply_decision(&mut self, decision: HumanDecision) -> Result<(), DomainError> {
        let next = decision.status();
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidProposalTransition { from: self.status, to: next });
        }
        self.status = next;
        self.decision = Some(decision);
        Ok(())
    }

    /// Verdict the proposal argues for, before any human input.
    pub fn proposed_verdict(&self) -> FleetVerdict {
        self.proposed_action.verdict()
    }
}
