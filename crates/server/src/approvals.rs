//! Reviewer endpoints for high-value disposal proposals.
//!
//! Deciding a proposal wakes every car-return request blocked on it.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use carfleet_core::domain::proposal::{ApprovalProposal, FleetVerdict, HumanDecision, ProposalId};

use crate::error::{application_error, bad_request, correlation_id, ApiError};
use crate::routes::AppState;

const DEFAULT_REVIEWER: &str = "Workshop User";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    pub reason: Option<String>,
    pub approved_by: Option<String>,
    pub decision: Option<String>,
}

impl DecisionBody {
    fn reason_or(&self, fallback: &str) -> String {
        non_blank(self.reason.as_deref()).unwrap_or(fallback).to_string()
    }

    fn reviewer(&self) -> String {
        non_blank(self.approved_by.as_deref()).unwrap_or(DEFAULT_REVIEWER).to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/approvals/pending", get(pending))
        .route("/api/approvals/{proposal_id}", get(get_proposal))
        .route("/api/approvals/{proposal_id}/approve", post(approve))
        .route("/api/approvals/{proposal_id}/reject", post(reject))
        .route("/api/approvals/{proposal_id}/decide", post(decide))
}

pub async fn pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApprovalProposal>>, ApiError> {
    let correlation_id = correlation_id();
    state
        .approvals
        .pending()
        .await
        .map(Json)
        .map_err(|e| application_error(e, "Error listing proposals", &correlation_id))
}

pub async fn get_proposal(
    Path(proposal_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApprovalProposal>, ApiError> {
    let correlation_id = correlation_id();
    state
        .approvals
        .get(&ProposalId(proposal_id))
        .await
        .map(Json)
        .map_err(|e| application_error(e, "Error loading proposal", &correlation_id))
}

pub async fn approve(
    Path(proposal_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalProposal>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let decision = HumanDecision::by_reviewer(
        true,
        body.reason_or("Approved by human reviewer"),
        body.reviewer(),
        None,
    );
    record(&state, proposal_id, decision, "Error processing approval").await
}

pub async fn reject(
    Path(proposal_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalProposal>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let decision = HumanDecision::by_reviewer(
        false,
        body.reason_or("Rejected by human reviewer"),
        body.reviewer(),
        None,
    );
    record(&state, proposal_id, decision, "Error processing rejection").await
}

/// Explicit keep/dispose choice. The choice overrides whatever the proposal
/// recommended; the proposal itself is recorded as approved.
pub async fn decide(
    Path(proposal_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<DecisionBody>>,
) -> Result<Json<ApprovalProposal>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let verdict = match body.decision.as_deref().map(str::parse::<FleetVerdict>) {
        Some(Ok(verdict)) => verdict,
        _ => {
            return Err(bad_request(
                "Decision must be either KEEP_CAR or DISPOSE_CAR",
                &correlation_id(),
            ))
        }
    };
    let reason = format!("{}: {}", verdict.as_str(), body.reason_or("Decision by human reviewer"));
    let decision = HumanDecision::by_reviewer(true, reason, body.reviewer(), Some(verdict));
    record(&state, proposal_id, decision, "Error processing decision").await
}

async fn record(
    state: &AppState,
    proposal_id: String,
    decision: HumanDecision,
    context: &str,
) -> Result<Json<ApprovalProposal>, ApiError> {
    let correlation_id = correlation_id();
    state
        .approvals
        .decide(&ProposalId(proposal_id), decision, &correlation_id)
        .await
        .map(Json)
        .map_err(|e| application_error(e, context, &correlation_id))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        extract::{Path, State},
        http::StatusCode,
        Json,
    };

    use carfleet_core::domain::car::CarNumber;
    use carfleet_core::domain::proposal::{
        DispositionAction, FleetVerdict, ProposalDraft, ProposalId, ProposalStatus,
    };
    use rust_decimal::Decimal;

    use super::{approve, decide, get_proposal, pending, reject, DecisionBody};
    use crate::routes::{test_support, AppState};

    async fn open_proposal(state: &AppState) -> (ProposalId, tokio::task::JoinHandle<bool>) {
        let car = state.cars.get_car(CarNumber(5)).await.expect("car 5");
        let draft = ProposalDraft {
            car,
            estimated_value: Decimal::from(38_000),
            proposed_action: DispositionAction::Sell,
            reasoning: "Flood damage throughout the cabin".to_string(),
            car_condition: "Poor".to_string(),
            rental_feedback: "Car was left in a flood".to_string(),
        };
        let approvals = state.approvals.clone();
        let handle = tokio::spawn(async move {
            approvals.request_and_wait(draft, "corr-test").await.approved
        });

        for _ in 0..200 {
            let listed = pending(State(state.clone())).await.expect("pending").0;
            if let Some(proposal) = listed.into_iter().next() {
                return (proposal.id, handle);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("proposal was never stored");
    }

    #[tokio::test]
    async fn approve_defaults_reason_and_reviewer_and_wakes_the_request() {
        let state = test_support::state(Duration::from_secs(5)).await;
        let (id, waiting) = open_proposal(&state).await;

        let decided =
            approve(Path(id.0.clone()), State(state.clone()), None).await.expect("approve").0;
        assert_eq!(decided.status, ProposalStatus::Approved);
        let decision = decided.decision.expect("decision recorded");
        assert_eq!(decision.reason, "Approved by human reviewer");
        assert_eq!(decision.decided_by, "Workshop User");
        assert!(waiting.await.expect("join"));

        assert!(pending(State(state)).await.expect("pending").0.is_empty());
    }

    #[tokio::test]
    async fn second_decision_is_a_bad_request() {
        let state = test_support::state(Duration::from_secs(5)).await;
        let (id, waiting) = open_proposal(&state).await;

        let body = DecisionBody {
            reason: Some("Repairable".to_string()),
            approved_by: Some("Dana".to_string()),
            decision: None,
        };
        let rejected = reject(Path(id.0.clone()), State(state.clone()), Some(Json(body)))
            .await
            .expect("reject")
            .0;
        assert_eq!(rejected.status, ProposalStatus::Rejected);
        assert_eq!(rejected.decision.as_ref().map(|d| d.decided_by.as_str()), Some("Dana"));
        assert!(!waiting.await.expect("join"));

        let (status, _) =
            approve(Path(id.0), State(state), None).await.expect_err("already decided");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn decide_records_the_explicit_choice() {
        let state = test_support::state(Duration::from_secs(5)).await;
        let (id, waiting) = open_proposal(&state).await;

        let body = DecisionBody {
            reason: Some("Keep it for the winter season".to_string()),
            approved_by: None,
            decision: Some("KEEP_CAR".to_string()),
        };
        let decided = decide(Path(id.0), State(state), Some(Json(body))).await.expect("decide").0;
        let decision = decided.decision.expect("decision recorded");
        assert_eq!(decision.choice, Some(FleetVerdict::KeepCar));
        assert_eq!(decision.reason, "KEEP_CAR: Keep it for the winter season");
        assert!(waiting.await.expect("join"));
    }

    #[tokio::test]
    async fn decide_rejects_unknown_choices() {
        let state = test_support::state(Duration::from_secs(5)).await;
        for choice in ["REPAINT", "keep_car", "Dispose_Car"] {
            let body =
                DecisionBody { decision: Some(choice.to_string()), ..DecisionBody::default() };
            let (status, body) =
                decide(Path("anything".to_string()), State(state.clone()), Some(Json(body)))
                    .await
                    .expect_err("invalid");
            assert_eq!(status, StatusCode::BAD_REQUEST, "{choice} should be refused");
            assert_eq!(body.error, "Decision must be either KEEP_CAR or DISPOSE_CAR");
        }
    }

    #[tokio::test]
    async fn unknown_proposal_is_not_found() {
        let state = test_support::state(Duration::from_secs(1)).await;
        let (status, _) = get_proposal(Path("missing".to_string()), State(state.clone()))
            .await
            .expect_err("missing");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            reject(Path("missing".to_string()), State(state), None).await.expect_err("missing");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
