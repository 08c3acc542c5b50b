//! Human approval of high-value disposal proposals.
//!
//! A workflow that needs a reviewer persists a proposal and parks on the
//! per-car [`Rendezvous`] slot. A reviewer decision arrives through
//! [`ApprovalService::decide`], which records it with a conditional update
//! and then wakes every workflow parked on that car. The conditional update is
//! the single arbiter: a decision only reaches the waiters if it won there.

use std::sync::Arc;

use chrono::Utc;

use carfleet_core::approvals::{ApprovalPolicy, Registration, Rendezvous, WaitOutcome};
use carfleet_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use carfleet_core::domain::car::CarNumber;
use carfleet_core::domain::proposal::{
    ApprovalProposal, DecisionSource, HumanDecision, ProposalDraft, ProposalId,
};
use carfleet_core::errors::ApplicationError;
use carfleet_db::ProposalRepository;

type ApprovalGate = Rendezvous<CarNumber, ProposalId, HumanDecision>;

pub struct ApprovalService {
    proposals: Arc<dyn ProposalRepository>,
    gate: Arc<ApprovalGate>,
    policy: ApprovalPolicy,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalService {
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        policy: ApprovalPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { proposals, gate: Arc::new(ApprovalGate::new()), policy, audit }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Cars with a workflow currently parked on a reviewer.
    pub fn waiting_cars(&self) -> Vec<(CarNumber, ProposalId)> {
        self.gate.pending()
    }

    /// Parks the caller until a reviewer answers the proposal for this car,
    /// the approval timeout elapses, or the proposal cannot be stored.
    /// Concurrent callers for the same car share one proposal and one outcome.
    pub async fn request_and_wait(
        &self,
        draft: ProposalDraft,
        correlation_id: &str,
    ) -> HumanDecision {
        let car_number = draft.car.number;
        let registration = match self.register(draft, correlation_id).await {
            Ok(registration) => registration,
            Err(error) => {
                tracing::error!(
                    event_name = "approval.register_failed",
                    car_number = car_number.0,
                    correlation_id,
                    error = %error,
                    "could not register approval request"
                );
                return HumanDecision::error_default(error);
            }
        };

        let waiter = registration.into_waiter();
        let proposal_id = waiter.ticket().clone();
        tracing::info!(
            event_name = "approval.waiting",
            car_number = car_number.0,
            proposal_id = %proposal_id,
            correlation_id,
            "waiting for reviewer decision"
        );

        match waiter.wait().await {
            WaitOutcome::Resolved(decision) => decision,
            WaitOutcome::TimedOut => {
                self.apply_timeout(&proposal_id, car_number, correlation_id).await
            }
            WaitOutcome::Abandoned => {
                HumanDecision::error_default(format!("proposal {proposal_id} could not be stored"))
            }
        }
    }

    async fn register(
        &self,
        draft: ProposalDraft,
        correlation_id: &str,
    ) -> Result<Registration<ProposalId, HumanDecision>, ApplicationError> {
        let car_number = draft.car.number;
        if let Some(waiter) = self.gate.join(&car_number) {
            self.emit(
                AuditEvent::new(
                    Some(car_number),
                    correlation_id,
                    "approval.joined",
                    AuditCategory::Approval,
                    "system",
                    AuditOutcome::Success,
                )
                .with_proposal(waiter.ticket().clone()),
            );
            return Ok(Registration::Joined(waiter));
        }

        // A pending row without a slot is left over from an earlier process.
        if let Some(existing) = self.proposals.find_pending_for_car(car_number).await? {
            tracing::info!(
                event_name = "approval.adopted",
                car_number = car_number.0,
                proposal_id = %existing.id,
                "resuming wait on stored pending proposal"
            );
            return Ok(self.gate.open_or_join(car_number, existing.id, self.policy.timeout));
        }

        let proposal = ApprovalProposal::from_draft(ProposalId::generate(), draft, Utc::now());
        let registration =
            self.gate.open_or_join(car_number, proposal.id.clone(), self.policy.timeout);
        if registration.is_opened() {
            self.emit(
                AuditEvent::new(
                    Some(car_number),
                    correlation_id,
                    "approval.requested",
                    AuditCategory::Approval,
                    "system",
                    AuditOutcome::Success,
                )
                .with_proposal(proposal.id.clone())
                .with_metadata("proposed_action", proposal.proposed_action.as_key())
                .with_metadata("estimated_value", proposal.estimated_value.to_string()),
            );
            self.spawn_insert(proposal);
        }
        Ok(registration)
    }

    /// Stores the proposal off the waiting path. A failed insert abandons the
    /// slot so every waiter wakes with the error default.
    fn spawn_insert(&self, proposal: ApprovalProposal) {
        let proposals = Arc::clone(&self.proposals);
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move {
            let car_number = proposal.car_number;
            let proposal_id = proposal.id.clone();
            if let Err(error) = proposals.insert(proposal).await {
                tracing::error!(
                    event_name = "approval.insert_failed",
                    car_number = car_number.0,
                    proposal_id = %proposal_id,
                    error = %error,
                    "failed to store proposal"
                );
                if gate.ticket(&car_number).as_ref() == Some(&proposal_id) {
                    gate.abandon(&car_number);
                }
            }
        });
    }

    async fn apply_timeout(
        &self,
        proposal_id: &ProposalId,
        car_number: CarNumber,
        correlation_id: &str,
    ) -> HumanDecision {
        let default = HumanDecision::timeout_default(self.policy.timeout);
        match self.decide(proposal_id, default.clone(), correlation_id).await {
            Ok(_) => {
                self.emit(
                    AuditEvent::new(
                        Some(car_number),
                        correlation_id,
                        "approval.timed_out",
                        AuditCategory::Approval,
                        "system",
                        AuditOutcome::Rejected,
                    )
                    .with_proposal(proposal_id.clone()),
                );
                tracing::warn!(
                    event_name = "approval.timed_out",
                    car_number = car_number.0,
                    proposal_id = %proposal_id,
                    timeout_secs = self.policy.timeout.as_secs(),
                    "no reviewer decision; recorded default rejection"
                );
                default
            }
            // Someone else decided first: a reviewer at the last moment or a
            // sibling waiter recording the same timeout.
            Err(ApplicationError::Conflict(_)) => {
                match self.proposals.find_by_id(proposal_id).await {
                    Ok(Some(ApprovalProposal { decision: Some(decision), .. })) => decision,
                    _ => default,
                }
            }
            Err(ApplicationError::NotFound(_)) => {
                self.gate.abandon(&car_number);
                default
            }
            Err(error) => {
                tracing::error!(
                    event_name = "approval.timeout_record_failed",
                    car_number = car_number.0,
                    proposal_id = %proposal_id,
                    error = %error,
                    "failed to record timeout decision"
                );
                default
            }
        }
    }

    /// Records a decision for a pending proposal and wakes its waiters.
    ///
    /// Unknown ids are `NotFound`. Proposals that are no longer pending, or
    /// that another decision reached first, are `Conflict`.
    pub async fn decide(
        &self,
        proposal_id: &ProposalId,
        decision: HumanDecision,
        correlation_id: &str,
    ) -> Result<ApprovalProposal, ApplicationError> {
        let proposal = self.get(proposal_id).await?;
        if !proposal.is_pending() {
            return Err(ApplicationError::Conflict(format!(
                "proposal {proposal_id} is already {}",
                proposal.status.as_key()
            )));
        }

        if !self.proposals.decide_if_pending(proposal_id, &decision).await? {
            return Err(ApplicationError::Conflict(format!(
                "proposal {proposal_id} was decided concurrently"
            )));
        }

        let stored = self.proposals.find_by_id(proposal_id).await?.ok_or_else(|| {
            ApplicationError::Persistence(format!("proposal {proposal_id} vanished after decision"))
        })?;

        let car_number = proposal.car_number;
        let woken = if self.gate.ticket(&car_number).as_ref() == Some(proposal_id) {
            self.gate.resolve(&car_number, decision.clone()).unwrap_or_default()
        } else {
            0
        };

        let outcome =
            if decision.approved { AuditOutcome::Success } else { AuditOutcome::Rejected };
        let actor = match decision.source {
            DecisionSource::Human => decision.decided_by.clone(),
            DecisionSource::Timeout | DecisionSource::Error => "system".to_string(),
        };
        self.emit(
            AuditEvent::new(
                Some(car_number),
                correlation_id,
                "approval.decided",
                AuditCategory::Approval,
                actor,
                outcome,
            )
            .with_proposal(proposal_id.clone())
            .with_metadata("source", decision.source.as_key())
            .with_metadata("waiters", woken.to_string()),
        );
        tracing::info!(
            event_name = "approval.decided",
            car_number = car_number.0,
            proposal_id = %proposal_id,
            approved = decision.approved,
            decided_by = %decision.decided_by,
            waiters = woken,
            correlation_id,
            "proposal decided"
        );

        Ok(stored)
    }

    pub async fn pending(&self) -> Result<Vec<ApprovalProposal>, ApplicationError> {
        Ok(self.proposals.list_pending().await?)
    }

    pub async fn get(
        &self,
        proposal_id: &ProposalId,
    ) -> Result<ApprovalProposal, ApplicationError> {
        self.proposals
            .find_by_id(proposal_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("proposal {proposal_id}")))
    }

    pub async fn pending_for_car(
        &self,
        car_number: CarNumber,
    ) -> Result<Option<ApprovalProposal>, ApplicationError> {
        Ok(self.proposals.find_pending_for_car(car_number).await?)
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }
}
