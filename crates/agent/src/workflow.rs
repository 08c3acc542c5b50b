use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use carfleet_core::approvals::ApprovalPolicy;
use carfleet_core::domain::car::{CarInfo, ReturnFeedback};
use carfleet_core::domain::conditions::{ApprovalOutcome, CarConditions};
use carfleet_core::domain::proposal::{DispositionAction, FleetVerdict, HumanDecision};
use carfleet_core::flows::{
    determine_assignment, disposition_required, is_required, resolve_verdict, OutcomeInputs,
};

use crate::agents::FleetAgents;
use crate::approval::ApprovalService;
use crate::tools::{
    CleaningTool, DispositionTool, HumanApprovalTool, MaintenanceTool, ToolRegistry,
    CLEANING_TOOL, DISPOSITION_TOOL, HUMAN_APPROVAL_TOOL, MAINTENANCE_TOOL,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnalysis {
    pub cleaning_request: String,
    pub maintenance_request: String,
    pub disposition_request: String,
}

impl FeedbackAnalysis {
    pub fn nothing_required() -> Self {
        Self {
            cleaning_request: "CLEANING_NOT_REQUIRED".to_string(),
            maintenance_request: "MAINTENANCE_NOT_REQUIRED".to_string(),
            disposition_request: "DISPOSITION_NOT_REQUIRED".to_string(),
        }
    }

    pub fn needs_cleaning(&self) -> bool {
        is_required(&self.cleaning_request)
    }

    pub fn needs_maintenance(&self) -> bool {
        is_required(&self.maintenance_request)
    }

    pub fn needs_disposition(&self) -> bool {
        disposition_required(&self.disposition_request)
    }
}

/// Runs the three feedback analyzers side by side.
pub struct FeedbackWorkflow {
    agents: Arc<FleetAgents>,
}

impl FeedbackWorkflow {
    pub fn new(agents: Arc<FleetAgents>) -> Self {
        Self { agents }
    }

    pub async fn analyze(&self, car: &CarInfo, feedback: &str) -> Result<FeedbackAnalysis> {
        if feedback.trim().is_empty() {
            return Ok(FeedbackAnalysis::nothing_required());
        }

        let (cleaning, maintenance, disposition) = tokio::join!(
            self.agents.analyze_cleaning(car, feedback),
            self.agents.analyze_maintenance(car, feedback),
            self.agents.analyze_disposition(car, feedback),
        );
        Ok(FeedbackAnalysis {
            cleaning_request: cleaning.context("cleaning analyzer")?,
            maintenance_request: maintenance.context("maintenance analyzer")?,
            disposition_request: disposition.context("disposition analyzer")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool: String,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorDecision {
    /// `None` when nobody asked for the car to leave the fleet.
    pub verdict: Option<FleetVerdict>,
    pub approval: ApprovalOutcome,
    pub estimated_value: Option<Decimal>,
    pub proposed_action: Option<DispositionAction>,
    pub human_decision: Option<HumanDecision>,
    pub disposition_reason: Option<String>,
    pub actions: Vec<ToolInvocation>,
}

/// Routes analyzed feedback to the action tools. Disposal of a car worth more
/// than the policy threshold goes through a human reviewer first.
pub struct FleetSupervisor {
    agents: Arc<FleetAgents>,
    tools: ToolRegistry,
    policy: ApprovalPolicy,
}

impl FleetSupervisor {
    pub fn new(agents: Arc<FleetAgents>, approvals: Arc<ApprovalService>) -> Self {
        let policy = approvals.policy().clone();
        let mut tools = ToolRegistry::default();
        tools.register(CleaningTool);
        tools.register(MaintenanceTool);
        tools.register(DispositionTool);
        tools.register(HumanApprovalTool::new(approvals));
        Self { agents, tools, policy }
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    async fn run_tool(&self, name: &str, input: Value) -> Result<ToolInvocation> {
        let output = self.tools.invoke(name, input).await?;
        let summary = output["summary"].as_str().unwrap_or_default().to_string();
        Ok(ToolInvocation { tool: name.to_string(), summary })
    }

    async fn service_kept_car(
        &self,
        car: &CarInfo,
        analysis: &FeedbackAnalysis,
        after_rejected_disposal: bool,
        actions: &mut Vec<ToolInvocation>,
    ) -> Result<()> {
        if analysis.needs_maintenance() {
            let input = json!({ "car": car, "request": analysis.maintenance_request });
            actions.push(self.run_tool(MAINTENANCE_TOOL, input).await?);
        } else if after_rejected_disposal {
            let request =
                format!("Inspection after a rejected disposal: {}", analysis.disposition_request);
            let input = json!({ "car": car, "request": request });
            actions.push(self.run_tool(MAINTENANCE_TOOL, input).await?);
        }
        if analysis.needs_cleaning() {
            let input = json!({ "car": car, "request": analysis.cleaning_request });
            actions.push(self.run_tool(CLEANING_TOOL, input).await?);
        }
        Ok(())
    }

    pub async fn supervise(
        &self,
        car: &CarInfo,
        feedback: &str,
        analysis: &FeedbackAnalysis,
        correlation_id: &str,
    ) -> Result<SupervisorDecision> {
        let mut actions = Vec::new();

        if !analysis.needs_disposition() {
            self.service_kept_car(car, analysis, false, &mut actions).await?;
            return Ok(SupervisorDecision {
                verdict: None,
                approval: ApprovalOutcome::NotRequired,
                estimated_value: None,
                proposed_action: None,
                human_decision: None,
                disposition_reason: None,
                actions,
            });
        }

        let estimate = self.agents.estimate_value(car, feedback).await.context("pricing agent")?;
        tracing::info!(
            event_name = "supervisor.priced",
            car_number = car.number.0,
            estimated_value = %estimate.value,
            threshold = %self.policy.high_value_threshold,
            correlation_id,
            "disposition requested; car priced"
        );

        let request = analysis.disposition_request.as_str();
        let (verdict, approval, action, reasoning, human_decision) = if self
            .policy
            .requires_human_approval(estimate.value)
        {
            let proposal = self
                .agents
                .propose_disposition(car, feedback, estimate.value, request)
                .await
                .context("disposition proposal agent")?;
            let input = json!({
                "car": car,
                "estimated_value": estimate.value,
                "proposed_action": proposal.action,
                "reasoning": proposal.reasoning,
                "car_condition": car.condition,
                "rental_feedback": feedback,
                "correlation_id": correlation_id,
            });
            let output = self.tools.invoke(HUMAN_APPROVAL_TOOL, input).await?;
            let decision: HumanDecision = serde_json::from_value(output["decision"].clone())
                .context("approval tool returned no decision")?;
            actions.push(ToolInvocation {
                tool: HUMAN_APPROVAL_TOOL.to_string(),
                summary: decision.render_for_agent(),
            });
            let (verdict, approval) = resolve_verdict(proposal.action.verdict(), &decision);
            let reasoning = format!("{} Reviewer: {}", proposal.reasoning, decision.reason);
            (verdict, approval, proposal.action, reasoning, Some(decision))
        } else {
            let choice = self
                .agents
                .choose_disposition(car, feedback, estimate.value, request)
                .await
                .context("disposition agent")?;
            let verdict = choice.action.verdict();
            (verdict, ApprovalOutcome::NotRequired, choice.action, choice.reasoning, None)
        };

        match verdict {
            FleetVerdict::DisposeCar => {
                // Only an explicit DISPOSE_CAR choice disposes of a car proposed for keeping;
                // the disposal method then comes from the disposition agent.
                let disposal = if action == DispositionAction::Keep {
                    self.agents
                        .choose_disposition(car, feedback, estimate.value, request)
                        .await
                        .context("disposition agent")?
                        .action
                } else {
                    action
                };
                let input = json!({ "car": car, "action": disposal, "reason": reasoning });
                actions.push(self.run_tool(DISPOSITION_TOOL, input).await?);
            }
            FleetVerdict::KeepCar => {
                let rejected = approval == ApprovalOutcome::Rejected;
                self.service_kept_car(car, analysis, rejected, &mut actions).await?;
            }
        }

        Ok(SupervisorDecision {
            verdict: Some(verdict),
            approval,
            estimated_value: Some(estimate.value),
            proposed_action: Some(action),
            human_decision,
            disposition_reason: Some(reasoning),
            actions,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub conditions: CarConditions,
    pub analysis: FeedbackAnalysis,
    pub supervisor: SupervisorDecision,
}

/// Feedback analysis, then supervision, then the condition summary.
pub struct CarProcessingWorkflow {
    agents: Arc<FleetAgents>,
    feedback: FeedbackWorkflow,
    supervisor: FleetSupervisor,
}

impl CarProcessingWorkflow {
    pub fn new(agents: Arc<FleetAgents>, approvals: Arc<ApprovalService>) -> Self {
        Self {
            feedback: FeedbackWorkflow::new(Arc::clone(&agents)),
            supervisor: FleetSupervisor::new(Arc::clone(&agents), approvals),
            agents,
        }
    }

    pub fn supervisor(&self) -> &FleetSupervisor {
        &self.supervisor
    }

    pub async fn process(
        &self,
        car: &CarInfo,
        feedback: &ReturnFeedback,
        correlation_id: &str,
    ) -> Result<WorkflowOutcome> {
        let text = feedback.combined();
        let analysis = self.feedback.analyze(car, &text).await?;
        tracing::info!(
            event_name = "workflow.analyzed",
            car_number = car.number.0,
            cleaning = analysis.needs_cleaning(),
            maintenance = analysis.needs_maintenance(),
            disposition = analysis.needs_disposition(),
            correlation_id,
            "feedback analyzed"
        );

        let supervisor = self.supervisor.supervise(car, &text, &analysis, correlation_id).await?;

        let assignment = determine_assignment(&OutcomeInputs {
            cleaning_request: &analysis.cleaning_request,
            maintenance_request: &analysis.maintenance_request,
            disposition_request: &analysis.disposition_request,
            verdict: supervisor.verdict,
            approval: supervisor.approval,
        });
        let general_condition = self
            .agents
            .summarize_condition(car, &text, assignment.status().label())
            .await
            .context("condition summary agent")?;

        let conditions = CarConditions {
            general_condition,
            assignment,
            disposition_status: supervisor.approval,
            disposition_reason: supervisor.disposition_reason.clone(),
        };
        Ok(WorkflowOutcome { conditions, analysis, supervisor })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use carfleet_core::approvals::ApprovalPolicy;
    use carfleet_core::audit::InMemoryAuditSink;
    use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus, ReturnFeedback, ReturnSource};
    use carfleet_core::domain::conditions::{ApprovalOutcome, CarAssignment};
    use carfleet_core::domain::proposal::{
        DecisionSource, DispositionAction, FleetVerdict, HumanDecision,
    };
    use carfleet_db::InMemoryProposalRepository;

    use super::CarProcessingWorkflow;
    use crate::agents::FleetAgents;
    use crate::approval::ApprovalService;
    use crate::llm::OfflineLlmClient;

    fn car(number: i64, make: &str, model: &str, year: i32) -> CarInfo {
        CarInfo {
            number: CarNumber(number),
            make: make.to_string(),
            model: model.to_string(),
            year,
            condition: "Good".to_string(),
            status: CarStatus::Rented,
            disposition_date: None,
        }
    }

    fn setup(timeout: Duration) -> (Arc<CarProcessingWorkflow>, Arc<ApprovalService>) {
        let agents = Arc::new(FleetAgents::new(Arc::new(OfflineLlmClient), 2026).expect("agents"));
        let approvals = Arc::new(ApprovalService::new(
            Arc::new(InMemoryProposalRepository::default()),
            ApprovalPolicy { high_value_threshold: Decimal::from(15_000), timeout },
            Arc::new(InMemoryAuditSink::default()),
        ));
        (Arc::new(CarProcessingWorkflow::new(agents, Arc::clone(&approvals))), approvals)
    }

    fn rental(text: &str) -> ReturnFeedback {
        ReturnFeedback::from_source(ReturnSource::Rental, text)
    }

    #[tokio::test]
    async fn clean_return_makes_the_car_available() {
        let (workflow, _) = setup(Duration::from_secs(1));
        let outcome = workflow
            .process(&car(1, "Toyota", "Corolla", 2020), &rental("Great car, no issues"), "c")
            .await
            .expect("process");
        assert_eq!(outcome.conditions.assignment, CarAssignment::None);
        assert_eq!(outcome.conditions.disposition_status, ApprovalOutcome::NotRequired);
        assert!(outcome.supervisor.actions.is_empty());
    }

    #[tokio::test]
    async fn maintenance_wins_over_cleaning() {
        let (workflow, _) = setup(Duration::from_secs(1));
        let outcome = workflow
            .process(
                &car(2, "Honda", "Civic", 2019),
                &rental("Brakes squeal and seats are dirty"),
                "c",
            )
            .await
            .expect("process");
        assert_eq!(outcome.conditions.assignment, CarAssignment::Maintenance);
        let tools: Vec<&str> = outcome.supervisor.actions.iter().map(|a| a.tool.as_str()).collect();
        assert_eq!(tools, vec!["request_maintenance", "request_cleaning"]);
    }

    #[tokio::test]
    async fn low_value_wreck_is_disposed_without_a_reviewer() {
        let (workflow, approvals) = setup(Duration::from_secs(1));
        let outcome = workflow
            .process(&car(8, "Nissan", "Altima", 2012), &rental("Car was totaled in a crash"), "c")
            .await
            .expect("process");
        assert_eq!(outcome.conditions.assignment, CarAssignment::Disposition);
        assert_eq!(outcome.supervisor.approval, ApprovalOutcome::NotRequired);
        assert!(outcome.supervisor.estimated_value.expect("priced") <= Decimal::from(15_000));
        assert!(approvals.pending().await.expect("pending").is_empty());
        assert_eq!(outcome.supervisor.actions[0].tool, "request_disposition");
    }

    #[tokio::test]
    async fn high_value_wreck_waits_for_the_reviewer() {
        let (workflow, approvals) = setup(Duration::from_secs(5));
        let running = Arc::clone(&workflow);
        let handle = tokio::spawn(async move {
            running
                .process(
                    &car(14, "Mercedes-Benz", "E-Class", 2025),
                    &rental("Collision, frame damage"),
                    "c",
                )
                .await
        });

        let mut pending = Vec::new();
        for _ in 0..200 {
            pending = approvals.pending().await.expect("pending");
            if !pending.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let proposal = pending.first().expect("proposal stored");
        assert!(proposal.estimated_value > Decimal::from(15_000));

        approvals
            .decide(
                &proposal.id,
                HumanDecision::by_reviewer(
                    true,
                    "DISPOSE_CAR: not worth fixing",
                    "Workshop User",
                    Some(FleetVerdict::DisposeCar),
                ),
                "reviewer",
            )
            .await
            .expect("decide");

        let outcome = handle.await.expect("join").expect("process");
        assert_eq!(outcome.supervisor.verdict, Some(FleetVerdict::DisposeCar));
        assert_eq!(outcome.supervisor.proposed_action, Some(DispositionAction::Keep));
        assert_eq!(outcome.conditions.assignment, CarAssignment::Disposition);
        assert_eq!(outcome.conditions.disposition_status, ApprovalOutcome::Approved);
        let disposal = outcome.supervisor.actions.last().expect("disposal ran");
        assert_eq!(disposal.tool, "request_disposition");
        assert!(disposal.summary.contains("Sell the car"));
    }

    #[tokio::test]
    async fn unanswered_keep_proposal_never_disposes_of_the_car() {
        let (workflow, _) = setup(Duration::from_millis(60));
        let outcome = workflow
            .process(
                &car(14, "Mercedes-Benz", "E-Class", 2025),
                &rental("Collision, frame damage"),
                "c",
            )
            .await
            .expect("process");

        assert_eq!(outcome.supervisor.proposed_action, Some(DispositionAction::Keep));
        let decision = outcome.supervisor.human_decision.as_ref().expect("reviewer step ran");
        assert_eq!(decision.source, DecisionSource::Timeout);
        assert_eq!(outcome.supervisor.verdict, Some(FleetVerdict::KeepCar));
        assert_eq!(outcome.supervisor.approval, ApprovalOutcome::Rejected);
        assert_eq!(outcome.conditions.assignment, CarAssignment::Maintenance);
        let tools: Vec<&str> = outcome.supervisor.actions.iter().map(|a| a.tool.as_str()).collect();
        assert_eq!(tools, vec!["request_human_approval", "request_maintenance"]);
    }

    #[tokio::test]
    async fn reviewer_timeout_keeps_the_car_for_inspection() {
        let (workflow, _) = setup(Duration::from_millis(60));
        let outcome = workflow
            .process(&car(5, "BMW", "X5", 2020), &rental("Major damage after a collision"), "c")
            .await
            .expect("process");
        let decision = outcome.supervisor.human_decision.expect("reviewer step ran");
        assert!(!decision.approved);
        assert_eq!(outcome.supervisor.approval, ApprovalOutcome::Rejected);
        assert_eq!(outcome.conditions.assignment, CarAssignment::Maintenance);
    }
}
