//! Typed wrappers around each fleet agent: render the prompt, ask the model,
//! parse the answer. Unparseable answers fall back to the deterministic rules.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;

use carfleet_core::approvals::parse_currency;
use carfleet_core::domain::car::CarInfo;
use carfleet_core::domain::proposal::DispositionAction;

use crate::llm::{AgentRole, LlmClient};
use crate::prompts::PromptLibrary;
use crate::rules;

const CONDITION_LIMIT: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueEstimate {
    pub value: Decimal,
    pub rationale: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRecommendation {
    pub action: DispositionAction,
    pub reasoning: String,
}

pub struct FleetAgents {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLibrary,
    current_year: i32,
}

impl FleetAgents {
    pub fn new(llm: Arc<dyn LlmClient>, current_year: i32) -> Result<Self> {
        Ok(Self { llm, prompts: PromptLibrary::new()?, current_year })
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    fn variables(&self, car: &CarInfo, feedback: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("car_number".to_string(), car.number.to_string()),
            ("car_make".to_string(), car.make.clone()),
            ("car_model".to_string(), car.model.clone()),
            ("car_year".to_string(), car.year.to_string()),
            ("car_condition".to_string(), car.condition.clone()),
            ("current_year".to_string(), self.current_year.to_string()),
            ("feedback".to_string(), feedback.to_string()),
        ])
    }

    async fn ask(&self, role: AgentRole, variables: BTreeMap<String, String>) -> Result<String> {
        let request = self.prompts.render(role, variables)?;
        let answer = self.llm.complete(&request).await?;
        tracing::debug!(
            event_name = "agent.completed",
            role = role.as_str(),
            provider = self.llm.provider_name(),
            answer_len = answer.len(),
            "agent answered"
        );
        Ok(answer.trim().to_string())
    }

    pub async fn analyze_cleaning(&self, car: &CarInfo, feedback: &str) -> Result<String> {
        self.ask(AgentRole::CleaningAnalyzer, self.variables(car, feedback)).await
    }

    pub async fn analyze_maintenance(&self, car: &CarInfo, feedback: &str) -> Result<String> {
        self.ask(AgentRole::MaintenanceAnalyzer, self.variables(car, feedback)).await
    }

    pub async fn analyze_disposition(&self, car: &CarInfo, feedback: &str) -> Result<String> {
        self.ask(AgentRole::DispositionAnalyzer, self.variables(car, feedback)).await
    }

    pub async fn estimate_value(&self, car: &CarInfo, feedback: &str) -> Result<ValueEstimate> {
        let answer = self.ask(AgentRole::Pricing, self.variables(car, feedback)).await?;
        match parse_currency(&answer) {
            Some(value) => Ok(ValueEstimate { value, rationale: answer }),
            None => {
                let value = rules::estimate_value(
                    &car.make,
                    &car.model,
                    car.year,
                    self.current_year,
                    &car.condition,
                    feedback,
                );
                tracing::warn!(
                    event_name = "agent.pricing.unparsed",
                    car_number = car.number.0,
                    fallback = %value,
                    "pricing answer had no amount; using rule estimate"
                );
                Ok(ValueEstimate { value, rationale: answer })
            }
        }
    }

    fn valued_variables(
        &self,
        car: &CarInfo,
        feedback: &str,
        value: Decimal,
        disposition_request: &str,
    ) -> BTreeMap<String, String> {
        let mut variables = self.variables(car, feedback);
        variables.insert("estimated_value".to_string(), value.to_string());
        variables.insert("disposition_request".to_string(), disposition_request.to_string());
        variables
    }

    /// Recommendation for a car whose value calls for a reviewer.
    pub async fn propose_disposition(
        &self,
        car: &CarInfo,
        feedback: &str,
        value: Decimal,
        disposition_request: &str,
    ) -> Result<ActionRecommendation> {
        let variables = self.valued_variables(car, feedback, value, disposition_request);
        let answer = self.ask(AgentRole::DispositionProposal, variables).await?;
        Ok(parse_recommendation(&answer).unwrap_or_else(|| {
            let (action, reasoning) =
                rules::recommend_action(car.age_in_years(self.current_year), value, feedback);
            ActionRecommendation { action, reasoning }
        }))
    }

    /// Direct scrap/sell/donate choice for a car below the review threshold.
    pub async fn choose_disposition(
        &self,
        car: &CarInfo,
        feedback: &str,
        value: Decimal,
        disposition_request: &str,
    ) -> Result<ActionRecommendation> {
        let variables = self.valued_variables(car, feedback, value, disposition_request);
        let answer = self.ask(AgentRole::Disposition, variables).await?;
        match parse_recommendation(&answer) {
            Some(recommendation) if recommendation.action != DispositionAction::Keep => {
                Ok(recommendation)
            }
            _ => {
                let (action, reasoning) = rules::low_value_action(value, feedback);
                Ok(ActionRecommendation { action, reasoning })
            }
        }
    }

    pub async fn summarize_condition(
        &self,
        car: &CarInfo,
        feedback: &str,
        assignment: &str,
    ) -> Result<String> {
        let mut variables = self.variables(car, feedback);
        variables.insert("assignment".to_string(), assignment.to_string());
        let answer = self.ask(AgentRole::ConditionSummary, variables).await?;
        if answer.is_empty() {
            return Ok(car.condition.clone());
        }
        Ok(answer.chars().take(CONDITION_LIMIT).collect())
    }
}

/// Finds the first `__ACTION__` marker and treats the remaining text as the
/// reasoning.
pub fn parse_recommendation(answer: &str) -> Option<ActionRecommendation> {
    let action = [
        DispositionAction::Scrap,
        DispositionAction::Sell,
        DispositionAction::Donate,
        DispositionAction::Keep,
    ]
    .into_iter()
    .filter_map(|action| {
        answer.find(&format!("__{}__", action.as_key())).map(|position| (position, action))
    })
    .min_by_key(|(position, _)| *position)
    .map(|(_, action)| action)?;

    let reasoning = answer
        .lines()
        .find_map(|line| line.trim().strip_prefix("Reasoning:"))
        .map(str::trim)
        .filter(|reasoning| !reasoning.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| strip_markers(answer));

    Some(ActionRecommendation { action, reasoning })
}

fn strip_markers(answer: &str) -> String {
    ["__SCRAP__", "__SELL__", "__DONATE__", "__KEEP__"]
        .iter()
        .fold(answer.to_string(), |text, marker| text.replace(marker, ""))
        .trim()
        .to_string()
}
