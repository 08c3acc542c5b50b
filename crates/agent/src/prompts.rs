use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tera::Tera;

use crate::llm::{AgentRole, CompletionRequest};

const FEEDBACK_BLOCK: &str = "Car #{{ car_number }}: {{ car_make }} {{ car_model }} ({{ car_year }}), \
last known condition: {{ car_condition }}.\n\
Feedback:\n{{ feedback }}";

const CLEANING_SYSTEM: &str = "You review rental car feedback for a fleet cleaning crew. \
If the feedback describes anything that needs cleaning, reply with one short cleaning request. \
Otherwise reply with exactly CLEANING_NOT_REQUIRED.";

const MAINTENANCE_SYSTEM: &str = "You review rental car feedback for a fleet workshop. \
If the feedback describes a mechanical issue or body damage that needs repair, reply with one \
short maintenance request. Otherwise reply with exactly MAINTENANCE_NOT_REQUIRED.";

const DISPOSITION_SYSTEM: &str = "You decide whether a rental car may have to leave the fleet. \
Only severe damage counts: wrecked, totaled, destroyed, crashed, collision, frame or structural \
damage, unsafe or not drivable, blown engine, failed transmission. If so reply with \
DISPOSITION_REQUIRED: followed by the reason. Otherwise reply with exactly DISPOSITION_NOT_REQUIRED.";

const PRICING_SYSTEM: &str = "You estimate the current market value of used cars in US dollars. \
Reply with one line of the form `Estimated market value: $12,345` followed by a short basis.";

const PRICING_USER: &str = "Current year: {{ current_year }}.\n\
Car #{{ car_number }}: {{ car_make }} {{ car_model }} ({{ car_year }}), condition: {{ car_condition }}.\n\
Reported damage:\n{{ feedback }}";

const PROPOSAL_SYSTEM: &str = "You recommend what a fleet should do with a damaged car. \
Scrap cars over five years old with significant damage. Sell cars three to five years old in \
fair condition. Donate cars worth under $5,000 that still work. Keep valuable cars with \
repairable damage. Start your reply with exactly one of __SCRAP__, __SELL__, __DONATE__ or \
__KEEP__ and then explain the reasoning in one or two sentences.";

const DISPOSITION_DECISION_SYSTEM: &str = "You dispose of low-value fleet cars. Choose to scrap, \
sell or donate the car. Start your reply with exactly one of __SCRAP__, __SELL__ or __DONATE__ \
and then give a one-sentence reason.";

const VALUED_USER: &str = "Current year: {{ current_year }}.\n\
Car #{{ car_number }}: {{ car_make }} {{ car_model }} ({{ car_year }}), condition: {{ car_condition }}.\n\
Estimated value: ${{ estimated_value }}.\n\
{% if disposition_request %}Disposition request: {{ disposition_request }}\n{% endif %}\
Feedback:\n{{ feedback }}";

const CONDITION_SYSTEM: &str = "You keep the condition field of a fleet car record up to date. \
Summarise the car's general condition from its last known condition and the new feedback in at \
most 200 characters. Reply with the summary only.";

const CONDITION_USER: &str = "Last known condition: {{ car_condition }}.\n\
{% if assignment %}Next assignment: {{ assignment }}.\n{% endif %}\
Feedback:\n{{ feedback }}";

/// Compiled prompt templates, one system and one user template per role.
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        for role in AgentRole::ALL {
            let (system, user) = templates(role);
            tera.add_raw_template(&format!("{}.system", role.as_str()), system)
                .with_context(|| format!("invalid system prompt for {}", role.as_str()))?;
            tera.add_raw_template(&format!("{}.user", role.as_str()), user)
                .with_context(|| format!("invalid user prompt for {}", role.as_str()))?;
        }
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        role: AgentRole,
        variables: BTreeMap<String, String>,
    ) -> Result<CompletionRequest> {
        let context = tera::Context::from_serialize(&variables)
            .context("prompt variables are not serializable")?;
        let system = self
            .tera
            .render(&format!("{}.system", role.as_str()), &context)
            .with_context(|| format!("failed to render {} system prompt", role.as_str()))?;
        let user = self
            .tera
            .render(&format!("{}.user", role.as_str()), &context)
            .with_context(|| format!("failed to render {} user prompt", role.as_str()))?;
        Ok(CompletionRequest { role, system, user, variables })
    }
}

fn templates(role: AgentRole) -> (&'static str, &'static str) {
    match role {
        AgentRole::CleaningAnalyzer => (CLEANING_SYSTEM, FEEDBACK_BLOCK),
        AgentRole::MaintenanceAnalyzer => (MAINTENANCE_SYSTEM, FEEDBACK_BLOCK),
        AgentRole::DispositionAnalyzer => (DISPOSITION_SYSTEM, FEEDBACK_BLOCK),
        AgentRole::Pricing => (PRICING_SYSTEM, PRICING_USER),
        AgentRole::DispositionProposal => (PROPOSAL_SYSTEM, VALUED_USER),
        AgentRole::Disposition => (DISPOSITION_DECISION_SYSTEM, VALUED_USER),
        AgentRole::ConditionSummary => (CONDITION_SYSTEM, CONDITION_USER),
    }
}
