use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use carfleet_core::domain::car::CarInfo;
use carfleet_core::domain::proposal::{DispositionAction, ProposalDraft};

use crate::approval::ApprovalService;

pub const CLEANING_TOOL: &str = "request_cleaning";
pub const MAINTENANCE_TOOL: &str = "request_maintenance";
pub const DISPOSITION_TOOL: &str = "request_disposition";
pub const HUMAN_APPROVAL_TOOL: &str = "request_human_approval";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tracing::debug!(event_name = "tool.invoked", tool = name, "invoking tool");
        tool.execute(input).await.with_context(|| format!("tool `{name}` failed"))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Car identity plus the free-text request every action tool receives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CarRequest {
    pub car: CarInfo,
    pub request: String,
}

fn mentions(text: &str, words: &[&str]) -> bool {
    let text = text.to_ascii_lowercase();
    words.iter().any(|word| text.contains(word))
}

fn option_lines(options: &[(&str, bool)]) -> String {
    options
        .iter()
        .filter(|(_, selected)| *selected)
        .map(|(label, _)| format!("- {label}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningOptions {
    pub exterior_wash: bool,
    pub interior_cleaning: bool,
    pub detailing: bool,
    pub waxing: bool,
}

impl CleaningOptions {
    pub fn from_request(request: &str) -> Self {
        let interior_cleaning = mentions(
            request,
            &[
                "interior", "seat", "stain", "smell", "odor", "crumbs", "trash", "spill",
                "pet hair", "vomit", "smoke",
            ],
        );
        let detailing = mentions(
            request,
            &["detail", "stain", "odor", "smoke", "pet hair", "filthy", "vomit"],
        );
        let waxing = mentions(request, &["wax", "polish", "shine", "scratch"]);
        let exterior_wash = mentions(request, &["exterior", "mud", "dirt", "dust", "sand", "bird"])
            || !(interior_cleaning || detailing || waxing);
        Self { exterior_wash, interior_cleaning, detailing, waxing }
    }
}

pub struct CleaningTool;

#[async_trait]
impl Tool for CleaningTool {
    fn name(&self) -> &'static str {
        CLEANING_TOOL
    }

    fn description(&self) -> &'static str {
        "Send a car to the cleaning crew with the cleaning it needs"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let CarRequest { car, request } = serde_json::from_value(input)?;
        let options = CleaningOptions::from_request(&request);
        let summary = format!(
            "Cleaning requested for {}, Car #{}:\n{}\nAdditional notes: {}",
            car.description(),
            car.number,
            option_lines(&[
                ("Exterior wash", options.exterior_wash),
                ("Interior cleaning", options.interior_cleaning),
                ("Detailing", options.detailing),
                ("Waxing", options.waxing),
            ]),
            request.trim(),
        );
        Ok(json!({ "summary": summary, "options": options }))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceOptions {
    pub oil_change: bool,
    pub tire_rotation: bool,
    pub brake_service: bool,
    pub engine_service: bool,
    pub transmission_service: bool,
}

impl MaintenanceOptions {
    pub fn from_request(request: &str) -> Self {
        Self {
            oil_change: mentions(request, &["oil"]),
            tire_rotation: mentions(request, &["tire", "tyre", "alignment", "pulls to"]),
            brake_service: mentions(request, &["brake", "squeal"]),
            engine_service: mentions(
                request,
                &["engine", "overheat", "stall", "warning light", "noise", "rattle", "battery"],
            ),
            transmission_service: mentions(request, &["transmission", "gear", "shift", "clutch"]),
        }
    }
}

pub struct MaintenanceTool;

#[async_trait]
impl Tool for MaintenanceTool {
    fn name(&self) -> &'static str {
        MAINTENANCE_TOOL
    }

    fn description(&self) -> &'static str {
        "Send a car to the workshop with the services it needs"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let CarRequest { car, request } = serde_json::from_value(input)?;
        let options = MaintenanceOptions::from_request(&request);
        let services = option_lines(&[
            ("Oil change", options.oil_change),
            ("Tire rotation", options.tire_rotation),
            ("Brake service", options.brake_service),
            ("Engine service", options.engine_service),
            ("Transmission service", options.transmission_service),
        ]);
        let services =
            if services.is_empty() { "- General inspection".to_string() } else { services };
        let summary = format!(
            "Maintenance requested for {}, Car #{}:\n{services}\nAdditional notes: {}",
            car.description(),
            car.number,
            request.trim(),
        );
        Ok(json!({ "summary": summary, "options": options }))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispositionRequest {
    pub car: CarInfo,
    pub action: DispositionAction,
    pub reason: String,
}

pub struct DispositionTool;

#[async_trait]
impl Tool for DispositionTool {
    fn name(&self) -> &'static str {
        DISPOSITION_TOOL
    }

    fn description(&self) -> &'static str {
        "Take a car out of the fleet by scrapping, selling or donating it"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let DispositionRequest { car, action, reason } = serde_json::from_value(input)?;
        let instruction = match action {
            DispositionAction::Scrap => "Scrap the car",
            DispositionAction::Sell => "Sell the car",
            DispositionAction::Donate => "Donate the car",
            DispositionAction::Keep => {
                return Err(anyhow!("car {} is being kept; nothing to dispose", car.number))
            }
        };
        let summary = format!(
            "Disposition requested for {}, Car #{}: {instruction}\nReason: {}",
            car.description(),
            car.number,
            reason.trim(),
        );
        Ok(json!({ "summary": summary, "action": action }))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HumanApprovalRequest {
    pub car: CarInfo,
    pub estimated_value: Decimal,
    pub proposed_action: DispositionAction,
    pub reasoning: String,
    pub car_condition: String,
    pub rental_feedback: String,
    pub correlation_id: String,
}

/// Blocks until a reviewer answers, the approval times out, or the proposal
/// cannot be stored. Always returns a decision.
pub struct HumanApprovalTool {
    approvals: Arc<ApprovalService>,
}

impl HumanApprovalTool {
    pub fn new(approvals: Arc<ApprovalService>) -> Self {
        Self { approvals }
    }
}

#[async_trait]
impl Tool for HumanApprovalTool {
    fn name(&self) -> &'static str {
        HUMAN_APPROVAL_TOOL
    }

    fn description(&self) -> &'static str {
        "Ask a human reviewer to approve a disposal proposal for a high-value car"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let request: HumanApprovalRequest = serde_json::from_value(input)?;
        let draft = ProposalDraft {
            car: request.car,
            estimated_value: request.estimated_value,
            proposed_action: request.proposed_action,
            reasoning: request.reasoning,
            car_condition: request.car_condition,
            rental_feedback: request.rental_feedback,
        };
        let decision = self.approvals.request_and_wait(draft, &request.correlation_id).await;
        Ok(json!({
            "summary": decision.render_for_agent(),
            "decision": decision,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus};

    use super::{
        CleaningOptions, CleaningTool, DispositionTool, MaintenanceOptions, MaintenanceTool,
        ToolRegistry,
    };

    fn corolla() -> CarInfo {
        CarInfo {
            number: CarNumber(1),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            condition: "Good".to_string(),
            status: CarStatus::Rented,
            disposition_date: None,
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.register(CleaningTool);
        registry.register(MaintenanceTool);
        registry.register(DispositionTool);
        registry
    }

    #[test]
    fn cleaning_options_follow_the_request() {
        let options = CleaningOptions::from_request("Coffee stain on the back seat");
        assert!(options.interior_cleaning);
        assert!(options.detailing);
        assert!(!options.exterior_wash);

        let default = CleaningOptions::from_request("needs a clean");
        assert!(default.exterior_wash);
    }

    #[test]
    fn maintenance_options_follow_the_request() {
        let options = MaintenanceOptions::from_request("Brakes squeal and the oil light is on");
        assert!(options.brake_service);
        assert!(options.oil_change);
        assert!(!options.transmission_service);
    }

    #[tokio::test]
    async fn cleaning_summary_lists_selected_options() {
        let output = registry()
            .invoke(
                "request_cleaning",
                json!({"car": corolla(), "request": "muddy exterior and sand inside"}),
            )
            .await
            .expect("cleaning tool");
        let summary = output["summary"].as_str().expect("summary");
        assert!(summary
            .starts_with("Cleaning requested for Toyota Corolla (2020), Car #1:\n- Exterior wash"));
        assert_eq!(output["options"]["exteriorWash"], true);
    }

    #[tokio::test]
    async fn disposition_tool_refuses_to_dispose_a_kept_car() {
        let outcome = registry()
            .invoke(
                "request_disposition",
                json!({"car": corolla(), "action": "KEEP", "reason": "fine"}),
            )
            .await;
        assert!(outcome.is_err());

        let scrapped = registry()
            .invoke(
                "request_disposition",
                json!({"car": corolla(), "action": "SCRAP", "reason": "totaled"}),
            )
            .await
            .expect("scrap");
        assert!(scrapped["summary"].as_str().expect("summary").contains("Scrap the car"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = registry();
        assert_eq!(
            registry.names(),
            vec!["request_cleaning", "request_disposition", "request_maintenance"]
        );
        assert!(registry.invoke("request_towing", json!({})).await.is_err());
    }
}
