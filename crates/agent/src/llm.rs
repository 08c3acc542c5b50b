use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use carfleet_core::config::{LlmConfig, LlmProvider};

use crate::rules;

/// Which agent a completion is for. Selects the prompt template and, for the
/// offline client, the rule set that answers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRole {
    CleaningAnalyzer,
    MaintenanceAnalyzer,
    DispositionAnalyzer,
    Pricing,
    DispositionProposal,
    Disposition,
    ConditionSummary,
}

impl AgentRole {
    pub const ALL: [AgentRole; 7] = [
        Self::CleaningAnalyzer,
        Self::MaintenanceAnalyzer,
        Self::DispositionAnalyzer,
        Self::Pricing,
        Self::DispositionProposal,
        Self::Disposition,
        Self::ConditionSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CleaningAnalyzer => "cleaning_analyzer",
            Self::MaintenanceAnalyzer => "maintenance_analyzer",
            Self::DispositionAnalyzer => "disposition_analyzer",
            Self::Pricing => "pricing",
            Self::DispositionProposal => "disposition_proposal",
            Self::Disposition => "disposition",
            Self::ConditionSummary => "condition_summary",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub role: AgentRole,
    pub system: String,
    pub user: String,
    /// The values the prompt was rendered from.
    pub variables: BTreeMap<String, String>,
}

impl CompletionRequest {
    pub fn variable(&self, name: &str) -> &str {
        self.variables.get(name).map(String::as_str).unwrap_or_default()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn provider_name(&self) -> &'static str;
}

/// Answers every role from the deterministic fleet rules without any network
/// access. Output mimics what the prompts ask a model to produce.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineLlmClient;

impl OfflineLlmClient {
    fn number(request: &CompletionRequest, name: &str) -> Result<i32> {
        request
            .variable(name)
            .trim()
            .parse()
            .with_context(|| format!("offline {} needs integer `{name}`", request.role.as_str()))
    }

    fn value(request: &CompletionRequest) -> Result<Decimal> {
        request
            .variable("estimated_value")
            .trim()
            .parse()
            .with_context(|| format!("offline {} needs `estimated_value`", request.role.as_str()))
    }
}

#[async_trait]
impl LlmClient for OfflineLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let feedback = request.variable("feedback");
        let answer = match request.role {
            AgentRole::CleaningAnalyzer => rules::cleaning_request(feedback),
            AgentRole::MaintenanceAnalyzer => rules::maintenance_request(feedback),
            AgentRole::DispositionAnalyzer => rules::disposition_request(feedback),
            AgentRole::Pricing => {
                let value = rules::estimate_value(
                    request.variable("car_make"),
                    request.variable("car_model"),
                    Self::number(request, "car_year")?,
                    Self::number(request, "current_year")?,
                    request.variable("car_condition"),
                    feedback,
                );
                format!(
                    "Estimated market value: ${}\nBased on brand, age and reported condition.",
                    rules::format_money(value)
                )
            }
            AgentRole::DispositionProposal => {
                let age =
                    Self::number(request, "current_year")? - Self::number(request, "car_year")?;
                let (action, reasoning) =
                    rules::recommend_action(age, Self::value(request)?, feedback);
                format!("Recommendation: __{}__\nReasoning: {reasoning}", action.as_key())
            }
            AgentRole::Disposition => {
                let (action, reasoning) = rules::low_value_action(Self::value(request)?, feedback);
                format!("Decision: __{}__\nReasoning: {reasoning}", action.as_key())
            }
            AgentRole::ConditionSummary => {
                rules::condition_summary(request.variable("car_condition"), feedback)
            }
        };
        Ok(answer)
    }

    fn provider_name(&self) -> &'static str {
        "offline"
    }
}

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint. Ollama
/// serves the same route.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
    provider: &'static str,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.effective_base_url().to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            provider: match config.provider {
                LlmProvider::Ollama => "ollama",
                _ => "openai",
            },
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": 0.0,
        });

        let mut http = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key.expose_secret());
        }

        let response = http.send().await.context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("{} returned {status}: {detail}", self.provider);
        }

        let payload: Value = response.json().await.context("invalid chat completion body")?;
        extract_content(&payload)
    }
}

fn extract_content(payload: &Value) -> Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or_else(|| anyhow!("chat completion response has no message content"))
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(content) => return Ok(content),
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        event_name = "llm.retry",
                        role = request.role.as_str(),
                        attempt,
                        error = %error,
                        "retrying chat completion"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(error) => {
                    return Err(error.context(format!(
                        "{} failed after {} attempt(s)",
                        request.role.as_str(),
                        attempt + 1
                    )))
                }
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }
}

pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Offline => Ok(Arc::new(OfflineLlmClient)),
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            Ok(Arc::new(ChatCompletionsClient::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use carfleet_core::config::{LlmConfig, LlmProvider};

    use super::{
        client_from_config, extract_content, AgentRole, CompletionRequest, LlmClient,
        OfflineLlmClient,
    };

    fn request(role: AgentRole, pairs: &[(&str, &str)]) -> CompletionRequest {
        CompletionRequest {
            role,
            system: String::new(),
            user: String::new(),
            variables: pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn offline_pricing_answers_with_a_dollar_amount() {
        let answer = OfflineLlmClient
            .complete(&request(
                AgentRole::Pricing,
                &[
                    ("car_make", "BMW"),
                    ("car_model", "X5"),
                    ("car_year", "2024"),
                    ("current_year", "2026"),
                    ("car_condition", "Good"),
                    ("feedback", ""),
                ],
            ))
            .await
            .expect("pricing");
        assert!(answer.contains("$44,900"), "{answer}");
    }

    #[tokio::test]
    async fn offline_proposal_uses_action_markers() {
        let answer = OfflineLlmClient
            .complete(&request(
                AgentRole::DispositionProposal,
                &[
                    ("car_year", "2018"),
                    ("current_year", "2026"),
                    ("estimated_value", "16000"),
                    ("feedback", "frame damage after a collision"),
                ],
            ))
            .await
            .expect("proposal");
        assert!(answer.starts_with("Recommendation: __SCRAP__"), "{answer}");
    }

    #[tokio::test]
    async fn offline_pricing_rejects_missing_year() {
        let outcome = OfflineLlmClient.complete(&request(AgentRole::Pricing, &[])).await;
        assert!(outcome.is_err());
    }

    #[test]
    fn chat_completion_content_is_extracted_and_trimmed() {
        let payload = json!({"choices": [{"message": {"content": "  __KEEP__\n"}}]});
        assert_eq!(extract_content(&payload).expect("content"), "__KEEP__");
        assert!(extract_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn config_selects_the_provider() {
        let mut config = LlmConfig {
            provider: LlmProvider::Offline,
            api_key: None,
            base_url: None,
            model: "llama3".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        };
        assert_eq!(client_from_config(&config).expect("offline").provider_name(), "offline");
        config.provider = LlmProvider::Ollama;
        assert_eq!(client_from_config(&config).expect("ollama").provider_name(), "ollama");
    }
}
