use carfleet_core::config::{AppConfig, LlmProvider, LoadOptions};
use carfleet_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_llm_provider(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["llm_provider", "database_connectivity", "fleet_schema"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_provider(config: &AppConfig) -> DoctorCheck {
    match config.llm.provider {
        LlmProvider::Offline => {
            DoctorCheck::pass("llm_provider", "offline rules engine; no model endpoint required")
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => DoctorCheck::pass(
            "llm_provider",
            format!(
                "{:?} model `{}` at {} (endpoint not probed)",
                config.llm.provider,
                config.llm.model,
                config.llm.effective_base_url()
            ),
        ),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("fleet_schema", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("fleet_schema", "the database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match migrations::status(&pool).await {
            Ok(status) if status.is_current() => DoctorCheck::pass(
                "fleet_schema",
                format!("schema current, {} cars on record", status.cars_on_record),
            ),
            Ok(status) => DoctorCheck::fail(
                "fleet_schema",
                format!(
                    "{} of {} migrations applied; run `carfleet migrate`",
                    status.applied_migrations, status.known_migrations
                ),
            ),
            Err(_) => DoctorCheck::fail("fleet_schema", "schema missing; run `carfleet migrate`"),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
