pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use std::fmt;
use std::future::Future;

use carfleet_core::config::{AppConfig, LoadOptions};
use carfleet_db::{connect_with_settings, DbPool};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a database command stopped. Each class maps to a fixed exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    SeedExecution,
    SeedVerification,
}

impl FailureClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration | Self::SeedExecution => 5,
            Self::SeedVerification => 6,
        }
    }

    /// `map_err` adapter that keeps the error's display text as the message.
    pub fn wrap<E: fmt::Display>(self) -> impl FnOnce(E) -> CommandFailure {
        move |error| CommandFailure::new(self, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub class: FailureClass,
    pub message: String,
}

impl CommandFailure {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: CommandStatus,
    error_class: Option<FailureClass>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command,
            status: CommandStatus::Ok,
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: render(&payload) }
    }

    pub fn failure(command: &str, failure: CommandFailure) -> Self {
        let exit_code = failure.class.exit_code();
        let payload = CommandOutcome {
            command,
            status: CommandStatus::Error,
            error_class: Some(failure.class),
            message: failure.message,
        };
        Self { exit_code, output: render(&payload) }
    }

    pub fn from_outcome(command: &str, outcome: Result<String, CommandFailure>) -> Self {
        match outcome {
            Ok(message) => Self::success(command, message),
            Err(failure) => Self::failure(command, failure),
        }
    }
}

/// Loads configuration, connects to the fleet database and runs `task` on a
/// single-threaded runtime. The pool is closed once `task` finishes.
pub(crate) fn run_against_database<F, Fut>(command: &str, task: F) -> CommandResult
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<String, CommandFailure>>,
{
    let outcome = (|| -> Result<String, CommandFailure> {
        let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
            CommandFailure::new(
                FailureClass::ConfigValidation,
                format!("configuration issue: {error}"),
            )
        })?;
        let runtime =
            tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
                CommandFailure::new(
                    FailureClass::RuntimeInit,
                    format!("failed to initialize async runtime: {error}"),
                )
            })?;

        runtime.block_on(async {
            let pool = connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await
            .map_err(FailureClass::DbConnectivity.wrap())?;
            let result = task(pool.clone()).await;
            pool.close().await;
            result
        })
    })();

    CommandResult::from_outcome(command, outcome)
}

fn render(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            payload.command,
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
