use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub approval: ApprovalConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Human approval gate settings.
#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    /// How long a workflow waits for a reviewer before the default rejection applies.
    pub timeout_secs: u64,
    /// Cars valued strictly above this amount need a human decision before disposal.
    pub high_value_threshold: Decimal,
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Deterministic in-process rules, no network access.
    Offline,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://carfleet.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Offline,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            approval: ApprovalConfig {
                timeout_secs: 300,
                high_value_threshold: Decimal::from(15_000),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected offline|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Endpoint root for chat completions, falling back to the provider's public default.
    pub fn effective_base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::Ollama) => "http://localhost:11434",
            (None, _) => "https://api.openai.com",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(approval) = patch.approval {
            if let Some(timeout_secs) = approval.timeout_secs {
                self.approval.timeout_secs = timeout_secs;
            }
            if let Some(threshold) = approval.high_value_threshold {
                self.approval.high_value_threshold =
                    parse_decimal("approval.high_value_threshold", &threshold)?;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARFLEET_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARFLEET_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CARFLEET_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARFLEET_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARFLEET_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARFLEET_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CARFLEET_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARFLEET_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CARFLEET_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CARFLEET_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CARFLEET_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARFLEET_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CARFLEET_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CARFLEET_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARFLEET_SERVER_PORT") {
            self.server.port = parse_u16("CARFLEET_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARFLEET_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARFLEET_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CARFLEET_APPROVAL_TIMEOUT_SECS") {
            self.approval.timeout_secs = parse_u64("CARFLEET_APPROVAL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARFLEET_APPROVAL_HIGH_VALUE_THRESHOLD") {
            self.approval.high_value_threshold =
                parse_decimal("CARFLEET_APPROVAL_HIGH_VALUE_THRESHOLD", &value)?;
        }

        let log_level =
            read_env("CARFLEET_LOGGING_LEVEL").or_else(|| read_env("CARFLEET_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARFLEET_LOGGING_FORMAT").or_else(|| read_env("CARFLEET_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_approval(&self.approval)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("carfleet.toml"), PathBuf::from("config/carfleet.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Offline => {}
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider (set CARFLEET_LLM_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            if llm.model.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "llm.model is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_approval(approval: &ApprovalConfig) -> Result<(), ConfigError> {
    if approval.timeout_secs == 0 || approval.timeout_secs > 86_400 {
        return Err(ConfigError::Validation(
            "approval.timeout_secs must be in range 1..=86400".to_string(),
        ));
    }

    if approval.high_value_threshold.is_sign_negative() {
        return Err(ConfigError::Validation(
            "approval.high_value_threshold must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    approval: Option<ApprovalPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    timeout_secs: Option<u64>,
    // Kept as a string so `15000.50` does not pass through f64.
    high_value_threshold: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_offline() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.provider == LlmProvider::Offline, "default provider should be offline")?;
        ensure(config.approval.timeout_secs == 300, "default approval timeout is five minutes")?;
        ensure(
            config.approval.high_value_threshold == Decimal::from(15_000),
            "default threshold should be 15000",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CARFLEET_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("carfleet.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "openai"
api_key = "${TEST_CARFLEET_LLM_KEY}"

[approval]
timeout_secs = 30
high_value_threshold = "20000.50"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )?;
            ensure(config.approval.timeout_secs == 30, "approval timeout should come from file")?;
            ensure(
                config.approval.high_value_threshold == Decimal::new(2_000_050, 2),
                "threshold should keep its cents",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CARFLEET_LLM_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARFLEET_LOG_LEVEL", "warn");
        env::set_var("CARFLEET_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CARFLEET_LOG_LEVEL", "CARFLEET_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARFLEET_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CARFLEET_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("carfleet.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file and defaults")?;
            Ok(())
        })();

        clear_vars(&["CARFLEET_DATABASE_URL", "CARFLEET_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARFLEET_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["CARFLEET_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARFLEET_APPROVAL_TIMEOUT_SECS", "five minutes");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "CARFLEET_APPROVAL_TIMEOUT_SECS",
                "error should name the offending variable",
            ),
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override error".to_string()),
        };

        clear_vars(&["CARFLEET_APPROVAL_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CARFLEET_LLM_PROVIDER", "openai");
        env::set_var("CARFLEET_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                config.llm.effective_base_url() == "https://api.openai.com",
                "openai should default to the public endpoint",
            )?;
            Ok(())
        })();

        clear_vars(&["CARFLEET_LLM_PROVIDER", "CARFLEET_LLM_API_KEY"]);
        result
    }
}
