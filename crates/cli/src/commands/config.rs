use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use carfleet_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries: Vec<(&str, &str, String)> = vec![
        ("database.url", "CARFLEET_DATABASE_URL", config.database.url.clone()),
        (
            "database.max_connections",
            "CARFLEET_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        (
            "database.timeout_secs",
            "CARFLEET_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        ("llm.provider", "CARFLEET_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        ("llm.model", "CARFLEET_LLM_MODEL", config.llm.model.clone()),
        ("llm.base_url", "CARFLEET_LLM_BASE_URL", config.llm.effective_base_url().to_string()),
        ("llm.api_key", "CARFLEET_LLM_API_KEY", api_key),
        ("llm.timeout_secs", "CARFLEET_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        ("llm.max_retries", "CARFLEET_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        ("server.bind_address", "CARFLEET_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        ("server.port", "CARFLEET_SERVER_PORT", config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            "CARFLEET_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        (
            "approval.timeout_secs",
            "CARFLEET_APPROVAL_TIMEOUT_SECS",
            config.approval.timeout_secs.to_string(),
        ),
        (
            "approval.high_value_threshold",
            "CARFLEET_APPROVAL_HIGH_VALUE_THRESHOLD",
            config.approval.high_value_threshold.to_string(),
        ),
        ("logging.level", "CARFLEET_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "CARFLEET_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|(key, env_key, value)| render_line(key, value, source(key, env_key))),
    );
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("carfleet.toml"), PathBuf::from("config/carfleet.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn api_keys_keep_only_their_prefix() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_config_document() {
        let doc: Value = "[approval]\ntimeout_secs = 30\n".parse().expect("toml");
        assert!(contains_path(&doc, "approval.timeout_secs"));
        assert!(!contains_path(&doc, "approval.high_value_threshold"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
