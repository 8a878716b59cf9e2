use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use storefront_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigField {
    ConfigField { key, value, env_keys }
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        field("database.url", config.database.url.clone(), &["STOREFRONT_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["STOREFRONT_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["STOREFRONT_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["STOREFRONT_LLM_API_KEY", "DEEPSEEK_API_KEY"],
        ),
        field("llm.base_url", config.llm.base_url.clone(), &["STOREFRONT_LLM_BASE_URL"]),
        field("llm.model", config.llm.model.clone(), &["STOREFRONT_LLM_MODEL"]),
        field(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["STOREFRONT_LLM_TIMEOUT_SECS"],
        ),
        field(
            "llm.max_attempts",
            config.llm.max_attempts.to_string(),
            &["STOREFRONT_LLM_MAX_ATTEMPTS"],
        ),
        field(
            "llm.rate_limit_attempts",
            config.llm.rate_limit_attempts.to_string(),
            &["STOREFRONT_LLM_RATE_LIMIT_ATTEMPTS"],
        ),
        field(
            "llm.rate_limit_period_secs",
            config.llm.rate_limit_period_secs.to_string(),
            &["STOREFRONT_LLM_RATE_LIMIT_PERIOD_SECS"],
        ),
        field(
            "support.ai_only_mode",
            config.support.ai_only_mode.to_string(),
            &["STOREFRONT_SUPPORT_AI_ONLY_MODE"],
        ),
        field(
            "support.ai_only_ack_text",
            config.support.ai_only_ack_text.clone(),
            &["STOREFRONT_SUPPORT_AI_ONLY_ACK_TEXT"],
        ),
        field(
            "support.realtime_enabled",
            config.support.realtime_enabled.to_string(),
            &["STOREFRONT_SUPPORT_REALTIME_ENABLED"],
        ),
        field(
            "freight.base_url",
            config.freight.base_url.clone(),
            &["STOREFRONT_FREIGHT_BASE_URL"],
        ),
        field(
            "freight.access_token",
            redact_secret(config.freight.access_token.as_ref()),
            &["STOREFRONT_FREIGHT_ACCESS_TOKEN"],
        ),
        field(
            "freight.origin_country",
            config.freight.origin_country.clone(),
            &["STOREFRONT_FREIGHT_ORIGIN_COUNTRY"],
        ),
        field(
            "freight.fallback_destination_country",
            config.freight.fallback_destination_country.clone(),
            &["STOREFRONT_FREIGHT_FALLBACK_DESTINATION_COUNTRY"],
        ),
        field(
            "freight.supplier_provider_id",
            config.freight.supplier_provider_id.to_string(),
            &["STOREFRONT_FREIGHT_SUPPLIER_PROVIDER_ID"],
        ),
        field(
            "freight.timeout_secs",
            config.freight.timeout_secs.to_string(),
            &["STOREFRONT_FREIGHT_TIMEOUT_SECS"],
        ),
        field(
            "promotions.first_order_max",
            config.promotions.first_order_max.to_string(),
            &["STOREFRONT_PROMOTIONS_FIRST_ORDER_MAX"],
        ),
        field(
            "promotions.high_value_max",
            config.promotions.high_value_max.to_string(),
            &["STOREFRONT_PROMOTIONS_HIGH_VALUE_MAX"],
        ),
        field(
            "promotions.high_value_threshold",
            config.promotions.high_value_threshold.to_string(),
            &["STOREFRONT_PROMOTIONS_HIGH_VALUE_THRESHOLD"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["STOREFRONT_LOGGING_LEVEL", "STOREFRONT_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["STOREFRONT_LOGGING_FORMAT", "STOREFRONT_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["storefront.toml", "config/storefront.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}
