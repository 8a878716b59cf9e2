use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 20;
const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;

pub const DEFAULT_AI_ONLY_ACK_TEXT: &str =
    "Thanks for reaching out. Our assistant is handling your request and will keep helping you right here.";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub support: SupportConfig,
    pub freight: FreightConfig,
    pub promotions: PromotionsConfig,
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
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub rate_limit_attempts: u32,
    pub rate_limit_period_secs: u64,
}

impl LlmConfig {
    /// AI replies are only attempted when a non-blank key is present.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct SupportConfig {
    pub ai_only_mode: bool,
    pub ai_only_ack_text: String,
    pub realtime_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct FreightConfig {
    pub base_url: String,
    pub access_token: Option<SecretString>,
    pub origin_country: String,
    pub fallback_destination_country: String,
    pub supplier_provider_id: i64,
    pub timeout_secs: u64,
}

impl FreightConfig {
    pub fn is_configured(&self) -> bool {
        self.access_token
            .as_ref()
            .map(|token| !token.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotionsConfig {
    pub first_order_max: Decimal,
    pub high_value_max: Decimal,
    pub high_value_threshold: Decimal,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Point-in-time support switches handed to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportSettings {
    pub ai_only_mode: bool,
    pub ai_configured: bool,
    pub ai_only_ack_text: String,
    pub realtime_enabled: bool,
    /// Model replies allowed per customer within `ai_rate_limit_period`.
    pub ai_rate_limit_attempts: u32,
    pub ai_rate_limit_period: Duration,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            ai_only_mode: false,
            ai_configured: false,
            ai_only_ack_text: DEFAULT_AI_ONLY_ACK_TEXT.to_string(),
            realtime_enabled: true,
            ai_rate_limit_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
            ai_rate_limit_period: Duration::from_secs(DEFAULT_RATE_LIMIT_PERIOD_SECS),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub ai_only_mode: Option<bool>,
    pub freight_access_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
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
                url: "sqlite://storefront.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.deepseek.com".to_string(),
                model: "deepseek-chat".to_string(),
                timeout_secs: 30,
                max_attempts: 2,
                rate_limit_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
                rate_limit_period_secs: DEFAULT_RATE_LIMIT_PERIOD_SECS,
            },
            support: SupportConfig {
                ai_only_mode: false,
                ai_only_ack_text: DEFAULT_AI_ONLY_ACK_TEXT.to_string(),
                realtime_enabled: true,
            },
            freight: FreightConfig {
                base_url: "https://developers.cjdropshipping.com/api2.0/v1".to_string(),
                access_token: None,
                origin_country: "CN".to_string(),
                fallback_destination_country: "US".to_string(),
                supplier_provider_id: 1,
                timeout_secs: 20,
            },
            promotions: PromotionsConfig {
                first_order_max: Decimal::new(1_000, 2),
                high_value_max: Decimal::new(1_500, 2),
                high_value_threshold: Decimal::new(5_000, 2),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("storefront.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn support_settings(&self) -> SupportSettings {
        SupportSettings {
            ai_only_mode: self.support.ai_only_mode,
            ai_configured: self.llm.is_configured(),
            ai_only_ack_text: self.support.ai_only_ack_text.clone(),
            realtime_enabled: self.support.realtime_enabled,
            ai_rate_limit_attempts: self.llm.rate_limit_attempts,
            ai_rate_limit_period: Duration::from_secs(self.llm.rate_limit_period_secs),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_attempts) = llm.max_attempts {
                self.llm.max_attempts = max_attempts;
            }
            if let Some(rate_limit_attempts) = llm.rate_limit_attempts {
                self.llm.rate_limit_attempts = rate_limit_attempts;
            }
            if let Some(rate_limit_period_secs) = llm.rate_limit_period_secs {
                self.llm.rate_limit_period_secs = rate_limit_period_secs;
            }
        }

        if let Some(support) = patch.support {
            if let Some(ai_only_mode) = support.ai_only_mode {
                self.support.ai_only_mode = ai_only_mode;
            }
            if let Some(ai_only_ack_text) = support.ai_only_ack_text {
                self.support.ai_only_ack_text = ai_only_ack_text;
            }
            if let Some(realtime_enabled) = support.realtime_enabled {
                self.support.realtime_enabled = realtime_enabled;
            }
        }

        if let Some(freight) = patch.freight {
            if let Some(base_url) = freight.base_url {
                self.freight.base_url = base_url;
            }
            if let Some(freight_token_value) = freight.access_token {
                self.freight.access_token = Some(secret_value(freight_token_value));
            }
            if let Some(origin_country) = freight.origin_country {
                self.freight.origin_country = origin_country;
            }
            if let Some(fallback) = freight.fallback_destination_country {
                self.freight.fallback_destination_country = fallback;
            }
            if let Some(supplier_provider_id) = freight.supplier_provider_id {
                self.freight.supplier_provider_id = supplier_provider_id;
            }
            if let Some(timeout_secs) = freight.timeout_secs {
                self.freight.timeout_secs = timeout_secs;
            }
        }

        if let Some(promotions) = patch.promotions {
            if let Some(first_order_max) = promotions.first_order_max {
                self.promotions.first_order_max = first_order_max;
            }
            if let Some(high_value_max) = promotions.high_value_max {
                self.promotions.high_value_max = high_value_max;
            }
            if let Some(high_value_threshold) = promotions.high_value_threshold {
                self.promotions.high_value_threshold = high_value_threshold;
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
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STOREFRONT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STOREFRONT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STOREFRONT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        // DEEPSEEK_API_KEY is honored for parity with existing deployments.
        let api_key = read_env("STOREFRONT_LLM_API_KEY").or_else(|| read_env("DEEPSEEK_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("STOREFRONT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("STOREFRONT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_MAX_ATTEMPTS") {
            self.llm.max_attempts = parse_u32("STOREFRONT_LLM_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_RATE_LIMIT_ATTEMPTS") {
            self.llm.rate_limit_attempts =
                parse_u32("STOREFRONT_LLM_RATE_LIMIT_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_LLM_RATE_LIMIT_PERIOD_SECS") {
            self.llm.rate_limit_period_secs =
                parse_u64("STOREFRONT_LLM_RATE_LIMIT_PERIOD_SECS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_SUPPORT_AI_ONLY_MODE") {
            self.support.ai_only_mode = parse_bool("STOREFRONT_SUPPORT_AI_ONLY_MODE", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_SUPPORT_AI_ONLY_ACK_TEXT") {
            self.support.ai_only_ack_text = value;
        }
        if let Some(value) = read_env("STOREFRONT_SUPPORT_REALTIME_ENABLED") {
            self.support.realtime_enabled =
                parse_bool("STOREFRONT_SUPPORT_REALTIME_ENABLED", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_FREIGHT_BASE_URL") {
            self.freight.base_url = value;
        }
        if let Some(value) = read_env("STOREFRONT_FREIGHT_ACCESS_TOKEN") {
            self.freight.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("STOREFRONT_FREIGHT_ORIGIN_COUNTRY") {
            self.freight.origin_country = value;
        }
        if let Some(value) = read_env("STOREFRONT_FREIGHT_FALLBACK_DESTINATION_COUNTRY") {
            self.freight.fallback_destination_country = value;
        }
        if let Some(value) = read_env("STOREFRONT_FREIGHT_SUPPLIER_PROVIDER_ID") {
            self.freight.supplier_provider_id =
                parse_i64("STOREFRONT_FREIGHT_SUPPLIER_PROVIDER_ID", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_FREIGHT_TIMEOUT_SECS") {
            self.freight.timeout_secs = parse_u64("STOREFRONT_FREIGHT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_PROMOTIONS_FIRST_ORDER_MAX") {
            self.promotions.first_order_max =
                parse_decimal("STOREFRONT_PROMOTIONS_FIRST_ORDER_MAX", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_PROMOTIONS_HIGH_VALUE_MAX") {
            self.promotions.high_value_max =
                parse_decimal("STOREFRONT_PROMOTIONS_HIGH_VALUE_MAX", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_PROMOTIONS_HIGH_VALUE_THRESHOLD") {
            self.promotions.high_value_threshold =
                parse_decimal("STOREFRONT_PROMOTIONS_HIGH_VALUE_THRESHOLD", &value)?;
        }

        let log_level =
            read_env("STOREFRONT_LOGGING_LEVEL").or_else(|| read_env("STOREFRONT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOREFRONT_LOGGING_FORMAT").or_else(|| read_env("STOREFRONT_LOG_FORMAT"));
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
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(ai_only_mode) = overrides.ai_only_mode {
            self.support.ai_only_mode = ai_only_mode;
        }
        if let Some(freight_access_token) = overrides.freight_access_token {
            self.freight.access_token = Some(secret_value(freight_access_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_support(&self.support)?;
        validate_freight(&self.freight)?;
        validate_promotions(&self.promotions)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
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
    if llm.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "llm.max_attempts must be at least 1".to_string(),
        ));
    }
    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be blank".to_string()));
    }
    if llm.rate_limit_attempts == 0 || llm.rate_limit_period_secs == 0 {
        return Err(ConfigError::Validation(
            "llm.rate_limit_attempts and llm.rate_limit_period_secs must be greater than zero"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_support(support: &SupportConfig) -> Result<(), ConfigError> {
    if support.ai_only_ack_text.trim().is_empty() {
        return Err(ConfigError::Validation(
            "support.ai_only_ack_text must not be blank".to_string(),
        ));
    }

    Ok(())
}

fn validate_freight(freight: &FreightConfig) -> Result<(), ConfigError> {
    if !is_http_url(&freight.base_url) {
        return Err(ConfigError::Validation(
            "freight.base_url must start with http:// or https://".to_string(),
        ));
    }

    for (key, value) in [
        ("freight.origin_country", &freight.origin_country),
        ("freight.fallback_destination_country", &freight.fallback_destination_country),
    ] {
        let code = value.trim();
        if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_alphabetic()) {
            return Err(ConfigError::Validation(format!(
                "{key} must be a two-letter ISO country code (got `{value}`)"
            )));
        }
    }

    if freight.timeout_secs == 0 || freight.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "freight.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_promotions(promotions: &PromotionsConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("promotions.first_order_max", promotions.first_order_max),
        ("promotions.high_value_max", promotions.high_value_max),
        ("promotions.high_value_threshold", promotions.high_value_threshold),
    ] {
        if value.is_sign_negative() {
            return Err(ConfigError::Validation(format!("{key} must not be negative")));
        }
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

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    support: Option<SupportPatch>,
    freight: Option<FreightPatch>,
    promotions: Option<PromotionsPatch>,
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
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    rate_limit_attempts: Option<u32>,
    rate_limit_period_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SupportPatch {
    ai_only_mode: Option<bool>,
    ai_only_ack_text: Option<String>,
    realtime_enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FreightPatch {
    base_url: Option<String>,
    access_token: Option<String>,
    origin_country: Option<String>,
    fallback_destination_country: Option<String>,
    supplier_provider_id: Option<i64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PromotionsPatch {
    first_order_max: Option<Decimal>,
    high_value_max: Option<Decimal>,
    high_value_threshold: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
