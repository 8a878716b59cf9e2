//! Freight quotes from the dropshipping supplier's logistics API.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use storefront_core::config::FreightConfig;

const FREIGHT_PATH: &str = "/logistic/freightCalculate";
const ACCESS_TOKEN_HEADER: &str = "CJ-Access-Token";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FreightError {
    #[error("freight API is not configured")]
    NotConfigured,
    #[error("freight request failed: {0}")]
    Transport(String),
    #[error("freight API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("freight API rejected the quote: {0}")]
    Rejected(String),
    #[error("failed to decode freight response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightProduct {
    pub quantity: u32,
    pub vid: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightQuoteRequest {
    pub start_country_code: String,
    pub end_country_code: String,
    pub products: Vec<FreightProduct>,
}

/// One carrier offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightOption {
    pub logistic_name: String,
    pub logistic_price: Decimal,
    #[serde(default)]
    pub total_postage_fee: Option<Decimal>,
    #[serde(default)]
    pub logistic_aging: Option<String>,
}

impl FreightOption {
    /// Lowest `logistic_price`; the first one wins a tie.
    pub fn cheapest(options: &[FreightOption]) -> Option<&FreightOption> {
        options.iter().fold(None, |best: Option<&FreightOption>, option| match best {
            Some(current) if current.logistic_price <= option.logistic_price => Some(current),
            _ => Some(option),
        })
    }
}

#[async_trait]
pub trait FreightClient: Send + Sync {
    async fn freight_calculate(
        &self,
        request: &FreightQuoteRequest,
    ) -> Result<Vec<FreightOption>, FreightError>;
}

#[derive(Deserialize)]
struct FreightEnvelope {
    #[serde(default = "default_result")]
    result: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<FreightOption>>,
}

fn default_result() -> bool {
    true
}

#[derive(Clone, Debug)]
pub struct SupplierFreightClient {
    client: reqwest::Client,
    access_token: Option<SecretString>,
    endpoint: String,
}

impl SupplierFreightClient {
    pub fn from_config(config: &FreightConfig) -> Result<Self, FreightError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| FreightError::Transport(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            client,
            access_token: config
                .access_token
                .clone()
                .filter(|token| !token.expose_secret().trim().is_empty()),
            endpoint: format!("{}{FREIGHT_PATH}", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }
}

#[async_trait]
impl FreightClient for SupplierFreightClient {
    async fn freight_calculate(
        &self,
        request: &FreightQuoteRequest,
    ) -> Result<Vec<FreightOption>, FreightError> {
        let token = self.access_token.as_ref().ok_or(FreightError::NotConfigured)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|error| FreightError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FreightError::Status { status: status.as_u16(), body });
        }

        let envelope: FreightEnvelope =
            response.json().await.map_err(|error| FreightError::Decode(error.to_string()))?;
        if !envelope.result {
            return Err(FreightError::Rejected(
                envelope.message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let options = envelope.data.unwrap_or_default();
        debug!(
            options = options.len(),
            destination = %request.end_country_code,
            "freight quote received"
        );
        Ok(options)
    }
}
