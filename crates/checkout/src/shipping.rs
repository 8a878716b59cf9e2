//! Cart shipping fee calculation.
//!
//! Every run replaces the cart's shipping lines: one line with the cheapest supplier
//! freight quote (when the cart has supplier-fulfilled items and the quote succeeds)
//! plus one aggregate weight-based line priced against the default warehouse.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use storefront_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink,
};
use storefront_core::config::FreightConfig;
use storefront_core::domain::cart::{Cart, CartId, CartItem, NewCartShipping, ProviderId};
use storefront_core::domain::warehouse::Warehouse;
use storefront_core::errors::ApplicationError;
use storefront_core::pricing::weight::cart_weight_kg;
use storefront_db::repositories::{
    CartRepository, CartShippingRepository, RepositoryError, WarehouseRepository,
};

use crate::freight::{FreightClient, FreightOption, FreightProduct, FreightQuoteRequest};

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("cart {0} not found")]
    CartNotFound(i64),
    #[error("no default warehouse is configured")]
    MissingDefaultWarehouse,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ShippingError> for ApplicationError {
    fn from(error: ShippingError) -> Self {
        let message = error.to_string();
        match error {
            ShippingError::MissingDefaultWarehouse => ApplicationError::Configuration(message),
            ShippingError::CartNotFound(_) => ApplicationError::Integration(message),
            ShippingError::Repository(error) => error.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingSettings {
    pub origin_country: String,
    pub fallback_destination_country: String,
    pub supplier_provider_id: ProviderId,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            origin_country: "CN".to_string(),
            fallback_destination_country: "US".to_string(),
            supplier_provider_id: ProviderId(1),
        }
    }
}

impl From<&FreightConfig> for ShippingSettings {
    fn from(config: &FreightConfig) -> Self {
        Self {
            origin_country: config.origin_country.clone(),
            fallback_destination_country: config.fallback_destination_country.clone(),
            supplier_provider_id: ProviderId(config.supplier_provider_id),
        }
    }
}

pub struct ShippingCalculator {
    carts: Arc<dyn CartRepository>,
    shippings: Arc<dyn CartShippingRepository>,
    warehouses: Arc<dyn WarehouseRepository>,
    freight: Arc<dyn FreightClient>,
    settings: ShippingSettings,
    audit: Arc<dyn AuditSink>,
}

impl ShippingCalculator {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        shippings: Arc<dyn CartShippingRepository>,
        warehouses: Arc<dyn WarehouseRepository>,
        freight: Arc<dyn FreightClient>,
        settings: ShippingSettings,
    ) -> Self {
        Self { carts, shippings, warehouses, freight, settings, audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Recomputes and persists the cart's shipping lines, returning their summed `logistic_price`.
    pub async fn calculate_shipping_fees(&self, cart_id: CartId) -> Result<Decimal, ShippingError> {
        let warehouse =
            self.warehouses.default_warehouse().await?.ok_or(ShippingError::MissingDefaultWarehouse)?;
        let cart = self.carts.find_by_id(cart_id).await?.ok_or(ShippingError::CartNotFound(cart_id.0))?;
        let audit = AuditContext::for_cart(cart_id, Uuid::new_v4().to_string(), "checkout");

        let mut lines = Vec::new();
        for (provider, items) in group_by_provider(&cart) {
            if provider != Some(self.settings.supplier_provider_id) {
                continue;
            }
            if let Some(line) = self.supplier_line(&warehouse, provider, &items, &audit).await {
                lines.push(line);
            }
        }
        lines.push(weight_line(&warehouse, &cart));

        let written = self.shippings.replace_for_cart(cart_id, lines).await?;
        let total: Decimal = written.iter().map(|line| line.logistic_price).sum();

        info!(
            event_name = "checkout.shipping_calculated",
            cart_id = cart_id.0,
            lines = written.len(),
            total = %total,
            "cart shipping recalculated"
        );
        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "checkout.shipping_calculated",
                AuditCategory::Shipping,
                AuditOutcome::Success,
            )
            .with_metadata("lines", written.len().to_string())
            .with_metadata("total", total.to_string()),
        );
        Ok(total)
    }

    async fn supplier_line(
        &self,
        warehouse: &Warehouse,
        provider: Option<ProviderId>,
        items: &[&CartItem],
        audit: &AuditContext,
    ) -> Option<NewCartShipping> {
        let products: Vec<FreightProduct> = items
            .iter()
            .filter_map(|item| {
                item.supplier_reference()
                    .map(|vid| FreightProduct { quantity: item.quantity, vid: vid.to_string() })
            })
            .collect();
        if products.is_empty() {
            warn!(
                event_name = "checkout.freight_quote_skipped",
                cart_id = ?audit.cart_id,
                "supplier items carry no supplier reference"
            );
            return None;
        }

        let request = FreightQuoteRequest {
            start_country_code: self.settings.origin_country.clone(),
            end_country_code: destination_country(warehouse, &self.settings),
            products,
        };

        let failure = match self.freight.freight_calculate(&request).await {
            Ok(options) => match FreightOption::cheapest(&options) {
                Some(best) => {
                    return Some(NewCartShipping {
                        provider_id: provider,
                        name: best.logistic_name.clone(),
                        logistic_price: best.logistic_price,
                        postage_fee: best.total_postage_fee.unwrap_or_default(),
                        transit_time: best.logistic_aging.clone(),
                    });
                }
                None => "no carrier options".to_string(),
            },
            Err(error) => error.to_string(),
        };

        warn!(
            event_name = "checkout.freight_quote_failed",
            cart_id = ?audit.cart_id,
            destination = %request.end_country_code,
            error = %failure,
            "freight quote unavailable, provider line skipped"
        );
        self.audit.emit(
            AuditEvent::from_context(
                audit,
                "checkout.freight_quote_failed",
                AuditCategory::Shipping,
                AuditOutcome::Failed,
            )
            .with_metadata("error", failure),
        );
        None
    }
}

fn group_by_provider(cart: &Cart) -> BTreeMap<Option<ProviderId>, Vec<&CartItem>> {
    let mut groups: BTreeMap<Option<ProviderId>, Vec<&CartItem>> = BTreeMap::new();
    for item in &cart.items {
        groups.entry(item.fulfillment_provider_id).or_default().push(item);
    }
    groups
}

fn destination_country(warehouse: &Warehouse, settings: &ShippingSettings) -> String {
    warehouse
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or(&settings.fallback_destination_country)
        .to_string()
}

fn weight_line(warehouse: &Warehouse, cart: &Cart) -> NewCartShipping {
    let weight_kg = cart_weight_kg(&cart.items);
    NewCartShipping {
        provider_id: None,
        name: warehouse.carrier_name.clone(),
        logistic_price: warehouse.shipping_charge(weight_kg),
        postage_fee: Decimal::ZERO,
        transit_time: None,
    }
}
