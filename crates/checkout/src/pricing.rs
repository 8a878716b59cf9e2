use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use storefront_core::domain::cart::CartId;
use storefront_core::errors::ApplicationError;
use storefront_core::pricing::discount::{CampaignManager, PromotionEngine, PurchaseHistory};
use storefront_core::pricing::{cart_totals_with_trace, CartTotals};
use storefront_db::repositories::{
    CartRepository, CartShippingRepository, OrderRepository, RepositoryError,
};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("cart {0} not found")]
    CartNotFound(i64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PricingError> for ApplicationError {
    fn from(error: PricingError) -> Self {
        match error {
            PricingError::CartNotFound(id) => {
                ApplicationError::Integration(format!("cart {id} not found"))
            }
            PricingError::Repository(error) => error.into(),
        }
    }
}

/// Prices a cart from its items, the customer's order history and the persisted shipping lines.
pub struct CheckoutPricer {
    carts: Arc<dyn CartRepository>,
    shippings: Arc<dyn CartShippingRepository>,
    orders: Arc<dyn OrderRepository>,
    promotions: Arc<dyn PromotionEngine>,
    campaigns: CampaignManager,
}

impl CheckoutPricer {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        shippings: Arc<dyn CartShippingRepository>,
        orders: Arc<dyn OrderRepository>,
        promotions: Arc<dyn PromotionEngine>,
        campaigns: CampaignManager,
    ) -> Self {
        Self { carts, shippings, orders, promotions, campaigns }
    }

    pub async fn price_cart(&self, cart_id: CartId) -> Result<CartTotals, PricingError> {
        let cart = self.carts.find_by_id(cart_id).await?.ok_or(PricingError::CartNotFound(cart_id.0))?;

        let history = PurchaseHistory {
            paid_orders: self.orders.count_paid_for_customer(&cart.customer_id).await?,
        };
        let evaluation = self.promotions.evaluate(&cart);
        let discount = self.campaigns.best_for_cart(cart.subtotal(), &history, &evaluation);

        let shipping_total: Decimal = self
            .shippings
            .list_for_cart(cart_id)
            .await?
            .iter()
            .map(|line| line.logistic_price)
            .sum();

        let totals = cart_totals_with_trace(&cart, discount, shipping_total);
        debug!(
            cart_id = cart_id.0,
            subtotal = %totals.subtotal,
            discount = %totals.discount_total,
            grand_total = %totals.grand_total,
            "cart priced"
        );
        Ok(totals)
    }
}
