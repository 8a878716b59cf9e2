use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::product::{Product, ProductVariant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartItemId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartShippingId(pub i64);

/// Fulfillment provider that ships a cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: Product,
    pub variant: Option<ProductVariant>,
    pub fulfillment_provider_id: Option<ProviderId>,
    pub quantity: u32,
}

impl CartItem {
    pub fn unit_price(&self) -> Decimal {
        match &self.variant {
            Some(variant) => variant.price,
            None => self.product.selling_price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }

    /// Supplier-side identifier sent with freight quotes: variant id, else product id.
    pub fn supplier_reference(&self) -> Option<&str> {
        self.variant
            .as_ref()
            .and_then(|variant| variant.supplier_vid.as_deref())
            .or(self.product.supplier_pid.as_deref())
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub currency: String,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartShipping {
    pub id: CartShippingId,
    pub cart_id: CartId,
    pub provider_id: Option<ProviderId>,
    pub name: String,
    pub logistic_price: Decimal,
    pub postage_fee: Decimal,
    pub transit_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartShipping {
    pub provider_id: Option<ProviderId>,
    pub name: String,
    pub logistic_price: Decimal,
    pub postage_fee: Decimal,
    pub transit_time: Option<String>,
}

impl NewCartShipping {
    pub fn into_shipping(self, id: CartShippingId, cart_id: CartId) -> CartShipping {
        CartShipping {
            id,
            cart_id,
            provider_id: self.provider_id,
            name: self.name,
            logistic_price: self.logistic_price,
            postage_fee: self.postage_fee,
            transit_time: self.transit_time,
        }
    }
}
