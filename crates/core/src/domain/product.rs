use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Metadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub selling_price: Decimal,
    /// Product id on the dropshipping supplier side.
    pub supplier_pid: Option<String>,
    /// Raw supplier product document, kept for weight lookups.
    pub supplier_payload: Option<Value>,
    pub active: bool,
}

impl Product {
    pub fn supplier_field(&self, key: &str) -> Option<&str> {
        self.supplier_payload.as_ref().and_then(|payload| payload.get(key)).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub price: Decimal,
    pub supplier_vid: Option<String>,
    pub metadata: Option<Metadata>,
}

impl ProductVariant {
    pub fn metadata_field(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref().and_then(|metadata| metadata.get(key)).and_then(Value::as_str)
    }
}
