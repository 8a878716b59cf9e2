//! Cart checkout: supplier freight quotes, shipping fee persistence and discount pricing.

pub mod freight;
pub mod pricing;
pub mod shipping;

pub use freight::{
    FreightClient, FreightError, FreightOption, FreightProduct, FreightQuoteRequest,
    SupplierFreightClient,
};
pub use pricing::{CheckoutPricer, PricingError};
pub use shipping::{ShippingCalculator, ShippingError, ShippingSettings};
