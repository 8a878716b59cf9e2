use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub provider: String,
    pub status: String,
    pub amount: Decimal,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}

/// Last-mile carrier state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub status: Option<String>,
}

/// Linehaul leg between the supplier and the last-mile carrier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub carrier_status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub customer_id: CustomerId,
    pub status: String,
    pub status_label: String,
    pub payment_status: String,
    pub currency: String,
    pub grand_total: Decimal,
    pub placed_at: Option<DateTime<Utc>>,
    pub supplier_order_status: Option<String>,
    pub supplier_payment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub delivery: Option<Delivery>,
    pub shipment: Option<Shipment>,
    pub payments: Vec<Payment>,
}

impl Order {
    pub fn latest_payment(&self) -> Option<&Payment> {
        self.payments.last()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.eq_ignore_ascii_case("paid")
    }

    /// Last-mile status, then linehaul carrier status, then the order status.
    pub fn tracking_status(&self) -> &str {
        self.delivery
            .as_ref()
            .and_then(|delivery| non_blank(delivery.status.as_deref()))
            .or_else(|| {
                self.shipment.as_ref().and_then(|shipment| non_blank(shipment.carrier_status.as_deref()))
            })
            .unwrap_or(self.status.as_str())
    }

    pub fn display_status(&self) -> &str {
        non_blank(Some(self.status_label.as_str())).unwrap_or(self.status.as_str())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
