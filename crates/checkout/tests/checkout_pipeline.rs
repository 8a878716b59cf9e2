use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use storefront_checkout::freight::{FreightClient, FreightError, FreightOption, FreightQuoteRequest};
use storefront_checkout::pricing::CheckoutPricer;
use storefront_checkout::shipping::{ShippingCalculator, ShippingError, ShippingSettings};
use storefront_core::audit::InMemoryAuditSink;
use storefront_core::domain::cart::{Cart, CartId, CartItem, CartItemId, ProviderId};
use storefront_core::domain::customer::CustomerId;
use storefront_core::domain::order::{Order, OrderId};
use storefront_core::domain::product::{Product, ProductId, ProductVariant, VariantId};
use storefront_core::domain::warehouse::{Warehouse, WarehouseId, WeightTier};
use storefront_core::pricing::discount::{
    CampaignManager, DiscountSource, PromotionKind, PromotionRule, RulePromotionEngine,
    SHIPPING_SUPPORT_INTENT,
};
use storefront_db::repositories::{
    CartShippingRepository, InMemoryCartRepository, InMemoryOrderRepository,
    InMemoryWarehouseRepository, SqlCartShippingRepository, SqlWarehouseRepository,
    WarehouseRepository,
};
use storefront_db::{connect_with_settings, migrations};

struct StubFreight {
    response: Result<Vec<FreightOption>, FreightError>,
    requests: Mutex<Vec<FreightQuoteRequest>>,
}

impl StubFreight {
    fn new(response: Result<Vec<FreightOption>, FreightError>) -> Arc<Self> {
        Arc::new(Self { response, requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<FreightQuoteRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl FreightClient for StubFreight {
    async fn freight_calculate(
        &self,
        request: &FreightQuoteRequest,
    ) -> Result<Vec<FreightOption>, FreightError> {
        self.requests.lock().expect("lock").push(request.clone());
        self.response.clone()
    }
}

fn option(name: &str, price: i64, aging: &str) -> FreightOption {
    FreightOption {
        logistic_name: name.to_string(),
        logistic_price: Decimal::from(price),
        total_postage_fee: Some(Decimal::new(50, 2)),
        logistic_aging: Some(aging.to_string()),
    }
}

fn warehouse() -> Warehouse {
    Warehouse {
        id: WarehouseId(1),
        name: "Newark".to_string(),
        country_code: Some("US".to_string()),
        is_default: true,
        carrier_name: "Local Post".to_string(),
        weight_tiers: vec![
            WeightTier { max_kg: Decimal::ONE, price: Decimal::new(400, 2) },
            WeightTier { max_kg: Decimal::from(2), price: Decimal::new(600, 2) },
        ],
        extra_kg_price: Decimal::new(150, 2),
    }
}

fn supplier_item(quantity: u32) -> CartItem {
    CartItem {
        id: CartItemId(1),
        product: Product {
            id: ProductId(10),
            sku: "LAMP".to_string(),
            name: "Desk lamp".to_string(),
            selling_price: Decimal::from(40),
            supplier_pid: Some("P1".to_string()),
            supplier_payload: Some(json!({"packingWeight": "400-600", "productWeight": "450"})),
            active: true,
        },
        variant: Some(ProductVariant {
            id: VariantId(11),
            product_id: ProductId(10),
            sku: "LAMP-BLK".to_string(),
            price: Decimal::from(40),
            supplier_vid: Some("V1".to_string()),
            metadata: None,
        }),
        fulfillment_provider_id: Some(ProviderId(1)),
        quantity,
    }
}

fn local_item() -> CartItem {
    CartItem {
        id: CartItemId(2),
        product: Product {
            id: ProductId(20),
            sku: "CARD".to_string(),
            name: "Gift card".to_string(),
            selling_price: Decimal::from(10),
            supplier_pid: None,
            supplier_payload: None,
            active: true,
        },
        variant: None,
        fulfillment_provider_id: Some(ProviderId(7)),
        quantity: 1,
    }
}

fn cart(items: Vec<CartItem>) -> Cart {
    Cart {
        id: CartId(42),
        customer_id: CustomerId("cus-9".to_string()),
        currency: "USD".to_string(),
        items,
    }
}

struct Fixture {
    carts: Arc<InMemoryCartRepository>,
    warehouses: Arc<InMemoryWarehouseRepository>,
    audit: InMemoryAuditSink,
}

async fn fixture(items: Vec<CartItem>, with_warehouse: bool) -> Fixture {
    let carts = Arc::new(InMemoryCartRepository::default());
    carts.insert(cart(items)).await;
    let warehouses = Arc::new(InMemoryWarehouseRepository::default());
    if with_warehouse {
        warehouses.save(warehouse()).await.expect("warehouse");
    }
    Fixture { carts, warehouses, audit: InMemoryAuditSink::default() }
}

fn calculator(fixture: &Fixture, freight: Arc<StubFreight>) -> ShippingCalculator {
    ShippingCalculator::new(
        fixture.carts.clone(),
        fixture.carts.clone(),
        fixture.warehouses.clone(),
        freight,
        ShippingSettings::default(),
    )
    .with_audit_sink(Arc::new(fixture.audit.clone()))
}

#[tokio::test]
async fn cheapest_supplier_option_is_persisted_next_to_the_weight_line() {
    let fixture = fixture(vec![supplier_item(2)], true).await;
    let freight = StubFreight::new(Ok(vec![option("ePacket", 7, "7-12"), option("CJPacket", 5, "10-15")]));

    let total = calculator(&fixture, freight.clone())
        .calculate_shipping_fees(CartId(42))
        .await
        .expect("shipping");

    let requests = freight.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].start_country_code, "CN");
    assert_eq!(requests[0].end_country_code, "US");
    assert_eq!(requests[0].products.len(), 1);
    assert_eq!(requests[0].products[0].quantity, 2);
    assert_eq!(requests[0].products[0].vid, "V1");

    let lines = fixture.carts.list_for_cart(CartId(42)).await.expect("lines");
    assert_eq!(lines.len(), 2);
    let supplier = lines.iter().find(|line| line.provider_id == Some(ProviderId(1))).expect("supplier");
    assert_eq!(supplier.name, "CJPacket");
    assert_eq!(supplier.logistic_price, Decimal::from(5));
    assert_eq!(supplier.postage_fee, Decimal::new(50, 2));
    assert_eq!(supplier.transit_time.as_deref(), Some("10-15"));

    // 2 x 600 g = 1.2 kg falls in the 2 kg tier
    let weight = lines.iter().find(|line| line.provider_id.is_none()).expect("weight line");
    assert_eq!(weight.name, "Local Post");
    assert_eq!(weight.logistic_price, Decimal::new(600, 2));

    assert_eq!(total, Decimal::new(1_100, 2));
    assert_eq!(fixture.audit.events_of_type("checkout.shipping_calculated").len(), 1);
}

#[tokio::test]
async fn recalculating_replaces_previous_lines() {
    let fixture = fixture(vec![supplier_item(2)], true).await;
    let freight = StubFreight::new(Ok(vec![option("CJPacket", 5, "10-15")]));
    let calculator = calculator(&fixture, freight);

    let first = calculator.calculate_shipping_fees(CartId(42)).await.expect("first");
    let second = calculator.calculate_shipping_fees(CartId(42)).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(fixture.carts.list_for_cart(CartId(42)).await.expect("lines").len(), 2);
}

#[tokio::test]
async fn freight_failure_keeps_only_the_weight_line() {
    let fixture = fixture(vec![supplier_item(1)], true).await;
    let freight = StubFreight::new(Err(FreightError::Transport("timeout".to_string())));

    let total = calculator(&fixture, freight).calculate_shipping_fees(CartId(42)).await.expect("shipping");

    let lines = fixture.carts.list_for_cart(CartId(42)).await.expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].provider_id, None);
    assert_eq!(total, Decimal::new(400, 2));
    assert_eq!(fixture.audit.events_of_type("checkout.freight_quote_failed").len(), 1);
}

#[tokio::test]
async fn empty_quote_list_is_skipped() {
    let fixture = fixture(vec![supplier_item(1)], true).await;

    let total = calculator(&fixture, StubFreight::new(Ok(Vec::new())))
        .calculate_shipping_fees(CartId(42))
        .await
        .expect("shipping");

    assert_eq!(total, Decimal::new(400, 2));
}

#[tokio::test]
async fn other_providers_never_request_freight_quotes() {
    let fixture = fixture(vec![local_item()], true).await;
    let freight = StubFreight::new(Ok(vec![option("CJPacket", 5, "10-15")]));

    let total = calculator(&fixture, freight.clone())
        .calculate_shipping_fees(CartId(42))
        .await
        .expect("shipping");

    assert!(freight.requests().is_empty());
    // no usable weight
    assert_eq!(total, Decimal::ZERO);
    let lines = fixture.carts.list_for_cart(CartId(42)).await.expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].name, "Local Post");
}

#[tokio::test]
async fn missing_default_warehouse_is_fatal() {
    let fixture = fixture(vec![supplier_item(1)], false).await;
    let freight = StubFreight::new(Ok(vec![option("CJPacket", 5, "10-15")]));

    let error = calculator(&fixture, freight.clone())
        .calculate_shipping_fees(CartId(42))
        .await
        .expect_err("no warehouse");

    assert!(matches!(error, ShippingError::MissingDefaultWarehouse));
    assert!(freight.requests().is_empty());
    assert!(fixture.carts.list_for_cart(CartId(42)).await.expect("lines").is_empty());
}

#[tokio::test]
async fn shipping_lines_persist_through_sqlite() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
    migrations::run_pending(&pool).await.expect("migrations");
    let warehouses = Arc::new(SqlWarehouseRepository::new(pool.clone()));
    warehouses.save(warehouse()).await.expect("warehouse");
    let shippings = Arc::new(SqlCartShippingRepository::new(pool));
    let carts = Arc::new(InMemoryCartRepository::default());
    carts.insert(cart(vec![supplier_item(2)])).await;

    let calculator = ShippingCalculator::new(
        carts,
        shippings.clone(),
        warehouses,
        StubFreight::new(Ok(vec![option("ePacket", 7, "7-12"), option("CJPacket", 5, "10-15")])),
        ShippingSettings::default(),
    );
    calculator.calculate_shipping_fees(CartId(42)).await.expect("first");
    let total = calculator.calculate_shipping_fees(CartId(42)).await.expect("second");

    let lines = shippings.list_for_cart(CartId(42)).await.expect("lines");
    assert_eq!(lines.len(), 2);
    assert_eq!(total, Decimal::new(1_100, 2));
}

fn paid_order() -> Order {
    Order {
        id: OrderId(1),
        number: "DS-0000000001".to_string(),
        customer_id: CustomerId("cus-9".to_string()),
        status: "completed".to_string(),
        status_label: "Completed".to_string(),
        payment_status: "paid".to_string(),
        currency: "USD".to_string(),
        grand_total: Decimal::from(30),
        placed_at: None,
        supplier_order_status: None,
        supplier_payment_status: None,
        tracking_number: None,
        tracking_url: None,
        delivery: None,
        shipment: None,
        payments: Vec::new(),
    }
}

async fn priced(
    orders: Vec<Order>,
    rules: Vec<PromotionRule>,
) -> storefront_core::pricing::CartTotals {
    let fixture = fixture(vec![supplier_item(2)], true).await;
    calculator(&fixture, StubFreight::new(Ok(vec![option("CJPacket", 5, "10-15")])))
        .calculate_shipping_fees(CartId(42))
        .await
        .expect("shipping");

    let order_repository = Arc::new(InMemoryOrderRepository::default());
    for order in orders {
        order_repository.insert(order).await;
    }

    CheckoutPricer::new(
        fixture.carts.clone(),
        fixture.carts.clone(),
        order_repository,
        Arc::new(RulePromotionEngine::new(rules)),
        CampaignManager::default(),
    )
    .price_cart(CartId(42))
    .await
    .expect("price")
}

#[tokio::test]
async fn first_time_customers_get_the_first_order_discount() {
    let totals = priced(Vec::new(), Vec::new()).await;

    let discount = totals.discount.expect("discount");
    assert_eq!(discount.source, DiscountSource::FirstOrder);
    assert_eq!(totals.subtotal, Decimal::from(80));
    assert_eq!(totals.discount_total, Decimal::from(8));
    assert_eq!(totals.shipping_total, Decimal::from(11));
    assert_eq!(totals.grand_total, Decimal::from(83));
}

#[tokio::test]
async fn returning_customers_fall_back_to_the_high_value_discount() {
    let totals = priced(vec![paid_order()], Vec::new()).await;

    let discount = totals.discount.expect("discount");
    assert_eq!(discount.source, DiscountSource::HighValue);
    assert_eq!(totals.discount_total, Decimal::from(4));
}

#[tokio::test]
async fn shipping_support_promotion_suppresses_automatic_discounts() {
    let rules = vec![PromotionRule {
        code: "SHIPFREE".to_string(),
        label: "Shipping help".to_string(),
        kind: PromotionKind::Fixed(Decimal::from(3)),
        minimum_subtotal: Decimal::ZERO,
        intent: Some(SHIPPING_SUPPORT_INTENT.to_string()),
    }];

    let totals = priced(Vec::new(), rules).await;

    let discount = totals.discount.expect("discount");
    assert_eq!(discount.source, DiscountSource::Promotion);
    assert_eq!(discount.label, "Shipping help");
    assert_eq!(totals.discount_total, Decimal::from(3));
}
