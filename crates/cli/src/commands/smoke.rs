use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tokio::runtime::Runtime;

use crate::commands::{escape_json, CommandResult};
use storefront_agent::llm::{ChatClient, ChatMessage, LlmError};
use storefront_agent::orchestrator::{SupportOrchestrator, SupportRepositories};
use storefront_checkout::freight::{FreightClient, FreightError, FreightOption, FreightQuoteRequest};
use storefront_checkout::pricing::CheckoutPricer;
use storefront_checkout::shipping::{ShippingCalculator, ShippingSettings};
use storefront_core::config::{AppConfig, LoadOptions, SupportSettings};
use storefront_core::domain::cart::{Cart, CartId, CartItem, CartItemId, ProviderId};
use storefront_core::domain::conversation::{AgentKind, ConversationStatus};
use storefront_core::domain::customer::{Customer, CustomerId};
use storefront_core::domain::order::{Order, OrderId};
use storefront_core::domain::product::{Product, ProductId, ProductVariant, VariantId};
use storefront_core::domain::warehouse::{Warehouse, WarehouseId, WeightTier};
use storefront_core::domain::Metadata;
use storefront_core::pricing::discount::{
    CampaignManager, DiscountPolicy, DiscountSource, RulePromotionEngine,
};
use storefront_db::repositories::{
    ConversationRepository, InMemoryCartRepository, InMemoryConversationRepository,
    InMemoryMessageRepository, InMemoryOrderRepository, InMemoryStaffRepository,
    InMemoryWarehouseRepository, WarehouseRepository,
};
use storefront_db::{connect_with_settings, migrations};

const SMOKE_ORDER_NUMBER: &str = "DS-0000000001";
const SMOKE_CART: CartId = CartId(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

/// Never reached by the smoke exchange: rule replies and keyword hand-off answer first.
struct OfflineChat;

#[async_trait]
impl ChatClient for OfflineChat {
    async fn chat(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

struct FixedQuote;

#[async_trait]
impl FreightClient for FixedQuote {
    async fn freight_calculate(
        &self,
        _request: &FreightQuoteRequest,
    ) -> Result<Vec<FreightOption>, FreightError> {
        Ok(vec![quote("ePacket", 7), quote("CJPacket", 5)])
    }
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed(|| AppConfig::load(LoadOptions::default())) {
        (elapsed_ms, Ok(config)) => {
            checks.push(pass("config_validation", elapsed_ms, "configuration loaded and validated"));
            config
        }
        (elapsed_ms, Err(error)) => {
            checks.push(fail("config_validation", elapsed_ms, error.to_string()));
            skip_remaining(&mut checks);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(fail(
                "db_connectivity",
                0,
                format!("failed to initialize async runtime: {error}"),
            ));
            skip_remaining(&mut checks);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let db_started = Instant::now();
    let db_result = runtime.block_on(connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    ));
    let pool = match db_result {
        Ok(pool) => {
            checks.push(pass(
                "db_connectivity",
                elapsed_since(db_started),
                format!("connected using `{}`", config.database.url),
            ));
            pool
        }
        Err(error) => {
            checks.push(fail(
                "db_connectivity",
                elapsed_since(db_started),
                format!("failed to connect: {error}"),
            ));
            skip_remaining(&mut checks);
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let migration_started = Instant::now();
    let migration_result = runtime.block_on(migrations::run_pending(&pool));
    runtime.block_on(pool.close());
    match migration_result {
        Ok(()) => checks.push(pass(
            "migration_visibility",
            elapsed_since(migration_started),
            "migrations are visible and executable",
        )),
        Err(error) => checks.push(fail(
            "migration_visibility",
            elapsed_since(migration_started),
            format!("migration execution failed: {error}"),
        )),
    }

    checks.push(timed_async(&runtime, "support_exchange", support_exchange(&config)));
    checks.push(timed_async(&runtime, "shipping_pipeline", shipping_pipeline(&config)));
    checks.push(timed_async(&runtime, "discount_selection", discount_selection(&config)));

    finalize_report(checks, elapsed_since(started))
}

/// Opens an AI conversation, asks for an order and then asks for a person.
async fn support_exchange(config: &AppConfig) -> Result<String, String> {
    let orders = Arc::new(InMemoryOrderRepository::default());
    orders.insert(smoke_order()).await;
    let conversations = Arc::new(InMemoryConversationRepository::default());
    let orchestrator = SupportOrchestrator::new(
        SupportRepositories {
            conversations: conversations.clone(),
            messages: Arc::new(InMemoryMessageRepository::default()),
            orders,
            staff: Arc::new(InMemoryStaffRepository::default()),
        },
        Arc::new(OfflineChat),
        SupportSettings { ai_only_mode: false, ai_configured: true, ..config.support_settings() },
    );
    let customer = smoke_customer();

    let started = orchestrator
        .start_conversation(&customer, "ai", "smoke", Metadata::new())
        .await
        .map_err(|error| format!("start_conversation failed: {error}"))?;
    if started.agent_type != AgentKind::Ai {
        return Err(format!("expected an AI conversation, got {:?}", started.agent_type));
    }
    let conversation_id = started.conversation.id;

    let answer = orchestrator
        .reply_to_customer(
            conversation_id,
            &customer,
            &format!("Where is my order {SMOKE_ORDER_NUMBER}?"),
        )
        .await
        .map_err(|error| format!("order question failed: {error}"))?;
    if !answer.reply.contains(SMOKE_ORDER_NUMBER) {
        return Err(format!("order reply did not mention the order: {}", answer.reply));
    }

    let handoff = orchestrator
        .reply_to_customer(conversation_id, &customer, "agent")
        .await
        .map_err(|error| format!("handoff request failed: {error}"))?;
    if handoff.agent_type != AgentKind::Human {
        return Err("agent keyword did not hand the conversation to a human".to_string());
    }

    let conversation = conversations
        .find_by_id(conversation_id)
        .await
        .map_err(|error| format!("conversation lookup failed: {error}"))?
        .ok_or_else(|| "conversation disappeared".to_string())?;
    if conversation.status != ConversationStatus::PendingAgent {
        return Err(format!("expected pending_agent, got {:?}", conversation.status));
    }
    let messages = orchestrator
        .get_messages(conversation_id, None, 100)
        .await
        .map_err(|error| format!("get_messages failed: {error}"))?;

    Ok(format!("rule reply and hand-off verified over {} messages", messages.len()))
}

async fn shipping_pipeline(config: &AppConfig) -> Result<String, String> {
    let settings = ShippingSettings::from(&config.freight);
    let (carts, warehouses) = smoke_cart(settings.supplier_provider_id).await?;

    let calculator =
        ShippingCalculator::new(carts.clone(), carts, warehouses, Arc::new(FixedQuote), settings);
    let total = calculator
        .calculate_shipping_fees(SMOKE_CART)
        .await
        .map_err(|error| format!("shipping calculation failed: {error}"))?;

    // cheapest quote 5.00 plus 1.2 kg in the 2 kg tier at 6.00
    let expected = Decimal::new(1_100, 2);
    if total != expected {
        return Err(format!("expected shipping total {expected}, got {total}"));
    }
    Ok(format!("shipping total {total} from supplier quote and weight tier"))
}

async fn discount_selection(config: &AppConfig) -> Result<String, String> {
    let settings = ShippingSettings::from(&config.freight);
    let (carts, warehouses) = smoke_cart(settings.supplier_provider_id).await?;
    let calculator = ShippingCalculator::new(
        carts.clone(),
        carts.clone(),
        warehouses,
        Arc::new(FixedQuote),
        settings,
    );
    calculator
        .calculate_shipping_fees(SMOKE_CART)
        .await
        .map_err(|error| format!("shipping calculation failed: {error}"))?;

    let totals = CheckoutPricer::new(
        carts.clone(),
        carts,
        Arc::new(InMemoryOrderRepository::default()),
        Arc::new(RulePromotionEngine::new(Vec::new())),
        CampaignManager::new(DiscountPolicy::from(&config.promotions)),
    )
    .price_cart(SMOKE_CART)
    .await
    .map_err(|error| format!("pricing failed: {error}"))?;

    let source = totals.discount.as_ref().map(|discount| discount.source);
    if source != Some(DiscountSource::FirstOrder) {
        return Err(format!("expected a first-order discount, got {source:?}"));
    }
    if totals.grand_total != totals.subtotal - totals.discount_total + totals.shipping_total {
        return Err(format!("grand total {} does not add up", totals.grand_total));
    }
    Ok(format!(
        "first-order discount {} applied, grand total {}",
        totals.discount_total, totals.grand_total
    ))
}

async fn smoke_cart(
    provider: ProviderId,
) -> Result<(Arc<InMemoryCartRepository>, Arc<InMemoryWarehouseRepository>), String> {
    let carts = Arc::new(InMemoryCartRepository::default());
    carts
        .insert(Cart {
            id: SMOKE_CART,
            customer_id: smoke_customer().id,
            currency: "USD".to_string(),
            items: vec![smoke_item(provider)],
        })
        .await;

    let warehouses = Arc::new(InMemoryWarehouseRepository::default());
    warehouses
        .save(Warehouse {
            id: WarehouseId(1),
            name: "Smoke".to_string(),
            country_code: Some("US".to_string()),
            is_default: true,
            carrier_name: "Local Post".to_string(),
            weight_tiers: vec![
                WeightTier { max_kg: Decimal::ONE, price: Decimal::new(400, 2) },
                WeightTier { max_kg: Decimal::from(2), price: Decimal::new(600, 2) },
            ],
            extra_kg_price: Decimal::new(150, 2),
        })
        .await
        .map_err(|error| format!("failed to seed warehouse: {error}"))?;

    Ok((carts, warehouses))
}

fn smoke_item(provider: ProviderId) -> CartItem {
    CartItem {
        id: CartItemId(1),
        product: Product {
            id: ProductId(1),
            sku: "SMOKE".to_string(),
            name: "Smoke lamp".to_string(),
            selling_price: Decimal::from(40),
            supplier_pid: Some("P-SMOKE".to_string()),
            supplier_payload: Some(json!({"packingWeight": "400-600"})),
            active: true,
        },
        variant: Some(ProductVariant {
            id: VariantId(1),
            product_id: ProductId(1),
            sku: "SMOKE-1".to_string(),
            price: Decimal::from(40),
            supplier_vid: Some("V-SMOKE".to_string()),
            metadata: None,
        }),
        fulfillment_provider_id: Some(provider),
        quantity: 2,
    }
}

fn smoke_customer() -> Customer {
    Customer { id: CustomerId("smoke-customer".to_string()), name: "Smoke".to_string(), email: None }
}

fn smoke_order() -> Order {
    Order {
        id: OrderId(1),
        number: SMOKE_ORDER_NUMBER.to_string(),
        customer_id: smoke_customer().id,
        status: "processing".to_string(),
        status_label: "Processing".to_string(),
        payment_status: "paid".to_string(),
        currency: "USD".to_string(),
        grand_total: Decimal::from(80),
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

fn quote(name: &str, price: i64) -> FreightOption {
    FreightOption {
        logistic_name: name.to_string(),
        logistic_price: Decimal::from(price),
        total_postage_fee: None,
        logistic_aging: None,
    }
}

fn timed<T>(check: impl FnOnce() -> T) -> (u64, T) {
    let started = Instant::now();
    let value = check();
    (elapsed_since(started), value)
}

fn timed_async(
    runtime: &Runtime,
    name: &'static str,
    check: impl Future<Output = Result<String, String>>,
) -> SmokeCheck {
    let started = Instant::now();
    match runtime.block_on(check) {
        Ok(message) => pass(name, elapsed_since(started), message),
        Err(message) => fail(name, elapsed_since(started), message),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn pass(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
}

fn fail(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
}

fn skip_remaining(checks: &mut Vec<SmokeCheck>) {
    const ORDER: [&str; 6] = [
        "config_validation",
        "db_connectivity",
        "migration_visibility",
        "support_exchange",
        "shipping_pipeline",
        "discount_selection",
    ];
    for name in ORDER.into_iter().skip(checks.len()) {
        checks.push(SmokeCheck {
            name,
            status: SmokeStatus::Skipped,
            elapsed_ms: 0,
            message: "skipped due previous failure".to_string(),
        });
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
