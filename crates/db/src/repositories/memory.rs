use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use storefront_core::domain::cart::{Cart, CartId, CartShipping, CartShippingId, NewCartShipping};
use storefront_core::domain::conversation::{Conversation, ConversationId, NewConversation};
use storefront_core::domain::customer::{CustomerId, StaffUser};
use storefront_core::domain::message::{Message, MessageId, NewMessage, SenderType};
use storefront_core::domain::order::Order;
use storefront_core::domain::warehouse::Warehouse;

use super::{
    CartRepository, CartShippingRepository, ConversationRepository, MessageRepository,
    OrderRepository, RepositoryError, StaffRepository, WarehouseRepository,
};

#[derive(Default)]
struct ConversationTable {
    rows: HashMap<i64, Conversation>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    table: RwLock<ConversationTable>,
}

fn active_for<'a>(
    rows: &'a HashMap<i64, Conversation>,
    customer_id: &CustomerId,
) -> Option<&'a Conversation> {
    rows.values()
        .filter(|conversation| &conversation.customer_id == customer_id && conversation.is_active())
        .max_by_key(|conversation| (conversation.updated_at, conversation.id))
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id.0).cloned())
    }

    async fn find_active_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let table = self.table.read().await;
        Ok(active_for(&table.rows, customer_id).cloned())
    }

    async fn find_or_create_active(
        &self,
        draft: NewConversation,
    ) -> Result<(Conversation, bool), RepositoryError> {
        let mut table = self.table.write().await;
        if let Some(existing) = active_for(&table.rows, &draft.customer_id) {
            return Ok((existing.clone(), false));
        }

        table.next_id += 1;
        let conversation = draft.into_conversation(ConversationId(table.next_id));
        table.rows.insert(conversation.id.0, conversation.clone());
        Ok((conversation, true))
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        if conversation.is_active() {
            if let Some(other) = active_for(&table.rows, &conversation.customer_id) {
                if other.id != conversation.id {
                    return Err(RepositoryError::Conflict(format!(
                        "customer {} already has active conversation {}",
                        conversation.customer_id.0, other.id.0
                    )));
                }
            }
        }
        table.next_id = table.next_id.max(conversation.id.0);
        table.rows.insert(conversation.id.0, conversation);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let mut messages = self.messages.write().await;
        let next_id = messages.last().map(|last| last.id.0).unwrap_or(0) + 1;
        let message = message.into_message(MessageId(next_id));
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_visible(
        &self,
        conversation_id: ConversationId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|message| message.conversation_id == conversation_id)
            .filter(|message| message.is_customer_visible())
            .filter(|message| after.map_or(true, |after| message.id > after))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent_visible(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<Message> = messages
            .iter()
            .rev()
            .filter(|message| message.conversation_id == conversation_id)
            .filter(|message| message.is_customer_visible())
            .take(limit as usize)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn latest(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().rev().find(|message| message.conversation_id == conversation_id).cloned())
    }

    async fn count(&self, conversation_id: ConversationId) -> Result<u64, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|message| message.conversation_id == conversation_id).count()
            as u64)
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        senders: &[SenderType],
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for message in messages.iter_mut().filter(|message| {
            message.conversation_id == conversation_id
                && !message.is_internal_note
                && message.read_at.is_none()
                && senders.contains(&message.sender_type())
        }) {
            message.read_at = Some(read_at);
            updated += 1;
        }
        Ok(updated)
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderRepository {
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.push(order);
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_number_for_customer(
        &self,
        customer_id: &CustomerId,
        number: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .find(|order| &order.customer_id == customer_id && order.number == number)
            .cloned())
    }

    async fn recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut owned: Vec<Order> =
            orders.iter().filter(|order| &order.customer_id == customer_id).cloned().collect();
        owned.sort_by(|left, right| {
            right.placed_at.cmp(&left.placed_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        owned.truncate(limit as usize);
        Ok(owned)
    }

    async fn count_paid_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<u32, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().filter(|order| &order.customer_id == customer_id && order.is_paid()).count()
            as u32)
    }
}

#[derive(Default)]
struct ShippingTable {
    rows: Vec<CartShipping>,
    next_id: i64,
}

/// Carts plus their persisted shipping lines.
#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<i64, Cart>>,
    shippings: RwLock<ShippingTable>,
}

impl InMemoryCartRepository {
    pub async fn insert(&self, cart: Cart) {
        self.carts.write().await.insert(cart.id.0, cart);
    }
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_by_id(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&id.0).cloned())
    }
}

#[async_trait::async_trait]
impl CartShippingRepository for InMemoryCartRepository {
    async fn replace_for_cart(
        &self,
        cart_id: CartId,
        lines: Vec<NewCartShipping>,
    ) -> Result<Vec<CartShipping>, RepositoryError> {
        let mut table = self.shippings.write().await;
        table.rows.retain(|row| row.cart_id != cart_id);

        let mut written = Vec::with_capacity(lines.len());
        for line in lines {
            table.next_id += 1;
            let row = line.into_shipping(CartShippingId(table.next_id), cart_id);
            table.rows.push(row.clone());
            written.push(row);
        }
        Ok(written)
    }

    async fn list_for_cart(&self, cart_id: CartId) -> Result<Vec<CartShipping>, RepositoryError> {
        let table = self.shippings.read().await;
        Ok(table.rows.iter().filter(|row| row.cart_id == cart_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryWarehouseRepository {
    warehouses: RwLock<HashMap<i64, Warehouse>>,
}

#[async_trait::async_trait]
impl WarehouseRepository for InMemoryWarehouseRepository {
    async fn default_warehouse(&self) -> Result<Option<Warehouse>, RepositoryError> {
        let warehouses = self.warehouses.read().await;
        Ok(warehouses
            .values()
            .filter(|warehouse| warehouse.is_default)
            .min_by_key(|warehouse| warehouse.id)
            .cloned())
    }

    async fn save(&self, warehouse: Warehouse) -> Result<(), RepositoryError> {
        let mut warehouses = self.warehouses.write().await;
        warehouses.insert(warehouse.id.0, warehouse);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStaffRepository {
    staff: RwLock<Vec<StaffUser>>,
}

impl InMemoryStaffRepository {
    pub async fn insert(&self, user: StaffUser) {
        self.staff.write().await.push(user);
    }
}

#[async_trait::async_trait]
impl StaffRepository for InMemoryStaffRepository {
    async fn support_staff(&self) -> Result<Vec<StaffUser>, RepositoryError> {
        let staff = self.staff.read().await;
        Ok(staff.iter().filter(|user| user.can_support).cloned().collect())
    }
}
