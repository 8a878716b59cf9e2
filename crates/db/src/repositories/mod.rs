use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_core::domain::cart::{Cart, CartId, CartShipping, NewCartShipping};
use storefront_core::domain::conversation::{Conversation, ConversationId, NewConversation};
use storefront_core::domain::customer::{CustomerId, StaffUser};
use storefront_core::domain::message::{Message, MessageId, NewMessage, SenderType};
use storefront_core::domain::order::Order;
use storefront_core::domain::warehouse::Warehouse;
use storefront_core::errors::ApplicationError;

pub mod cart_shipping;
pub mod conversation;
pub mod memory;
pub mod message;
pub mod warehouse;

pub use cart_shipping::SqlCartShippingRepository;
pub use conversation::SqlConversationRepository;
pub use memory::{
    InMemoryCartRepository, InMemoryConversationRepository, InMemoryMessageRepository,
    InMemoryOrderRepository, InMemoryStaffRepository, InMemoryWarehouseRepository,
};
pub use message::SqlMessageRepository;
pub use warehouse::SqlWarehouseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    /// Most recently updated conversation in an active status.
    async fn find_active_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Returns the customer's active conversation, creating it from `draft` when none exists.
    /// The flag is `true` when a new row was written.
    async fn find_or_create_active(
        &self,
        draft: NewConversation,
    ) -> Result<(Conversation, bool), RepositoryError>;

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    /// Customer-visible messages in ascending id order, strictly after `after` when given.
    async fn list_visible(
        &self,
        conversation_id: ConversationId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// The last `limit` customer-visible messages, oldest first.
    async fn recent_visible(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;

    /// Newest message of any kind, internal notes included.
    async fn latest(&self, conversation_id: ConversationId)
        -> Result<Option<Message>, RepositoryError>;

    async fn count(&self, conversation_id: ConversationId) -> Result<u64, RepositoryError>;

    /// Stamps `read_at` on unread, non-internal messages from the given senders.
    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        senders: &[SenderType],
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_number_for_customer(
        &self,
        customer_id: &CustomerId,
        number: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Newest first by placement date.
    async fn recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn count_paid_for_customer(&self, customer_id: &CustomerId)
        -> Result<u32, RepositoryError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_id(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;
}

#[async_trait]
pub trait CartShippingRepository: Send + Sync {
    /// Deletes every shipping row of the cart and writes `lines` in one transaction.
    async fn replace_for_cart(
        &self,
        cart_id: CartId,
        lines: Vec<NewCartShipping>,
    ) -> Result<Vec<CartShipping>, RepositoryError>;

    async fn list_for_cart(&self, cart_id: CartId) -> Result<Vec<CartShipping>, RepositoryError>;
}

#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    async fn default_warehouse(&self) -> Result<Option<Warehouse>, RepositoryError>;
    async fn save(&self, warehouse: Warehouse) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait StaffRepository: Send + Sync {
    /// Staff accounts allowed to pick up support conversations.
    async fn support_staff(&self) -> Result<Vec<StaffUser>, RepositoryError>;
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(decode_error)
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(parse_timestamp).transpose()
}
