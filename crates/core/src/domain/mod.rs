pub mod cart;
pub mod conversation;
pub mod customer;
pub mod message;
pub mod order;
pub mod product;
pub mod warehouse;

pub type Metadata = serde_json::Map<String, serde_json::Value>;
