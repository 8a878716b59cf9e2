use chrono::{DateTime, Utc};
use sqlx::Row;

use storefront_core::domain::conversation::ConversationId;
use storefront_core::domain::customer::{CustomerId, UserId};
use storefront_core::domain::message::{
    Message, MessageId, MessageType, NewMessage, Sender, SenderType,
};
use storefront_core::domain::Metadata;

use super::{decode_error, parse_optional_timestamp, parse_timestamp, MessageRepository, RepositoryError};
use crate::DbPool;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_type, customer_id, user_id,
    message_type, body, metadata, is_internal_note, read_at, created_at";

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let conversation_id: i64 = row.try_get("conversation_id").map_err(decode_error)?;
    let sender_type: String = row.try_get("sender_type").map_err(decode_error)?;
    let customer_id: Option<String> = row.try_get("customer_id").map_err(decode_error)?;
    let user_id: Option<String> = row.try_get("user_id").map_err(decode_error)?;
    let message_type: String = row.try_get("message_type").map_err(decode_error)?;
    let body: String = row.try_get("body").map_err(decode_error)?;
    let metadata: Option<String> = row.try_get("metadata").map_err(decode_error)?;
    let is_internal_note: bool = row.try_get("is_internal_note").map_err(decode_error)?;
    let read_at: Option<String> = row.try_get("read_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    let sender_type = SenderType::parse(&sender_type)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown sender type `{sender_type}`")))?;
    let sender = Sender::from_parts(sender_type, customer_id.map(CustomerId), user_id.map(UserId))
        .ok_or_else(|| {
            RepositoryError::Decode(format!("message {id} is missing its {} reference", sender_type.as_str()))
        })?;
    let message_type = MessageType::parse(&message_type)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown message type `{message_type}`")))?;
    let metadata = metadata
        .map(|raw| serde_json::from_str::<Metadata>(&raw))
        .transpose()
        .map_err(decode_error)?;

    Ok(Message {
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        sender,
        message_type,
        body,
        metadata,
        is_internal_note,
        read_at: parse_optional_timestamp(read_at)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let metadata = message
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(decode_error)?;

        let result = sqlx::query(
            "INSERT INTO support_messages (conversation_id, sender_type, customer_id, user_id,
                                           message_type, body, metadata, is_internal_note, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.conversation_id.0)
        .bind(message.sender.sender_type().as_str())
        .bind(message.sender.customer_id().map(|id| id.0.clone()))
        .bind(message.sender.user_id().map(|id| id.0.clone()))
        .bind(message.message_type.as_str())
        .bind(&message.body)
        .bind(metadata)
        .bind(message.is_internal_note)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(message.into_message(MessageId(result.last_insert_rowid())))
    }

    async fn list_visible(
        &self,
        conversation_id: ConversationId,
        after: Option<MessageId>,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM support_messages
             WHERE conversation_id = ? AND is_internal_note = 0 AND id > ?
             ORDER BY id ASC
             LIMIT ?"
        ))
        .bind(conversation_id.0)
        .bind(after.map(|id| id.0).unwrap_or(0))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect()
    }

    async fn recent_visible(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM support_messages
             WHERE conversation_id = ? AND is_internal_note = 0
             ORDER BY id DESC
             LIMIT ?"
        ))
        .bind(conversation_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn latest(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM support_messages
             WHERE conversation_id = ?
             ORDER BY id DESC
             LIMIT 1"
        ))
        .bind(conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    async fn count(&self, conversation_id: ConversationId) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM support_messages WHERE conversation_id = ?")
                .bind(conversation_id.0)
                .fetch_one(&self.pool)
                .await?
                .try_get("count")
                .map_err(decode_error)?;
        Ok(count.max(0) as u64)
    }

    async fn mark_read(
        &self,
        conversation_id: ConversationId,
        senders: &[SenderType],
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for sender in senders {
            let result = sqlx::query(
                "UPDATE support_messages SET read_at = ?
                 WHERE conversation_id = ? AND sender_type = ?
                   AND is_internal_note = 0 AND read_at IS NULL",
            )
            .bind(read_at.to_rfc3339())
            .bind(conversation_id.0)
            .bind(sender.as_str())
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }
}
