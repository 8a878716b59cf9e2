use sqlx::Row;
use uuid::Uuid;

use storefront_core::domain::conversation::{
    AgentKind, Conversation, ConversationId, ConversationStatus, NewConversation, RequestedAgent,
};
use storefront_core::domain::customer::{CustomerId, UserId};
use storefront_core::domain::Metadata;

use super::{
    decode_error, parse_optional_timestamp, parse_timestamp, ConversationRepository,
    RepositoryError,
};
use crate::DbPool;

const CONVERSATION_COLUMNS: &str = "id, uuid, customer_id, channel, status, requested_agent,
    active_agent, ai_enabled, handoff_requested, assigned_user_id, topic, tags, context,
    last_message_at, last_customer_message_at, last_agent_message_at, resolved_at,
    created_at, updated_at";

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, draft: &NewConversation) -> Result<Conversation, RepositoryError> {
        let context = serde_json::to_string(&draft.context).map_err(decode_error)?;
        let result = sqlx::query(
            "INSERT INTO support_conversations (uuid, customer_id, channel, status, requested_agent,
                                                active_agent, ai_enabled, handoff_requested, context,
                                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.uuid.to_string())
        .bind(&draft.customer_id.0)
        .bind(&draft.channel)
        .bind(draft.status.as_str())
        .bind(draft.requested_agent.as_str())
        .bind(draft.active_agent.as_str())
        .bind(draft.ai_enabled)
        .bind(draft.handoff_requested)
        .bind(context)
        .bind(draft.created_at.to_rfc3339())
        .bind(draft.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(draft.clone().into_conversation(ConversationId(result.last_insert_rowid())))
    }
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let uuid: String = row.try_get("uuid").map_err(decode_error)?;
    let customer_id: String = row.try_get("customer_id").map_err(decode_error)?;
    let channel: String = row.try_get("channel").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let requested_agent: String = row.try_get("requested_agent").map_err(decode_error)?;
    let active_agent: String = row.try_get("active_agent").map_err(decode_error)?;
    let ai_enabled: bool = row.try_get("ai_enabled").map_err(decode_error)?;
    let handoff_requested: bool = row.try_get("handoff_requested").map_err(decode_error)?;
    let assigned_user_id: Option<String> = row.try_get("assigned_user_id").map_err(decode_error)?;
    let topic: Option<String> = row.try_get("topic").map_err(decode_error)?;
    let tags: Option<String> = row.try_get("tags").map_err(decode_error)?;
    let context: String = row.try_get("context").map_err(decode_error)?;
    let last_message_at: Option<String> = row.try_get("last_message_at").map_err(decode_error)?;
    let last_customer_message_at: Option<String> =
        row.try_get("last_customer_message_at").map_err(decode_error)?;
    let last_agent_message_at: Option<String> =
        row.try_get("last_agent_message_at").map_err(decode_error)?;
    let resolved_at: Option<String> = row.try_get("resolved_at").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let status = ConversationStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown conversation status `{status}`")))?;
    let active_agent = AgentKind::parse(&active_agent)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown active agent `{active_agent}`")))?;
    let tags = tags
        .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
        .transpose()
        .map_err(decode_error)?;
    let context = serde_json::from_str::<Metadata>(&context).map_err(decode_error)?;

    Ok(Conversation {
        id: ConversationId(id),
        uuid: Uuid::parse_str(&uuid).map_err(decode_error)?,
        customer_id: CustomerId(customer_id),
        channel,
        status,
        requested_agent: RequestedAgent::normalize(&requested_agent),
        active_agent,
        ai_enabled,
        handoff_requested,
        assigned_user: assigned_user_id.map(UserId),
        topic,
        tags,
        context,
        last_message_at: parse_optional_timestamp(last_message_at)?,
        last_customer_message_at: parse_optional_timestamp(last_customer_message_at)?,
        last_agent_message_at: parse_optional_timestamp(last_agent_message_at)?,
        resolved_at: parse_optional_timestamp(resolved_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn is_unique_violation(error: &RepositoryError) -> bool {
    matches!(error, RepositoryError::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM support_conversations WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn find_active_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM support_conversations
             WHERE customer_id = ? AND status IN ('open', 'pending_agent', 'pending_customer')
             ORDER BY updated_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(&customer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn find_or_create_active(
        &self,
        draft: NewConversation,
    ) -> Result<(Conversation, bool), RepositoryError> {
        if let Some(existing) = self.find_active_for_customer(&draft.customer_id).await? {
            return Ok((existing, false));
        }

        match self.insert(&draft).await {
            Ok(created) => Ok((created, true)),
            // Lost the race against a concurrent writer; the partial unique index kept us honest.
            Err(error) if is_unique_violation(&error) => self
                .find_active_for_customer(&draft.customer_id)
                .await?
                .map(|existing| (existing, false))
                .ok_or_else(|| {
                    RepositoryError::Conflict(format!(
                        "active conversation for customer {} vanished during creation",
                        draft.customer_id.0
                    ))
                }),
            Err(error) => Err(error),
        }
    }

    async fn save(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let tags = conversation
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(decode_error)?;
        let context = serde_json::to_string(&conversation.context).map_err(decode_error)?;

        let result = sqlx::query(
            "INSERT INTO support_conversations (id, uuid, customer_id, channel, status,
                                                requested_agent, active_agent, ai_enabled,
                                                handoff_requested, assigned_user_id, topic, tags,
                                                context, last_message_at, last_customer_message_at,
                                                last_agent_message_at, resolved_at, created_at,
                                                updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 channel = excluded.channel,
                 status = excluded.status,
                 requested_agent = excluded.requested_agent,
                 active_agent = excluded.active_agent,
                 ai_enabled = excluded.ai_enabled,
                 handoff_requested = excluded.handoff_requested,
                 assigned_user_id = excluded.assigned_user_id,
                 topic = excluded.topic,
                 tags = excluded.tags,
                 context = excluded.context,
                 last_message_at = excluded.last_message_at,
                 last_customer_message_at = excluded.last_customer_message_at,
                 last_agent_message_at = excluded.last_agent_message_at,
                 resolved_at = excluded.resolved_at,
                 updated_at = excluded.updated_at",
        )
        .bind(conversation.id.0)
        .bind(conversation.uuid.to_string())
        .bind(&conversation.customer_id.0)
        .bind(&conversation.channel)
        .bind(conversation.status.as_str())
        .bind(conversation.requested_agent.as_str())
        .bind(conversation.active_agent.as_str())
        .bind(conversation.ai_enabled)
        .bind(conversation.handoff_requested)
        .bind(conversation.assigned_user.as_ref().map(|user| user.0.clone()))
        .bind(&conversation.topic)
        .bind(tags)
        .bind(context)
        .bind(conversation.last_message_at.map(|at| at.to_rfc3339()))
        .bind(conversation.last_customer_message_at.map(|at| at.to_rfc3339()))
        .bind(conversation.last_agent_message_at.map(|at| at.to_rfc3339()))
        .bind(conversation.resolved_at.map(|at| at.to_rfc3339()))
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from);

        match result {
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Conflict(format!(
                "customer {} already has an active conversation",
                conversation.customer_id.0
            ))),
            Err(error) => Err(error),
            Ok(_) => Ok(()),
        }
    }
}
