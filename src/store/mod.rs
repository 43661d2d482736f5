//! Conversation, message, and subscription storage.
//!
//! The relational engine itself is an external collaborator; this module
//! defines the row model and the [`ChatRepository`] seam the pipeline
//! writes through, plus an in-memory implementation used for embedded
//! deployments and tests. Messages are append-only within a conversation
//! and their persisted order is the insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::PlanType;

/// Conversation visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Readable by anyone with the link.
    Public,
    /// Readable and writable only by the owner.
    #[default]
    Private,
}

/// A conversation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Chat ID.
    pub id: String,
    /// Owning identity ID.
    pub owner_id: String,
    /// Title, derived from the first user message.
    pub title: String,
    /// Visibility.
    pub visibility: Visibility,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Create a new chat owned by `owner_id`, titling it from the first
    /// user message.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, first_message: &str, visibility: Visibility) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: derive_title(first_message),
            visibility,
            created_at: Utc::now(),
        }
    }
}

/// Derive a chat title from the first user message.
fn derive_title(message: &str) -> String {
    const MAX_TITLE_CHARS: usize = 80;
    let trimmed = message.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

/// Role of a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Message from the user.
    User,
    /// Message from the assistant.
    Assistant,
}

/// An ordered content part of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Model reasoning content.
    Reasoning {
        /// The reasoning content.
        text: String,
    },
    /// A tool invocation and its observed result.
    ToolInvocation {
        /// Tool call ID.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Arguments as a JSON string.
        arguments: String,
        /// Result content.
        result: String,
        /// Whether the tool executed successfully.
        success: bool,
    },
    /// An attachment reference.
    Attachment {
        /// Display name.
        name: String,
        /// Attachment URL.
        url: String,
        /// Media type.
        media_type: String,
    },
}

/// A message row. Append-only within its conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message ID.
    pub id: String,
    /// Conversation this message belongs to.
    pub chat_id: String,
    /// Author role.
    pub role: ChatRole,
    /// Ordered content parts.
    pub parts: Vec<MessagePart>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message with a single text part.
    pub fn user_text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            role: ChatRole::User,
            parts: vec![MessagePart::Text { text: text.into() }],
            created_at: Utc::now(),
        }
    }

    /// Create an assistant message from collected parts.
    pub fn assistant(chat_id: impl Into<String>, parts: Vec<MessagePart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            role: ChatRole::Assistant,
            parts,
            created_at: Utc::now(),
        }
    }

    /// Concatenated text content of this message.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A subscription row; one per user, implicit `free` when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// User ID.
    pub user_id: String,
    /// Plan tier.
    pub plan: PlanType,
    /// Billing period label (e.g. "monthly", "yearly").
    pub billing_period: String,
    /// Subscription status (e.g. "active", "cancelled").
    pub status: String,
    /// Current billing period start.
    pub current_period_start: DateTime<Utc>,
    /// Current billing period end.
    pub current_period_end: DateTime<Utc>,
    /// Whether the subscription lapses at period end.
    pub cancel_at_period_end: bool,
}

/// Storage seam for chats, messages, and subscriptions.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert a new chat.
    async fn create_chat(&self, chat: Chat) -> anyhow::Result<()>;

    /// Fetch a chat by ID.
    async fn get_chat(&self, id: &str) -> anyhow::Result<Option<Chat>>;

    /// Delete a chat and its messages.
    async fn delete_chat(&self, id: &str) -> anyhow::Result<()>;

    /// Append a message to its conversation.
    async fn append_message(&self, message: ChatMessage) -> anyhow::Result<()>;

    /// List messages in persisted insertion order.
    async fn list_messages(&self, chat_id: &str) -> anyhow::Result<Vec<ChatMessage>>;

    /// Fetch a user's subscription, if any.
    async fn get_subscription(&self, user_id: &str) -> anyhow::Result<Option<Subscription>>;

    /// Insert or replace a user's subscription.
    async fn upsert_subscription(&self, subscription: Subscription) -> anyhow::Result<()>;
}

/// In-memory repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    chats: Mutex<HashMap<String, Chat>>,
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for MemoryRepository {
    async fn create_chat(&self, chat: Chat) -> anyhow::Result<()> {
        self.chats.lock().insert(chat.id.clone(), chat);
        Ok(())
    }

    async fn get_chat(&self, id: &str) -> anyhow::Result<Option<Chat>> {
        Ok(self.chats.lock().get(id).cloned())
    }

    async fn delete_chat(&self, id: &str) -> anyhow::Result<()> {
        self.chats.lock().remove(id);
        self.messages.lock().remove(id);
        Ok(())
    }

    async fn append_message(&self, message: ChatMessage) -> anyhow::Result<()> {
        self.messages
            .lock()
            .entry(message.chat_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self.messages.lock().get(chat_id).cloned().unwrap_or_default())
    }

    async fn get_subscription(&self, user_id: &str) -> anyhow::Result<Option<Subscription>> {
        Ok(self.subscriptions.lock().get(user_id).cloned())
    }

    async fn upsert_subscription(&self, subscription: Subscription) -> anyhow::Result<()> {
        self.subscriptions
            .lock()
            .insert(subscription.user_id.clone(), subscription);
        Ok(())
    }
}
