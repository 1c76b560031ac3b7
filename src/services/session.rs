use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::models::ConversationRecord;
use crate::services::database::Database;
use crate::services::gateway::AssistantGateway;

/// Maps a user key to its conversation record, creating one on first contact.
#[derive(Clone)]
pub struct SessionResolver {
    db: Database,
    gateway: AssistantGateway,
}

impl SessionResolver {
    pub fn new(db: Database, gateway: AssistantGateway) -> Self {
        Self { db, gateway }
    }

    pub async fn resolve(&self, user_key: &str, contact_email: &str) -> Result<ConversationRecord> {
        if let Some(existing) = self
            .db
            .find_by_user_key(user_key)
            .await
            .context("Failed to look up conversation")?
        {
            return Ok(existing);
        }

        let thread_id = self
            .gateway
            .create_thread()
            .await
            .context("Failed to create assistant thread")?;

        let now = Utc::now();
        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            user_key: user_key.to_string(),
            contact_email: contact_email.to_string(),
            thread_id,
            chat_transcript: String::new(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if self
            .db
            .insert_conversation(&record)
            .await
            .context("Failed to save conversation")?
        {
            tracing::info!("Created conversation {} for {}", record.id, user_key);
            return Ok(record);
        }

        // Lost a race with a concurrent first contact for the same key.
        tracing::warn!(
            "Conversation for {} created concurrently, abandoning thread {}",
            user_key,
            record.thread_id
        );
        self.db
            .find_by_user_key(user_key)
            .await?
            .context("Conversation vanished after insert conflict")
    }
}
