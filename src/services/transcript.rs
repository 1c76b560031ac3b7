use anyhow::{Context, Result};

use crate::services::database::Database;

/// Append-only conversation log keyed by conversation record id.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    db: Database,
}

impl TranscriptStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Format one exchange as stored in the transcript.
    pub fn exchange(user: &str, assistant: &str) -> String {
        format!("User: {}\nAssistant: {}", user, assistant)
    }

    pub async fn append(&self, conversation_id: &str, entry: &str) -> Result<()> {
        if entry.is_empty() {
            anyhow::bail!("Refusing to append an empty transcript entry");
        }
        self.db
            .append_transcript(conversation_id, entry)
            .await
            .with_context(|| format!("Failed to append transcript for {}", conversation_id))
    }

    pub async fn transcript(&self, conversation_id: &str) -> Result<String> {
        self.db
            .get_transcript(conversation_id)
            .await?
            .with_context(|| format!("Conversation not found: {}", conversation_id))
    }
}
