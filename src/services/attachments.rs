use anyhow::{Context, Result};
use base64::Engine;

use crate::models::{AttachmentRef, UploadedFile};
use crate::services::database::Database;
use crate::services::gateway::AssistantGateway;

/// Standard RFC 4648 base64, padded, no line wrapping.
pub fn encode_bytes(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Turns uploaded files into backend file references.
#[derive(Clone)]
pub struct AttachmentEncoder {
    db: Database,
    gateway: AssistantGateway,
}

impl AttachmentEncoder {
    pub fn new(db: Database, gateway: AssistantGateway) -> Self {
        Self { db, gateway }
    }

    pub async fn encode(&self, file: &UploadedFile) -> Result<String> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {}", file.path.display()))?;

        let payload = encode_bytes(&bytes);
        let file_id = self
            .gateway
            .upload(&file.filename, &payload)
            .await
            .with_context(|| format!("Upload of {} rejected", file.filename))?;

        Ok(file_id)
    }

    /// Encode every file, record each success on the conversation, and skip
    /// the ones that fail.
    pub async fn encode_all(&self, conversation_id: &str, files: &[UploadedFile]) -> Vec<String> {
        let mut file_ids = Vec::with_capacity(files.len());

        for file in files {
            match self.register(conversation_id, file).await {
                Ok(file_id) => file_ids.push(file_id),
                Err(e) => {
                    tracing::warn!("Skipping attachment {}: {:#}", file.filename, e);
                }
            }
        }

        file_ids
    }

    async fn register(&self, conversation_id: &str, file: &UploadedFile) -> Result<String> {
        let file_id = self.encode(file).await?;
        let attachment = AttachmentRef {
            filename: file.filename.clone(),
            file_id: file_id.clone(),
        };
        self.db.push_attachment(conversation_id, &attachment).await?;
        Ok(file_id)
    }
}
