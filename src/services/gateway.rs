use std::sync::Arc;

use crate::config::FALLBACK_REPLY;
use crate::providers::{AssistantBackend, ProviderError};

/// Front door to the assistant backend for the quote flow.
///
/// Message sends never fail: backend errors are logged and replaced by
/// [`FALLBACK_REPLY`] so the conversation always shows a reply.
#[derive(Clone)]
pub struct AssistantGateway {
    backend: Arc<dyn AssistantBackend>,
}

impl AssistantGateway {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    pub async fn send(&self, thread_id: &str, message: &str, attachment_ids: &[String]) -> String {
        match self
            .backend
            .send_message(thread_id, message, attachment_ids)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Assistant call failed for thread {}: {}", thread_id, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    pub async fn upload(&self, filename: &str, base64_payload: &str) -> Result<String, ProviderError> {
        self.backend.upload_file(filename, base64_payload).await
    }

    pub async fn create_thread(&self) -> Result<String, ProviderError> {
        self.backend.create_thread().await
    }
}
