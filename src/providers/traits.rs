use async_trait::async_trait;

use super::types::ProviderError;

/// Backend hosting the assistant threads.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Open a new conversation context and return its opaque handle.
    async fn create_thread(&self) -> Result<String, ProviderError>;

    /// Register a base64-encoded file and return the backend's file id.
    async fn upload_file(&self, filename: &str, base64_payload: &str) -> Result<String, ProviderError>;

    async fn send_message(
        &self,
        thread_id: &str,
        message: &str,
        file_ids: &[String],
    ) -> Result<String, ProviderError>;
}
