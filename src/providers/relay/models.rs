use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct CreateThreadRequest {}

#[derive(Debug, Serialize)]
pub struct UploadFileRequest<'a> {
    pub filename: &'a str,
    pub data: &'a str,
    pub purpose: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub content: &'a str,
    pub file_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct RelayErrorResponse {
    pub error: RelayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RelayErrorDetail {
    pub message: String,
}
