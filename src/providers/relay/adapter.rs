use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::models::*;
use crate::providers::traits::AssistantBackend;
use crate::providers::types::ProviderError;

/// JSON-over-HTTP client for the assistant relay service.
pub struct RelayBackend {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RelayBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        // One trailing slash, trimmed again by `pop_if_empty` when segments are appended.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            ProviderError::RequestFailed(format!("Invalid base URL {}: {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded
    /// and dot segments are refused, so ids can never escape their endpoint.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        if let Some(bad) = segments.iter().find(|s| !Self::is_plain_segment(s)) {
            return Err(ProviderError::RequestFailed(format!(
                "Invalid path segment: {:?}",
                bad
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::RequestFailed(format!("Base URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn is_plain_segment(segment: &str) -> bool {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && !segment.contains(&['/', '\\', '?', '#'][..])
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.header("Authorization", format!("Bearer {}", key)),
            _ => req,
        }
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<RelayErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        Ok(response)
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ProviderError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self
            .client
            .post(url.clone())
            .header("content-type", "application/json")
            .json(body);

        let response = self.authorize(req).send().await.map_err(|e| {
            ProviderError::NetworkError(format!("Failed to connect to {}: {}", url, e))
        })?;

        Self::check_status(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AssistantBackend for RelayBackend {
    async fn create_thread(&self) -> Result<String, ProviderError> {
        let response: IdResponse = self
            .post_json(self.endpoint(&["threads"])?, &CreateThreadRequest {})
            .await?;
        Ok(response.id)
    }

    async fn upload_file(&self, filename: &str, base64_payload: &str) -> Result<String, ProviderError> {
        let request = UploadFileRequest {
            filename,
            data: base64_payload,
            purpose: "assistants",
        };
        let response: IdResponse = self.post_json(self.endpoint(&["files"])?, &request).await?;
        Ok(response.id)
    }

    async fn send_message(
        &self,
        thread_id: &str,
        message: &str,
        file_ids: &[String],
    ) -> Result<String, ProviderError> {
        let url = self.endpoint(&["threads", thread_id, "messages"])?;
        let request = SendMessageRequest {
            content: message,
            file_ids,
        };
        let response: ReplyResponse = self.post_json(url, &request).await?;
        Ok(response.reply)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    fn backend(base: &str) -> RelayBackend {
        RelayBackend::new(base, None, Duration::from_secs(2)).unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn serve_once(status: &str, extra_headers: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + content_length || n == 0 {
                        break;
                    }
                } else if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });

        (base, handle)
    }

    fn request_body(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let relay = backend("https://example.com/api/assistants");
        assert_eq!(
            relay.endpoint(&["threads", "t1", "messages"]).unwrap().as_str(),
            "https://example.com/api/assistants/threads/t1/messages"
        );

        let relay = backend("https://example.com/api/");
        assert_eq!(relay.endpoint(&["files"]).unwrap().as_str(), "https://example.com/api/files");

        let relay = backend("https://example.com");
        assert_eq!(relay.endpoint(&["threads"]).unwrap().as_str(), "https://example.com/threads");
    }

    #[test]
    fn test_endpoint_rejects_escaping_segments() {
        let relay = backend("https://example.com/api");
        for bad in ["", ".", "..", "a/b", "a\\b", "t1?x=1", "t1#frag"] {
            let err = relay.endpoint(&["threads", bad, "messages"]).unwrap_err();
            assert!(matches!(err, ProviderError::RequestFailed(_)), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_endpoint_percent_encodes_ids() {
        let relay = backend("https://example.com/api");
        assert_eq!(
            relay.endpoint(&["threads", "t 1%", "messages"]).unwrap().as_str(),
            "https://example.com/api/threads/t%201%25/messages"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(RelayBackend::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        assert_eq!(
            RelayBackend::parse_error_message(status, r#"{"error":{"message":"bad thread"}}"#),
            "HTTP 400: bad thread"
        );
        assert_eq!(
            RelayBackend::parse_error_message(status, "<html>"),
            "HTTP 400: Request failed"
        );
    }

    #[test]
    fn test_send_request_shape() {
        let ids = vec!["file_1".to_string()];
        let json = serde_json::to_value(SendMessageRequest {
            content: "hello",
            file_ids: &ids,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"content": "hello", "file_ids": ["file_1"]}));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let relay = backend(&format!("http://{}", addr));
        let err = relay.create_thread().await.unwrap_err();
        assert!(matches!(err, ProviderError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_dot_segment_thread_id_is_not_sent() {
        let relay = backend("http://127.0.0.1:9/api");
        for bad in ["..", ".", "../files", "t1?x", "t1#x"] {
            let err = relay.send_message(bad, "hi", &[]).await.unwrap_err();
            assert!(matches!(err, ProviderError::RequestFailed(_)), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let (base, server) = serve_once("401 Unauthorized", "", "{}").await;
        let err = backend(&base).create_thread().await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthError(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_too_many_requests_reads_retry_after() {
        let (base, server) = serve_once("429 Too Many Requests", "retry-after: 7\r\n", "{}").await;
        let err = backend(&base).send_message("thread_1", "hi", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_request_carries_backend_message() {
        let (base, server) = serve_once(
            "400 Bad Request",
            "",
            r#"{"error":{"message":"unknown thread"}}"#,
        )
        .await;
        let err = backend(&base).send_message("thread_1", "hi", &[]).await.unwrap_err();
        match err {
            ProviderError::RequestFailed(msg) => assert_eq!(msg, "HTTP 400: unknown thread"),
            other => panic!("unexpected error: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_round_trip() {
        let (base, server) = serve_once("200 OK", "", r#"{"id":"file_9"}"#).await;
        let relay = RelayBackend::new(&base, Some("secret".to_string()), Duration::from_secs(2)).unwrap();

        let file_id = relay.upload_file("hull.jpg", "aGVsbG8=").await.unwrap();
        assert_eq!(file_id, "file_9");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/files HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert_eq!(
            request_body(&request),
            serde_json::json!({"filename": "hull.jpg", "data": "aGVsbG8=", "purpose": "assistants"})
        );
    }

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let (base, server) = serve_once("200 OK", "", r#"{"reply":"Hello!"}"#).await;

        let ids = vec!["file_1".to_string()];
        let reply = backend(&base).send_message("thread_1", "hi", &ids).await.unwrap();
        assert_eq!(reply, "Hello!");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/threads/thread_1/messages HTTP/1.1"));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
        assert_eq!(
            request_body(&request),
            serde_json::json!({"content": "hi", "file_ids": ["file_1"]})
        );
    }
}
