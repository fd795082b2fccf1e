//! Transport abstraction and the HTTP implementation.

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::request::ChatRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Raw response body chunks, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens a streaming chat exchange.
///
/// Resolving the future means the response headers arrived with a success
/// status. The returned stream must end promptly once `cancel` fires;
/// dropping it must abort the underlying request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the request and return the body chunk stream.
    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError>;
}

/// HTTP transport: `POST` the request as JSON, stream the body back.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a transport from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let endpoint = config
            .stream_url()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, endpoint })
    }

    /// Create a transport with a custom HTTP client.
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Endpoint this transport posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, TransportError> {
        tracing::debug!(endpoint = %self.endpoint, "opening response stream");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "backend rejected chat request");
            return Err(TransportError::status(status.as_u16(), error_detail(&body)));
        }

        let chunks = response
            .bytes_stream()
            .map_err(TransportError::from)
            .take_until(cancel.cancelled_owned());
        Ok(Box::pin(chunks))
    }
}

/// Extract a readable message from an error response body.
///
/// Understands `{"detail": ..}`, `{"error": ..}` and `{"message": ..}`;
/// anything else is returned trimmed.
fn error_detail(body: &str) -> String {
    if let Ok(JsonValue::Object(obj)) = serde_json::from_str::<JsonValue>(body) {
        for key in ["detail", "error", "message"] {
            match obj.get(key) {
                Some(JsonValue::String(text)) => return text.clone(),
                Some(JsonValue::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport_for(server: &MockServer) -> HttpTransport {
        let config = ClientConfig::new()
            .with_base_url(server.uri())
            .with_stream_path("/api/chat/stream");
        HttpTransport::new(&config).unwrap()
    }

    async fn collect(mut chunks: ChunkStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        body
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"detail":"Conversation not found"}"#), "Conversation not found");
        assert_eq!(error_detail(r#"{"error":{"code":7}}"#), r#"{"code":7}"#);
        assert_eq!(error_detail(r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_detail("  upstream exploded \n"), "upstream exploded");
        assert_eq!(error_detail(r#"{"other":1}"#), r#"{"other":1}"#);
    }

    #[tokio::test]
    async fn test_posts_request_and_streams_body() {
        let server = MockServer::start().await;
        let body = "{\"type\":\"token\",\"delta\":\"hi\"}\n{\"final\":true,\"message_id\":\"m1\"}\n";

        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(body_json(serde_json::json!({
                "conversation_id": "c-1",
                "message": "hello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let request = ChatRequest::new("hello").in_conversation("c-1");
        let chunks = transport
            .open_stream(&request, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(collect(chunks).await, body.as_bytes());
    }

    #[tokio::test]
    async fn test_non_success_status_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({
                    "detail": "Conversation not found"
                })),
            )
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let err = match transport
            .open_stream(&ChatRequest::new("hi"), CancellationToken::new())
            .await
        {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Conversation not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_ends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"delta\":\"x\"}\n"))
            .mount(&server)
            .await;

        let transport = transport_for(&server).await;
        let cancel = CancellationToken::new();
        let chunks = transport
            .open_stream(&ChatRequest::new("hi"), cancel.clone())
            .await
            .unwrap();
        cancel.cancel();

        assert!(collect(chunks).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"delta\":\"x\"}\n"))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/v2/stream", server.uri())).unwrap();
        let client = Client::builder()
            .user_agent("agentfeed-tests")
            .build()
            .unwrap();
        let transport = HttpTransport::with_client(client, endpoint.clone());
        assert_eq!(transport.endpoint(), &endpoint);

        let chunks = transport
            .open_stream(&ChatRequest::new("hi"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(collect(chunks).await, b"{\"delta\":\"x\"}\n");
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = ClientConfig::new().with_base_url("http://backend:9000/");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "http://backend:9000/api/chat/stream"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = ClientConfig::new().with_base_url("::nope::");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
