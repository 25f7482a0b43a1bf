pub mod cli;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod modes;
pub mod providers;
pub mod render;
pub mod stream;

use std::pin::Pin;

use futures_util::stream::{Stream, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use error::{ChatError, Result};

use config::Config;
use providers::{ChatCompletion, ChatMessage, ChatRequest};

/// Lazily decoded text fragments of one streamed completion.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Thin client for one chat-completions endpoint with a static bearer token.
///
/// No timeout or retry is configured beyond reqwest's defaults. Every call
/// takes a [`CancellationToken`]; a fired token makes the call return
/// [`ChatError::Cancelled`] and drops the in-flight request.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        ChatClient {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Use a preconfigured reqwest client (proxy, TLS or pool settings).
    pub fn with_client(client: Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        ChatClient { client, endpoint: endpoint.into(), api_key: api_key.into() }
    }

    /// Fails with [`ChatError::MissingApiKey`] when no key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = config.require_api_key()?;
        Ok(Self::new(config.endpoint(), key))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // -----------------------------------------------------------------------
    // Batched completion
    // -----------------------------------------------------------------------

    /// Send a non-streaming request and return the top choice's text.
    ///
    /// `Ok(None)` means the service answered but without any content; callers
    /// substitute their own placeholder.
    pub async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let request = ChatRequest { model: model.to_string(), messages, stream: false };
        let response = self.send(&request, cancel).await?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            body = response.text() => body?,
        };
        let completion: ChatCompletion = serde_json::from_str(&body)?;
        let content = completion.first_content().map(str::to_string);
        if content.is_none() {
            debug!(model, "completion returned no content");
        }
        Ok(content)
    }

    // -----------------------------------------------------------------------
    // Streaming completion
    // -----------------------------------------------------------------------

    /// Send a streaming request and return its decoded fragments.
    ///
    /// HTTP errors are returned here; transport failures mid-body and
    /// cancellation arrive as an `Err` item that ends the stream.
    pub async fn stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<FragmentStream> {
        let request = ChatRequest { model: model.to_string(), messages, stream: true };
        let response = self.send(&request, cancel).await?;

        let bytes = response.bytes_stream().map(|chunk| chunk.map_err(ChatError::from));
        let guarded = stream::until_cancelled(Box::pin(bytes), cancel.clone());
        Ok(Box::pin(stream::decode_stream(Box::pin(guarded))))
    }

    async fn send(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        info!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "sending chat completion request"
        );

        let pending = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            response = pending => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat completion request failed");
            return Err(ChatError::Http { status: status.as_u16(), body });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::Provider;

    #[test]
    fn test_from_config_requires_api_key() {
        let err = ChatClient::from_config(&Config::default()).err().expect("should fail");
        assert!(matches!(err, ChatError::MissingApiKey { .. }));
    }

    #[test]
    fn test_from_config_uses_provider_endpoint() {
        let config = Config {
            provider: Provider::Openai,
            api_key: Some("sk-test".into()),
            ..Config::default()
        };
        let client = ChatClient::from_config(&config).expect("client");
        assert_eq!(client.endpoint(), Provider::Openai.endpoint());
    }

    #[test]
    fn test_from_config_endpoint_override() {
        let config = Config {
            endpoint: Some("http://localhost:1234/v1/chat/completions".into()),
            api_key: Some("k".into()),
            ..Config::default()
        };
        let client = ChatClient::from_config(&config).expect("client");
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let client = ChatClient::new("http://127.0.0.1:9/v1/chat/completions", "k");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.complete("m", vec![], &cancel).await.unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
    }
}
