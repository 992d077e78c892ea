//! Outbound request to the chat endpoint.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;

use crate::error::TransportError;
use crate::state::{ChatMessage, GenerationSettings};

/// Raw body chunks as they come off the wire.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// JSON body sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stream: bool,
}

impl ChatRequest {
    pub fn streaming<'a>(
        messages: impl IntoIterator<Item = &'a ChatMessage>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            messages: messages.into_iter().cloned().collect(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            stream: true,
        }
    }
}

/// Opens a streamed response for a request.
///
/// Implementations must report a non-success status as
/// [`TransportError::Status`] without reading the body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, endpoint: &str, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self, endpoint: &str, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        (**self).open(endpoint, request).await
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, endpoint: &str, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Stream(e.to_string())));
        Ok(Box::pin(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_field_names() {
        let settings = GenerationSettings {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            max_tokens: 256,
            top_p: 0.25,
        };
        let request = ChatRequest::streaming(&[ChatMessage::user("hi")], &settings);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": "gpt-4o-mini",
                "temperature": 0.5,
                "maxTokens": 256,
                "topP": 0.25,
                "stream": true,
            })
        );
    }
}
