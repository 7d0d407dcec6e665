//! Transport seam for opening a turn's response stream

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::{Error, Result};
use crate::identity::Identity;

/// Target environment for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Live,
    Test,
}

/// JSON body of the POST that opens a streaming turn.
///
/// `thread_id`/`user_id` are included once known; `user_name` only on the
/// very first turn of a conversation, before a thread exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub agent_id: String,
    pub message: String,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl TurnRequest {
    /// Build the outgoing body from the identity committed at this moment.
    pub fn build(
        agent_id: &str,
        message: &str,
        environment: Environment,
        identity: &Identity,
        user_name: Option<&str>,
    ) -> Self {
        let first_turn = identity.thread_id.is_none();
        Self {
            agent_id: agent_id.to_string(),
            message: message.to_string(),
            environment,
            thread_id: identity.thread_id.clone(),
            user_id: identity.user_id.clone(),
            user_name: if first_turn {
                user_name.map(str::to_string)
            } else {
                None
            },
        }
    }
}

/// Raw chunks of the open response stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes>> + Send>>;

/// Opens the network stream for a turn.
///
/// Implementations surface non-success statuses as errors before any frame
/// is decoded. They have no retry responsibility; a failed open ends the
/// turn.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &TurnRequest) -> Result<ByteStream>;
}

/// reqwest-backed transport for the assistant backend.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    /// Attach a bearer credential to every request.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &TurnRequest) -> Result<ByteStream> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                code: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(response.bytes_stream().map_err(Error::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_carries_user_name() {
        let request = TurnRequest::build(
            "agent-1",
            "hi",
            Environment::Live,
            &Identity::default(),
            Some("Robin"),
        );
        assert_eq!(request.user_name.as_deref(), Some("Robin"));
        assert!(request.thread_id.is_none());
    }

    #[test]
    fn test_user_name_omitted_once_thread_exists() {
        let identity = Identity {
            thread_id: Some("t1".into()),
            user_id: Some("u1".into()),
        };
        let request =
            TurnRequest::build("agent-1", "hi", Environment::Live, &identity, Some("Robin"));
        assert!(request.user_name.is_none());
        assert_eq!(request.thread_id.as_deref(), Some("t1"));
        assert_eq!(request.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_body_uses_camel_case_and_skips_absent_fields() {
        let request = TurnRequest::build(
            "agent-1",
            "hello",
            Environment::Test,
            &Identity::default(),
            None,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["agentId"], "agent-1");
        assert_eq!(json["environment"], "test");
        assert!(json.get("threadId").is_none());
        assert!(json.get("userId").is_none());
        assert!(json.get("userName").is_none());
    }
}
