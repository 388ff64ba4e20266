//! Completion Gateway
//!
//! Wire types and the HTTP client for the external chat-completion service.
//! One gateway instance owns a reused `reqwest::Client` so repeated calls
//! share a connection pool. The service has two response shapes in the wild
//! (`result.message` and `choices[0].message`) and two spellings of the
//! tool-call list (`toolCalls` / `tool_calls`); both are accepted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Header carrying the conversation identifier to the completion service.
pub const CORRELATION_HEADER: &str = "X-Conversation-Id";

/// One turn of a conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Synthetic tool-result turn appended after a tool execution.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub function: FunctionCall,
}

/// Name and arguments of one requested invocation. Arguments arrive either
/// already structured or as a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Declaration of a callable tool sent alongside the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDeclaration {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        ToolDeclaration {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// The assistant message extracted from a completion response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantMessage {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A response with neither tool calls nor content is malformed.
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.content.trim().is_empty()
    }

    /// Re-encode as a transcript turn for the tool protocol.
    pub fn into_chat_message(self) -> ChatMessage {
        ChatMessage {
            role: "assistant".to_string(),
            content: self.content,
            tool_calls: if self.tool_calls.is_empty() {
                None
            } else {
                Some(self.tool_calls)
            },
            tool_call_id: None,
        }
    }
}

/// One completion request: transcript, tool declarations, per-call
/// credential and the conversation identifier for correlation.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDeclaration>,
    /// Opaque bearer credential. Never logged.
    pub credential: Option<String>,
    pub session_id: Option<String>,
}

/// Failures of one completion call, kept distinct so callers can tell a
/// timeout from a transport error from a malformed body.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("completion request timed out")]
    Timeout,
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("completion service returned status {0}")]
    Status(u16),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Seam for the completion service, mockable in tests.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<AssistantMessage, GatewayError>;
}

/// HTTP gateway to the production completion endpoint.
pub struct HttpCompletionGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpCompletionGateway {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Self {
        HttpCompletionGateway {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            timeout,
        }
    }

    /// Pull the assistant message out of either response shape.
    fn parse_response(body: &Value) -> Result<AssistantMessage, GatewayError> {
        let message = body
            .pointer("/result/message")
            .or_else(|| body.pointer("/choices/0/message"))
            .ok_or_else(|| {
                GatewayError::MalformedResponse("no message object in response".to_string())
            })?;

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let raw_calls = message
            .get("toolCalls")
            .or_else(|| message.get("tool_calls"))
            .cloned();

        let tool_calls = match raw_calls {
            Some(value) => serde_json::from_value::<Vec<ToolCall>>(value).map_err(|e| {
                GatewayError::MalformedResponse(format!("bad tool call list: {e}"))
            })?,
            None => Vec::new(),
        };

        let assistant = AssistantMessage {
            content,
            tool_calls,
        };
        if assistant.is_empty() {
            return Err(GatewayError::MalformedResponse(
                "response has neither content nor tool calls".to_string(),
            ));
        }
        Ok(assistant)
    }
}

#[async_trait]
impl Completion for HttpCompletionGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<AssistantMessage, GatewayError> {
        let credential = request
            .credential
            .as_deref()
            .or(self.api_key.as_deref())
            .unwrap_or_default()
            .to_string();
        debug!(
            credential_provided = !credential.is_empty(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "calling completion service"
        );

        let payload = serde_json::json!({
            "messages": request.messages,
            "tools": request.tools,
            "temperature": 0,
            "max_tokens": 4000,
        });

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload);
        if !credential.is_empty() {
            let bearer = if credential.starts_with("Bearer ") {
                credential
            } else {
                format!("Bearer {credential}")
            };
            builder = builder.header("Authorization", bearer);
        }
        if let Some(session_id) = &request.session_id {
            builder = builder.header(CORRELATION_HEADER, session_id);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                error!("completion call timed out");
                GatewayError::Timeout
            } else {
                error!("completion call failed: {e}");
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "completion service rejected request");
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_result_message_shape() {
        let body = json!({"result": {"message": {"role": "assistant", "content": "hello"}}});
        let message = HttpCompletionGateway::parse_response(&body).unwrap();
        assert_eq!(message.content, "hello");
        assert!(!message.has_tool_calls());
    }

    #[test]
    fn test_parse_choices_shape_with_camel_case_tool_calls() {
        let body = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": "",
                "toolCalls": [
                    {"id": "c1", "function": {"name": "get_ohlcv", "arguments": {"ticker": "005930"}}}
                ]
            }}]
        });
        let message = HttpCompletionGateway::parse_response(&body).unwrap();
        assert!(message.has_tool_calls());
        assert_eq!(message.tool_calls[0].function.name, "get_ohlcv");
    }

    #[test]
    fn test_parse_snake_case_tool_calls() {
        let body = json!({
            "result": {"message": {
                "content": "",
                "tool_calls": [
                    {"id": "c1", "function": {"name": "a", "arguments": "{}"}}
                ]
            }}
        });
        let message = HttpCompletionGateway::parse_response(&body).unwrap();
        assert_eq!(message.tool_calls.len(), 1);
    }

    #[test]
    fn test_empty_message_is_malformed() {
        let body = json!({"result": {"message": {"content": ""}}});
        let err = HttpCompletionGateway::parse_response(&body).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_message_object_is_malformed() {
        let body = json!({"status": "ok"});
        assert!(matches!(
            HttpCompletionGateway::parse_response(&body),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_tool_result_message_shape() {
        let turn = ChatMessage::tool_result("c1", "{\"ok\":true}");
        assert_eq!(turn.role, "tool");
        assert_eq!(turn.tool_call_id.as_deref(), Some("c1"));
    }
}
