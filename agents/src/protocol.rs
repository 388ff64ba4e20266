//! Tool-Calling Protocol
//!
//! One round: a single completion call, then at most one sequential pass
//! of tool executions. The model either answers directly or requests N
//! tool calls; requested calls run in order, each failure is captured in
//! place without aborting its siblings, and the round's overall success
//! is the AND over every call. There is no second completion call and no
//! retry here.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest, ToolCall};
use stockagent_core::AgentError;
use stockagent_tools::ToolRegistry;

/// One executed (or failed) tool call within a round.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub name: String,
    pub arguments: Value,
    /// Result payload on success, error text on failure.
    pub result: String,
    pub success: bool,
}

/// Outcome of one protocol round.
#[derive(Debug, Clone)]
pub struct ToolRound {
    /// Direct answer text when the model skipped tools, otherwise the
    /// assistant content accompanying the tool request (often empty).
    pub content: String,
    /// Transcript including the assistant turn and one tool turn per call.
    pub transcript: Vec<ChatMessage>,
    pub results: Vec<ToolCallResult>,
    /// AND over all per-call success flags (true when no tool was called).
    pub success: bool,
    /// Aggregate `name: result` pairs for every failed call.
    pub error: Option<String>,
}

impl ToolRound {
    /// Results of the calls that succeeded, in execution order.
    pub fn successful(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.results.iter().filter(|r| r.success)
    }
}

/// Run one protocol round against `registry`.
///
/// Gateway failures (timeout, transport, malformed response) surface as
/// `AgentError::Gateway`; tool failures stay inside the returned round.
pub async fn run_tool_round(
    gateway: &Arc<dyn Completion>,
    registry: &ToolRegistry,
    mut transcript: Vec<ChatMessage>,
    credential: Option<String>,
    session_id: Option<String>,
) -> Result<ToolRound, AgentError> {
    let request = CompletionRequest {
        messages: transcript.clone(),
        tools: registry.declarations(),
        credential,
        session_id,
    };
    let assistant = gateway.complete(request).await?;

    if assistant.is_empty() {
        return Err(AgentError::ToolProtocol(
            "model returned neither content nor tool calls".to_string(),
        ));
    }

    if !assistant.has_tool_calls() {
        debug!("model answered directly without tools");
        let content = assistant.content.clone();
        transcript.push(assistant.into_chat_message());
        return Ok(ToolRound {
            content,
            transcript,
            results: Vec::new(),
            success: true,
            error: None,
        });
    }

    let calls = assistant.tool_calls.clone();
    let content = assistant.content.clone();
    transcript.push(assistant.into_chat_message());

    info!(calls = calls.len(), "executing requested tool calls");
    let mut results = Vec::with_capacity(calls.len());
    for call in &calls {
        let result = execute_call(registry, call).await;
        transcript.push(ChatMessage::tool_result(
            call.id.clone(),
            result.result.clone(),
        ));
        results.push(result);
    }

    let success = results.iter().all(|r| r.success);
    let error = if success {
        None
    } else {
        let detail = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| format!("{}: {}", r.name, r.result))
            .collect::<Vec<_>>()
            .join("; ");
        warn!("tool round failed: {detail}");
        Some(detail)
    };

    Ok(ToolRound {
        content,
        transcript,
        results,
        success,
        error,
    })
}

/// Execute one requested call, capturing every failure as a failed entry.
async fn execute_call(registry: &ToolRegistry, call: &ToolCall) -> ToolCallResult {
    let name = call.function.name.clone();

    // Arguments arrive structured or as a JSON-encoded string.
    let arguments = match &call.function.arguments {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ToolCallResult {
                    name,
                    arguments: Value::Null,
                    result: format!("malformed tool arguments: {e}"),
                    success: false,
                }
            }
        },
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };

    let Some(tool) = registry.get(&name) else {
        return ToolCallResult {
            name: name.clone(),
            arguments,
            result: format!("unknown tool: {name}"),
            success: false,
        };
    };

    match tool.invoke(arguments.clone()).await {
        Ok(payload) => ToolCallResult {
            name,
            arguments,
            result: payload.to_string(),
            success: true,
        },
        Err(e) => ToolCallResult {
            name,
            arguments,
            result: e.to_string(),
            success: false,
        },
    }
}
