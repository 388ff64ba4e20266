//! Answer Generation
//!
//! One completion call with no tools turns the retrieval payload into the
//! final answer text. The prompt variant depends on whether the turn went
//! through self-clarification; a gateway failure degrades to a fixed
//! apology instead of surfacing the error.

use std::sync::Arc;
use tracing::warn;

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest};
use stockagent_core::ConversationState;

use crate::prompts;

/// Write the final answer into `state.response`.
pub async fn generate_response(gateway: &Arc<dyn Completion>, state: &mut ConversationState) {
    let system = if state.clarification.is_some() {
        prompts::ANSWER_CLARIFIED_SYSTEM
    } else {
        prompts::ANSWER_SYSTEM
    };

    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(system),
            ChatMessage::user(user_turn(state)),
        ],
        tools: Vec::new(),
        credential: state.credential.clone(),
        session_id: Some(state.session_id.clone()),
    };

    state.response = match gateway.complete(request).await {
        Ok(message) if !message.content.trim().is_empty() => message.content.trim().to_string(),
        Ok(_) => {
            warn!("answer generation returned empty content");
            prompts::DEGRADED_ANSWER.to_string()
        }
        Err(e) => {
            warn!("answer generation failed: {e}");
            prompts::DEGRADED_ANSWER.to_string()
        }
    };
}

/// Compact text rendering of the turn for the answer prompt.
fn user_turn(state: &ConversationState) -> String {
    let mut parts = Vec::new();
    match &state.clarification {
        Some(info) => {
            parts.push(format!("원래 질문: {}", info.original_query));
            parts.push(format!("구체화된 질문: {}", info.clarified_query));
            if !info.start_date.is_empty() || !info.end_date.is_empty() {
                parts.push(format!("조회 기간: {} ~ {}", info.start_date, info.end_date));
            }
        }
        None => parts.push(format!("질문: {}", state.query)),
    }

    match &state.data {
        Some(data) => {
            parts.push(format!("조회 요약: {}", data.summary));
            parts.push(format!(
                "조회 결과: {}",
                serde_json::to_string(&data.payload).unwrap_or_default()
            ));
        }
        None => parts.push("조회 결과: 없음".to_string()),
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stockagent_core::llm::{AssistantMessage, GatewayError};
    use stockagent_core::ClarificationInfo;

    struct ScriptedGateway {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl Completion for ScriptedGateway {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<AssistantMessage, GatewayError> {
            match &self.reply {
                Ok(text) => Ok(AssistantMessage {
                    content: text.clone(),
                    tool_calls: Vec::new(),
                }),
                Err(()) => Err(GatewayError::Transport("down".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_answer_written_to_state() {
        let gateway: Arc<dyn Completion> = Arc::new(ScriptedGateway {
            reply: Ok("삼성전자 종가는 70,000원입니다.".to_string()),
        });
        let mut state = ConversationState::new("S1");
        state.query = "2024-07-15 삼성전자 종가는?".to_string();
        generate_response(&gateway, &mut state).await;
        assert_eq!(state.response, "삼성전자 종가는 70,000원입니다.");
    }

    #[tokio::test]
    async fn test_gateway_failure_degrades_to_apology() {
        let gateway: Arc<dyn Completion> = Arc::new(ScriptedGateway { reply: Err(()) });
        let mut state = ConversationState::new("S1");
        generate_response(&gateway, &mut state).await;
        assert_eq!(state.response, prompts::DEGRADED_ANSWER);
    }

    #[test]
    fn test_user_turn_mentions_clarification() {
        let mut state = ConversationState::new("S1");
        state.query = "구체화된 질문".to_string();
        state.clarification = Some(ClarificationInfo {
            original_query: "요즘 좋은 주식?".to_string(),
            clarified_query: "구체화된 질문".to_string(),
            start_date: "2024-07-01".to_string(),
            end_date: "2024-07-15".to_string(),
            ..Default::default()
        });
        let turn = user_turn(&state);
        assert!(turn.contains("원래 질문"));
        assert!(turn.contains("2024-07-01"));
    }
}
