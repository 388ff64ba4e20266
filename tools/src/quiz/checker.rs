//! Quiz Answer Checking
//!
//! Grades a free-text answer against the current question. The model does
//! the grading; a rule-based matcher (option number in any spelling, or
//! the company name as a substring) takes over whenever the completion
//! call fails, so a gateway outage never strands a quiz turn. Hints are
//! keyword lists derived from the question's background text and must not
//! leak the answer company.

use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest};
use stockagent_core::QuizQuestion;

const DEFAULT_CONFIDENCE: u8 = 70;
const FALLBACK_HINT: &str = "키워드: 관련 업종, 배경 정보";

/// Grading result for one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerVerdict {
    pub is_correct: bool,
    /// Self-reported confidence 0-100.
    pub confidence: u8,
    pub explanation: String,
    /// "llm" or "rule" depending on which path graded the answer.
    pub method: &'static str,
}

/// Model-first answer grader with a rule fallback.
pub struct AnswerChecker {
    gateway: Arc<dyn Completion>,
}

impl AnswerChecker {
    pub fn new(gateway: Arc<dyn Completion>) -> Self {
        AnswerChecker { gateway }
    }

    /// Grade `user_answer` against `question`.
    pub async fn check(
        &self,
        question: &QuizQuestion,
        user_answer: &str,
        credential: Option<String>,
        session_id: Option<String>,
    ) -> AnswerVerdict {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(
                    "당신은 주식 퀴즈 채점자입니다. 사용자 답변이 정답과 같은 \
                     선택지를 가리키면 정답으로 판정하세요. 반드시 아래 형식으로만 \
                     답하세요.\n정답여부: 정답 또는 오답\n신뢰도: 0-100 숫자\n이유: 한 문장",
                ),
                ChatMessage::user(grading_prompt(question, user_answer)),
            ],
            tools: Vec::new(),
            credential,
            session_id,
        };

        match self.gateway.complete(request).await {
            Ok(message) => parse_verdict(&message.content),
            Err(e) => {
                warn!("answer grading call failed, using rule fallback: {e}");
                rule_verdict(question, user_answer)
            }
        }
    }

    /// Keyword hint for the current question. The answer company must not
    /// appear in the hint text.
    pub async fn hint(
        &self,
        question: &QuizQuestion,
        credential: Option<String>,
        session_id: Option<String>,
    ) -> String {
        if question.background.trim().is_empty() {
            return FALLBACK_HINT.to_string();
        }

        let request = CompletionRequest {
            messages: vec![
                ChatMessage::system(
                    "배경지식에서 3-5개의 핵심 키워드를 뽑아 힌트를 만드세요. \
                     정답 기업명이나 그 일부는 절대 포함하지 마세요. \
                     \"키워드: ...\" 형태로만 답하세요.",
                ),
                ChatMessage::user(format!(
                    "배경지식: {}\n정답 기업명: {}",
                    question.background, question.answer_company
                )),
            ],
            tools: Vec::new(),
            credential,
            session_id,
        };

        let hint = match self.gateway.complete(request).await {
            Ok(message) => message.content.trim().to_string(),
            Err(e) => {
                warn!("hint generation call failed: {e}");
                return format!("💡 {FALLBACK_HINT}");
            }
        };
        if hint.is_empty() || leaks_answer(&hint, &question.answer_company) {
            info!(quiz_id = question.id, "hint leaked the answer, replaced");
            return format!("💡 {FALLBACK_HINT}");
        }
        format!("💡 {hint}")
    }
}

fn grading_prompt(question: &QuizQuestion, user_answer: &str) -> String {
    let options = question
        .options
        .iter()
        .map(|(number, text)| format!("{number}. {text}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "문제: {}\n선택지:\n{}\n정답: {}번 {}\n사용자 답변: {}",
        question.question, options, question.answer_number, question.answer_company, user_answer
    )
}

fn parse_verdict(text: &str) -> AnswerVerdict {
    let is_correct = text.contains("정답여부: 정답");
    let confidence = Regex::new(r"신뢰도:\s*(\d+)")
        .ok()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .map(|n| n.min(100))
        .unwrap_or(DEFAULT_CONFIDENCE);
    let explanation = Regex::new(r"이유:\s*(.+)")
        .ok()
        .and_then(|re| re.captures(text))
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "모델 판정 결과입니다.".to_string());
    AnswerVerdict {
        is_correct,
        confidence,
        explanation,
        method: "llm",
    }
}

/// Accepts the option number in any common spelling (`2`, `2번`, `②`)
/// or the company name as a substring.
fn rule_verdict(question: &QuizQuestion, user_answer: &str) -> AnswerVerdict {
    let answer = user_answer.trim();
    let number = &question.answer_number;
    let symbol = match number.as_str() {
        "1" => "①",
        "2" => "②",
        "3" => "③",
        _ => "④",
    };
    let by_number = answer == *number
        || answer == format!("{number}번")
        || answer.contains(symbol);
    let by_company =
        !question.answer_company.is_empty() && answer.contains(question.answer_company.as_str());
    AnswerVerdict {
        is_correct: by_number || by_company,
        confidence: DEFAULT_CONFIDENCE,
        explanation: "규칙 기반 판정 결과입니다.".to_string(),
        method: "rule",
    }
}

fn leaks_answer(hint: &str, company: &str) -> bool {
    !company.is_empty() && hint.contains(company)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use stockagent_core::llm::{AssistantMessage, GatewayError};

    fn question() -> QuizQuestion {
        let mut options = BTreeMap::new();
        for (k, v) in [("1", "삼성전자"), ("2", "LG에너지솔루션"), ("3", "NAVER"), ("4", "카카오")] {
            options.insert(k.to_string(), v.to_string());
        }
        QuizQuestion {
            id: 7,
            question: "2022년 코스피에 상장한 2차전지 대장주는 어디일까요?".to_string(),
            options,
            answer_number: "2".to_string(),
            answer_company: "LG에너지솔루션".to_string(),
            background: "2022년 1월 상장 첫날 시가총액 2위에 올랐습니다.".to_string(),
        }
    }

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
                Err(()) => Err(GatewayError::Timeout),
            }
        }
    }

    #[tokio::test]
    async fn test_model_verdict_is_parsed() {
        let checker = AnswerChecker::new(Arc::new(ScriptedGateway {
            reply: Ok("정답여부: 정답\n신뢰도: 95\n이유: 2번을 정확히 골랐습니다.".to_string()),
        }));
        let verdict = checker.check(&question(), "2번", None, None).await;
        assert!(verdict.is_correct);
        assert_eq!(verdict.confidence, 95);
        assert_eq!(verdict.method, "llm");
    }

    #[tokio::test]
    async fn test_gateway_failure_falls_back_to_rules() {
        let checker = AnswerChecker::new(Arc::new(ScriptedGateway { reply: Err(()) }));

        let verdict = checker.check(&question(), "② 일것 같아요", None, None).await;
        assert!(verdict.is_correct);
        assert_eq!(verdict.method, "rule");

        let verdict = checker.check(&question(), "LG에너지솔루션", None, None).await;
        assert!(verdict.is_correct);

        let verdict = checker.check(&question(), "삼성전자", None, None).await;
        assert!(!verdict.is_correct);
    }

    #[test]
    fn test_rule_verdict_number_spellings() {
        let q = question();
        assert!(rule_verdict(&q, "2").is_correct);
        assert!(rule_verdict(&q, "2번").is_correct);
        assert!(rule_verdict(&q, "정답은 ② 입니다").is_correct);
        assert!(!rule_verdict(&q, "12번째").is_correct);
    }

    #[tokio::test]
    async fn test_hint_never_leaks_company() {
        let checker = AnswerChecker::new(Arc::new(ScriptedGateway {
            reply: Ok("키워드: LG에너지솔루션, 2022년, 상장".to_string()),
        }));
        let hint = checker.hint(&question(), None, None).await;
        assert!(!hint.contains("LG에너지솔루션"));
    }

    #[tokio::test]
    async fn test_hint_failure_uses_fallback() {
        let checker = AnswerChecker::new(Arc::new(ScriptedGateway { reply: Err(()) }));
        let hint = checker.hint(&question(), None, None).await;
        assert!(hint.starts_with("💡"));
    }
}
