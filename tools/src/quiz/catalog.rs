//! Quiz Catalog
//!
//! Parses the plain-text quiz catalog into validated questions. A block
//! starts at a line beginning `N.`; the question either follows on the
//! same line after `Q.` or on the next line. Options are marked with the
//! circled digits ①-④, the answer line starts with `정답:` and everything
//! after it is background text for hints. Blocks that fail validation are
//! skipped with a warning, never fatal.

use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use stockagent_core::QuizQuestion;

const OPTION_SYMBOLS: [(&str, &str); 4] =
    [("①", "1"), ("②", "2"), ("③", "3"), ("④", "4")];

const MIN_QUESTION_LEN: usize = 10;
const MIN_OPTION_LEN: usize = 2;

/// All valid questions from one catalog file.
pub struct QuizCatalog {
    questions: Vec<QuizQuestion>,
}

impl QuizCatalog {
    /// Load and parse a catalog file. Fails only when the file itself is
    /// unreadable or yields no valid question at all.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read quiz catalog {}", path.display()))?;
        let catalog = Self::parse(&text)?;
        info!(
            questions = catalog.len(),
            path = %path.display(),
            "loaded quiz catalog"
        );
        Ok(catalog)
    }

    /// Parse catalog text into validated questions.
    pub fn parse(text: &str) -> Result<Self> {
        let questions: Vec<QuizQuestion> = split_blocks(text)
            .into_iter()
            .filter_map(|block| match parse_block(&block) {
                Some(question) => Some(question),
                None => {
                    let head: String = block.chars().take(40).collect();
                    warn!(head, "skipped invalid quiz block");
                    None
                }
            })
            .collect();
        if questions.is_empty() {
            return Err(anyhow!("quiz catalog contains no valid question"));
        }
        Ok(QuizCatalog { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Random question from the whole catalog.
    pub fn random(&self) -> Option<QuizQuestion> {
        self.questions.choose(&mut rand::thread_rng()).cloned()
    }

    /// Random question the user has not attempted yet. Falls back to the
    /// whole catalog once everything has been attempted.
    pub fn unplayed(&self, attempted: &[u32]) -> Option<QuizQuestion> {
        let fresh: Vec<&QuizQuestion> = self
            .questions
            .iter()
            .filter(|q| !attempted.contains(&q.id))
            .collect();
        if fresh.is_empty() {
            debug!("all questions attempted, drawing from full catalog");
            return self.random();
        }
        fresh
            .choose(&mut rand::thread_rng())
            .map(|q| (*q).clone())
    }
}

/// Split catalog text at lines that start a numbered block.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let starts_block = Regex::new(r"^\d+\.").unwrap();
    for line in text.lines() {
        let trimmed = line.trim();
        if starts_block.is_match(trimmed) || blocks.is_empty() {
            blocks.push(String::new());
        }
        if let Some(block) = blocks.last_mut() {
            block.push_str(trimmed);
            block.push('\n');
        }
    }
    blocks.retain(|b| !b.trim().is_empty());
    blocks
}

fn parse_block(block: &str) -> Option<QuizQuestion> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 6 {
        return None;
    }

    let bare_number = Regex::new(r"^(\d+)\.\s*$").unwrap();
    let inline = Regex::new(r"^(\d+)\.\s*Q\.\s*(.+)$").unwrap();

    // Number alone on the first line with the question on the next, or
    // both on one line.
    let (id, question) = if let Some(caps) = bare_number.captures(lines[0]) {
        let id: u32 = caps[1].parse().ok()?;
        let question = lines.get(1)?.strip_prefix("Q.")?.trim().to_string();
        (id, question)
    } else {
        let caps = inline.captures(lines[0])?;
        (caps[1].parse().ok()?, caps[2].trim().to_string())
    };

    let mut options = BTreeMap::new();
    for line in &lines {
        for (symbol, number) in OPTION_SYMBOLS {
            if let Some(text) = line.strip_prefix(symbol) {
                options.insert(number.to_string(), text.trim().to_string());
            }
        }
    }

    let answer_line = lines.iter().find(|l| l.starts_with("정답:"))?;
    let answer_re = Regex::new(r"^정답:\s*([①②③④])\s*(.*)$").unwrap();
    let caps = answer_re.captures(answer_line)?;
    let answer_number = OPTION_SYMBOLS
        .iter()
        .find(|(symbol, _)| *symbol == &caps[1])
        .map(|(_, number)| number.to_string())?;
    let answer_company = caps[2].trim().to_string();

    let answer_index = lines.iter().position(|l| l.starts_with("정답:"))?;
    let background = lines[answer_index + 1..].join(" ");

    let question = QuizQuestion {
        id,
        question,
        options,
        answer_number,
        answer_company,
        background,
    };
    validate(&question).then_some(question)
}

fn validate(question: &QuizQuestion) -> bool {
    if question.id == 0 || question.question.trim().len() < MIN_QUESTION_LEN {
        return false;
    }
    let expected = ["1", "2", "3", "4"];
    if question.options.len() != 4
        || !expected.iter().all(|k| question.options.contains_key(*k))
    {
        return false;
    }
    if question
        .options
        .values()
        .any(|text| text.trim().len() < MIN_OPTION_LEN)
    {
        return false;
    }
    match question.options.get(&question.answer_number) {
        None => false,
        Some(option) => {
            // Allow minor mismatch between the answer label and option text.
            if !question.answer_company.is_empty() && !option.contains(&question.answer_company) {
                warn!(
                    quiz_id = question.id,
                    "answer company does not match its option text"
                );
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1. Q. 2022년 코스피에 상장한 국내 2차전지 대장주는 어디일까요?
① 삼성전자
② LG에너지솔루션
③ SK하이닉스
④ NAVER
정답: ② LG에너지솔루션
2022년 1월 상장 첫날 시가총액 2위에 올랐습니다.

2.
Q. 국내 시가총액 1위 기업은 어디일까요?
① 삼성전자
② 카카오
③ NAVER
④ SK하이닉스
정답: ① 삼성전자
반도체와 가전을 아우르는 국내 최대 상장사입니다.
";

    #[test]
    fn test_parse_both_heading_styles() {
        let catalog = QuizCatalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let q = catalog.unplayed(&[2]).unwrap();
        assert_eq!(q.id, 1);
        assert_eq!(q.answer_number, "2");
        assert_eq!(q.answer_company, "LG에너지솔루션");
        assert!(q.background.contains("시가총액"));
    }

    #[test]
    fn test_block_with_missing_option_is_skipped() {
        let broken = "\
1. Q. 선택지가 세 개뿐이라 유효하지 않은 문제입니다?
① 삼성전자
② 카카오
③ NAVER
정답: ① 삼성전자
배경 설명입니다.
";
        assert!(QuizCatalog::parse(broken).is_err());
    }

    #[test]
    fn test_short_question_is_skipped() {
        let broken = "\
1. Q. 짧음?
① 삼성전자
② 카카오
③ NAVER
④ SK하이닉스
정답: ① 삼성전자
배경 설명입니다.
";
        assert!(QuizCatalog::parse(broken).is_err());
    }

    #[test]
    fn test_unplayed_falls_back_when_exhausted() {
        let catalog = QuizCatalog::parse(SAMPLE).unwrap();
        assert!(catalog.unplayed(&[1, 2]).is_some());
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(QuizCatalog::load("/nonexistent/Quiz.txt").is_err());
    }
}
