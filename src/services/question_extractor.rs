//! 问题提取 - 业务能力层
//!
//! 把归一化文本切分为候选问题序列，保持屏幕阅读顺序。
//!
//! 职责：
//! - 按句末标点切分句子
//! - 判定疑问句并计算指纹
//! - 不访问缓存，不关心谁来回答

use std::collections::HashSet;

use tracing::debug;

use crate::models::{LanguageProfile, Question};

/// 问题提取器
pub struct QuestionExtractor {
    min_chars: usize,
    profile: LanguageProfile,
}

impl QuestionExtractor {
    /// 创建提取器
    ///
    /// # 参数
    /// - `min_chars`: 候选问题的最小字符数，低于此值按 OCR 噪声丢弃
    /// - `profile`: 语言标点轮廓
    pub fn new(min_chars: usize, profile: LanguageProfile) -> Self {
        Self { min_chars, profile }
    }

    /// 提取候选问题
    ///
    /// 判定条件：句子最后一个非空白字符是疑问终止符，且句中含有
    /// 至少一个文字字符（过滤被误读成句子的标点串）。
    /// 同一批内指纹重复的只保留第一次出现。
    ///
    /// 没有句末标点的输入产出空序列，这是正常结果而不是错误。
    pub fn extract(&self, text: &str) -> Vec<Question> {
        let mut questions = Vec::new();
        let mut seen = HashSet::new();

        for sentence in split_sentences(text, &self.profile) {
            if !self.is_question(&sentence) {
                continue;
            }
            let question = Question::new(sentence);
            if question.fingerprint.is_empty() {
                continue;
            }
            if seen.insert(question.fingerprint.clone()) {
                questions.push(question);
            }
        }

        debug!("提取到 {} 个候选问题", questions.len());
        questions
    }

    fn is_question(&self, sentence: &str) -> bool {
        let Some(last) = sentence.chars().rev().find(|c| !c.is_whitespace()) else {
            return false;
        };
        if !self.profile.is_question_terminal(last) {
            return false;
        }
        if !sentence.chars().any(|c| c.is_alphabetic()) {
            return false;
        }
        sentence.chars().count() >= self.min_chars
    }
}

/// 按句末标点与换行切分句子
fn split_sentences(text: &str, profile: &LanguageProfile) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            flush(&mut current, &mut sentences);
            continue;
        }
        current.push(c);
        if profile.is_sentence_terminal(c) {
            // 连续的终止符（如 "?!"）归入同一句
            let next_is_terminal = chars
                .peek()
                .is_some_and(|next| profile.is_sentence_terminal(*next));
            if !next_is_terminal {
                flush(&mut current, &mut sentences);
            }
        }
    }
    flush(&mut current, &mut sentences);

    sentences
}

fn flush(current: &mut String, sentences: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::text_normalizer::normalize;

    fn extractor() -> QuestionExtractor {
        QuestionExtractor::new(3, LanguageProfile::from_hint("eng+ara"))
    }

    #[test]
    fn test_extracts_single_question() {
        let questions = extractor().extract("The capital of France is Paris.\nWho wrote Hamlet?");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Who wrote Hamlet?");
    }

    #[test]
    fn test_statements_are_not_questions() {
        let questions = extractor().extract("The capital of France is Paris. It is in Europe.");
        assert!(questions.is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_sequence() {
        assert!(extractor().extract("").is_empty());
        // 完全没有句末标点的文本同样产出空序列
        assert!(extractor().extract("some text without punctuation").is_empty());
    }

    #[test]
    fn test_reading_order_preserved() {
        let text = "What is an atom? Atoms are small.\nWhat is a molecule? What is a cell?";
        let questions = extractor().extract(text);
        let texts: Vec<&str> = questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["What is an atom?", "What is a molecule?", "What is a cell?"]
        );
    }

    #[test]
    fn test_min_length_filter() {
        // "A?" 只有 2 个字符，低于阈值 3
        let questions = extractor().extract("A? What is the speed of light?");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "What is the speed of light?");
    }

    #[test]
    fn test_punctuation_runs_are_not_questions() {
        // 被误读成句子的标点串没有文字字符
        assert!(extractor().extract("??? !!! ???").is_empty());
    }

    #[test]
    fn test_arabic_question() {
        let questions = extractor().extract("ما عاصمة فرنسا؟");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "ما عاصمة فرنسا؟");
    }

    #[test]
    fn test_batch_dedupe_keeps_first() {
        let questions = extractor().extract("Who wrote Hamlet? who wrote hamlet?");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Who wrote Hamlet?");
    }

    #[test]
    fn test_fingerprint_stable_after_normalize() {
        // 三种 OCR 抖动经过归一化 + 提取后指纹一致
        let profile = LanguageProfile::from_hint("eng+ara");
        let variants = [
            "Who wrote Hamlet?",
            "who wrote hamlet??",
            "Who   wrote Hamlet ?",
        ];
        let extractor = extractor();
        let fingerprints: Vec<_> = variants
            .iter()
            .map(|v| {
                let questions = extractor.extract(&normalize(v, &profile));
                assert_eq!(questions.len(), 1, "未提取到问题: {:?}", v);
                questions[0].fingerprint.clone()
            })
            .collect();
        assert_eq!(fingerprints[0], fingerprints[1]);
        assert_eq!(fingerprints[1], fingerprints[2]);
    }
}
