//! OCR 语言提示到标点集合的映射
//!
//! tesseract 的语言参数形如 `"eng+ara"`。不同文字体系的句末标点
//! 不同，这里维护一张静态表，按语言代码取并集。

use phf::phf_map;
use tracing::warn;

/// 各语言在基础集合 `.?!` 之外的句末标点
static SENTENCE_TERMINALS: phf::Map<&'static str, &'static str> = phf_map! {
    "eng" => "",
    "ara" => "؟",
    "fas" => "؟",
    "urd" => "؟",
    "chi_sim" => "。？！",
    "chi_tra" => "。？！",
    "jpn" => "。？！",
    "kor" => "？！",
    "ell" => ";",
};

/// 各语言在基础集合 `?` 之外的疑问终止符
static QUESTION_TERMINALS: phf::Map<&'static str, &'static str> = phf_map! {
    "eng" => "",
    "ara" => "؟",
    "fas" => "؟",
    "urd" => "؟",
    "chi_sim" => "？",
    "chi_tra" => "？",
    "jpn" => "？",
    "kor" => "？",
    "ell" => ";",
};

/// 由 OCR 语言提示推导出的标点轮廓
///
/// 归一化与问题提取都依赖它来判断句边界与疑问句
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    sentence_terminals: Vec<char>,
    question_terminals: Vec<char>,
}

impl LanguageProfile {
    /// 从 tesseract 语言参数（如 `"eng+ara"`）构建
    ///
    /// 未知语言代码只告警，不影响基础标点集合
    pub fn from_hint(hint: &str) -> Self {
        let mut sentence: Vec<char> = vec!['.', '?', '!'];
        let mut question: Vec<char> = vec!['?'];

        for code in hint.split('+').map(str::trim).filter(|c| !c.is_empty()) {
            match (SENTENCE_TERMINALS.get(code), QUESTION_TERMINALS.get(code)) {
                (Some(extra_sentence), Some(extra_question)) => {
                    for c in extra_sentence.chars() {
                        push_unique(&mut sentence, c);
                    }
                    for c in extra_question.chars() {
                        push_unique(&mut question, c);
                    }
                }
                _ => warn!("未知的 OCR 语言代码: {}，使用基础标点集合", code),
            }
        }

        Self {
            sentence_terminals: sentence,
            question_terminals: question,
        }
    }

    /// 是否为句末终止符
    pub fn is_sentence_terminal(&self, c: char) -> bool {
        self.sentence_terminals.contains(&c)
    }

    /// 是否为疑问终止符
    pub fn is_question_terminal(&self, c: char) -> bool {
        self.question_terminals.contains(&c)
    }
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self::from_hint("eng+ara")
    }
}

fn push_unique(set: &mut Vec<char>, c: char) {
    if !set.contains(&c) {
        set.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_terminals_always_present() {
        let profile = LanguageProfile::from_hint("eng");
        assert!(profile.is_sentence_terminal('.'));
        assert!(profile.is_sentence_terminal('?'));
        assert!(profile.is_sentence_terminal('!'));
        assert!(profile.is_question_terminal('?'));
        assert!(!profile.is_question_terminal('.'));
    }

    #[test]
    fn test_arabic_terminals() {
        let profile = LanguageProfile::from_hint("eng+ara");
        assert!(profile.is_question_terminal('؟'));
        assert!(profile.is_sentence_terminal('؟'));
    }

    #[test]
    fn test_cjk_terminals() {
        let profile = LanguageProfile::from_hint("chi_sim");
        assert!(profile.is_sentence_terminal('。'));
        assert!(profile.is_question_terminal('？'));
    }

    #[test]
    fn test_unknown_code_falls_back_to_base() {
        let profile = LanguageProfile::from_hint("klingon");
        assert!(profile.is_question_terminal('?'));
        assert!(!profile.is_question_terminal('؟'));
    }
}
