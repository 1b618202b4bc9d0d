//! 文本归一化 - 业务能力层
//!
//! 把嘈杂的 OCR 原始输出清洗为可供比较与问题识别的规范形式。
//!
//! 纯函数，无副作用，也没有失败路径：畸形输入退化为"没有问题"，
//! 绝不报错。归一化是确定且幂等的。

use crate::models::LanguageProfile;

/// 归一化 OCR 原始文本
///
/// 规则：
/// - 空白串压缩为单个空格
/// - 行尾带句末标点的换行保留为句边界，其余换行视为自动折行，
///   与下一行拼成一句
/// - 相同标点的连续重复压缩为单个（`??` → `?`）
/// - 两侧均为空白的孤立符号记号按 OCR 噪声丢弃；悬挂的句末标点
///   并入前一个词（`Hamlet ?` → `Hamlet?`）
pub fn normalize(raw: &str, profile: &LanguageProfile) -> String {
    let mut lines = Vec::new();
    for raw_line in raw.lines() {
        let cleaned = clean_line(raw_line, profile);
        if !cleaned.is_empty() {
            lines.push(cleaned);
        }
    }

    let mut out = String::new();
    for line in lines {
        if out.is_empty() {
            out.push_str(&line);
        } else if ends_with_terminal(&out, profile) {
            out.push('\n');
            out.push_str(&line);
        } else {
            out.push(' ');
            out.push_str(&line);
        }
    }
    out
}

/// 清洗单行：压缩重复标点、丢弃噪声记号、合并悬挂的句末标点
fn clean_line(line: &str, profile: &LanguageProfile) -> String {
    let collapsed = collapse_punct_runs(line);
    let mut tokens: Vec<String> = Vec::new();

    for token in collapsed.split_whitespace() {
        if token.chars().any(|c| c.is_alphanumeric()) {
            tokens.push(token.to_string());
        } else if token.chars().all(|c| profile.is_sentence_terminal(c)) {
            // 悬挂的句末标点并入前一个词；行首的直接丢弃
            if let Some(prev) = tokens.last_mut() {
                prev.push_str(token);
                *prev = collapse_punct_runs(prev);
            }
        }
        // 其余纯符号记号按噪声丢弃
    }

    tokens.join(" ")
}

/// 把相同非字母数字字符的连续重复压缩为单个
fn collapse_punct_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if prev == Some(c) && !c.is_alphanumeric() && !c.is_whitespace() {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn ends_with_terminal(text: &str, profile: &LanguageProfile) -> bool {
    text.chars()
        .last()
        .is_some_and(|c| profile.is_sentence_terminal(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> LanguageProfile {
        LanguageProfile::from_hint("eng+ara")
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("", &profile()), "");
        assert_eq!(normalize("   \n\n  \t ", &profile()), "");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(
            normalize("Who   wrote\t\tHamlet?", &profile()),
            "Who wrote Hamlet?"
        );
    }

    #[test]
    fn test_wrapped_line_joined() {
        // 折行的句子拼回一行
        assert_eq!(
            normalize("What is the capital\nof France?", &profile()),
            "What is the capital of France?"
        );
    }

    #[test]
    fn test_sentence_boundary_preserved() {
        // 行尾有句末标点时换行保留
        assert_eq!(
            normalize("The capital of France is Paris.\nWho wrote Hamlet?", &profile()),
            "The capital of France is Paris.\nWho wrote Hamlet?"
        );
    }

    #[test]
    fn test_punct_runs_collapsed() {
        assert_eq!(
            normalize("who wrote hamlet??", &profile()),
            "who wrote hamlet?"
        );
        assert_eq!(normalize("Wait!!! Really??", &profile()), "Wait! Really?");
    }

    #[test]
    fn test_noise_tokens_dropped() {
        assert_eq!(
            normalize("| What is ~ an atom? ·", &profile()),
            "What is an atom?"
        );
    }

    #[test]
    fn test_dangling_terminator_merged() {
        assert_eq!(
            normalize("Who   wrote Hamlet ?", &profile()),
            "Who wrote Hamlet?"
        );
        // 已有终止符时不会出现重复标点
        assert_eq!(
            normalize("Who wrote Hamlet? ?", &profile()),
            "Who wrote Hamlet?"
        );
    }

    #[test]
    fn test_arabic_question_mark() {
        assert_eq!(
            normalize("ما عاصمة فرنسا ؟", &profile()),
            "ما عاصمة فرنسا؟"
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Who wrote Hamlet?",
            "The capital of France is Paris.\nWho wrote Hamlet?",
            "| noisy ~ OCR   text\nwith wrapped\nlines. And a question ??",
            "ما عاصمة فرنسا ؟\nواشنطن عاصمة أمريكا.",
            "no terminal punctuation at all",
        ];
        for sample in samples {
            let once = normalize(sample, &profile());
            let twice = normalize(&once, &profile());
            assert_eq!(once, twice, "归一化不幂等: {:?}", sample);
        }
    }
}
