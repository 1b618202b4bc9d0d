//! 问题与答案的数据模型

use std::fmt;

/// 问题指纹
///
/// 由问题文本进一步归一化（小写、去标点、压缩空白）得到的稳定键。
/// 重复截取同一屏幕问题时 OCR 产生的大小写 / 标点 / 空白抖动
/// 都映射到同一个指纹，这是去重的核心。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 从问题文本计算指纹
    pub fn of(text: &str) -> Self {
        let mut canonical = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_alphanumeric() {
                for lower in c.to_lowercase() {
                    canonical.push(lower);
                }
            } else {
                canonical.push(' ');
            }
        }
        let key = canonical.split_whitespace().collect::<Vec<_>>().join(" ");
        Fingerprint(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 纯标点 / 纯空白的文本会产生空指纹，这类候选应当丢弃
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一条候选问题
///
/// `text` 保留归一化文本中的原始大小写与标点，`fingerprint` 用于去重
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub fingerprint: Fingerprint,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = Fingerprint::of(&text);
        Self { text, fingerprint }
    }
}

/// 已回答的问题对
///
/// 交付给输出端的最小单元，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredPair {
    pub question: String,
    pub answer: String,
}
