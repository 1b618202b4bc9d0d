//! 输出端 - 业务能力层
//!
//! GUI 窗口、剪贴板、终端打印天然是同一个能力接口的多个实现：
//! `deliver(一批问答对)`。实现由启动配置挑选，流水线对它们一视同仁，
//! 输出端也不向流水线回馈任何信息。

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::models::AnsweredPair;

/// 输出端能力接口
pub trait AnswerSink: Send + Sync {
    /// 输出端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 交付一批问答对
    fn deliver(&self, pairs: &[AnsweredPair]) -> Result<()>;
}

/// 终端打印输出端
pub struct TerminalSink;

impl AnswerSink for TerminalSink {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn deliver(&self, pairs: &[AnsweredPair]) -> Result<()> {
        for pair in pairs {
            println!("\n[Q] {}", pair.question);
            println!("[A] {}", pair.answer);
        }
        Ok(())
    }
}

/// 剪贴板输出端
///
/// 写入格式化后的最后一组答案，方便直接粘贴
pub struct ClipboardSink;

impl AnswerSink for ClipboardSink {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn deliver(&self, pairs: &[AnsweredPair]) -> Result<()> {
        let Some(last) = pairs.last() else {
            return Ok(());
        };
        let formatted = format_answer(&last.question, &last.answer);
        let mut clipboard = arboard::Clipboard::new().context("无法打开剪贴板")?;
        clipboard.set_text(formatted).context("写入剪贴板失败")?;
        debug!("答案已复制到剪贴板");
        Ok(())
    }
}

/// 文件输出端（问答记录）
pub struct FileSink {
    path: String,
}

impl FileSink {
    /// 创建输出端并写入带时间戳的文件头
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let header = format!(
            "{}\n问答记录 - {}\n{}\n\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        std::fs::write(&path, header).with_context(|| format!("无法写入问答记录文件: {}", path))?;
        Ok(Self { path })
    }
}

impl AnswerSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn deliver(&self, pairs: &[AnsweredPair]) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("无法打开问答记录文件: {}", self.path))?;
        for pair in pairs {
            writeln!(file, "[Q] {}", pair.question)?;
            writeln!(file, "[A] {}\n", pair.answer)?;
        }
        Ok(())
    }
}

/// 格式化答案：保留行首的数字片段，按问题语言加答案前缀
///
/// 例：`"42 William Shakespeare"` → `"42 Answer: William Shakespeare"`；
/// 阿拉伯语问题使用 `"الإجابة: "` 前缀
pub fn format_answer(question: &str, answer: &str) -> String {
    let is_arabic = question
        .chars()
        .any(|c| ('\u{0600}'..='\u{06FF}').contains(&c));
    let prefix = if is_arabic { "الإجابة: " } else { "Answer: " };

    if let Ok(re) = Regex::new(r"(?s)^([0-9٠-٩]+[%٪]?)\s+(.+)$") {
        if let Some(caps) = re.captures(answer.trim()) {
            return format!("{} {}{}", &caps[1], prefix, &caps[2]);
        }
    }
    format!("{}{}", prefix, answer.trim())
}
