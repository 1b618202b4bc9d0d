//! 警告写入服务 - 业务能力层
//!
//! 只负责"把没能回答的问题写进 warn 文件"能力，不关心流程

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;
use tracing::debug;

use crate::error::BackendError;

/// 警告写入服务
///
/// 职责：
/// - 把最终失败的问题追加到 warn 文件
/// - 只处理单个问题的记录
/// - 不关心流程顺序
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    /// 追加一条未答记录
    ///
    /// # 参数
    /// - `question`: 问题文本
    /// - `kind`: 失败类别
    pub fn write(&self, question: &str, kind: &BackendError) -> Result<()> {
        debug!("写入警告: {} ({})", question, kind.kind_name());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)?;

        let warn_msg = format!(
            "{} | 问题: {} | 原因: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            question,
            kind
        );
        file.write_all(warn_msg.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_appends_lines() {
        let path = std::env::temp_dir().join("screen_qna_warn_writer_test.txt");
        let _ = std::fs::remove_file(&path);

        let writer = WarnWriter::new(path.to_string_lossy().to_string());
        writer
            .write("Who wrote Hamlet?", &BackendError::Timeout)
            .unwrap();
        writer
            .write("What is an atom?", &BackendError::Cancelled)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("Who wrote Hamlet?"));
        assert!(content.contains("What is an atom?"));

        let _ = std::fs::remove_file(&path);
    }
}
