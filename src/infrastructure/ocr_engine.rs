//! OCR 引擎 - 基础设施层
//!
//! 持有 tesseract 可执行文件这一资源，只暴露 recognize() 能力。

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::OcrError;
use crate::infrastructure::screen_capturer::RawCapture;

/// OCR 引擎
///
/// 职责：
/// - 调用 tesseract 把 PNG 转成原始文本
/// - 不认识 Question，不做任何清洗
pub struct OcrEngine {
    binary: PathBuf,
    languages: String,
    psm: u8,
    timeout: Duration,
}

impl OcrEngine {
    /// 定位并验证 tesseract，构建引擎
    ///
    /// 候选顺序：TESSERACT_CMD 环境变量 → PATH → Windows 默认安装目录。
    /// 找不到可用的二进制是启动期错误。
    pub async fn detect(config: &Config) -> Result<Self, OcrError> {
        for binary in candidate_binaries() {
            let engine = Self {
                binary,
                languages: config.ocr_languages.clone(),
                psm: config.ocr_psm,
                timeout: Duration::from_secs(config.ocr_timeout_secs),
            };
            if engine.verify().await {
                info!(
                    "✓ OCR 引擎就绪: {} (语言: {}, psm: {})",
                    engine.binary.display(),
                    engine.languages,
                    engine.psm
                );
                return Ok(engine);
            }
        }
        Err(OcrError::EngineUnavailable {
            hint: "未找到可用的 tesseract，请安装并加入 PATH（或设置 TESSERACT_CMD）".to_string(),
        })
    }

    /// 运行 `tesseract --version` 确认可用
    async fn verify(&self) -> bool {
        matches!(
            Command::new(&self.binary).arg("--version").output().await,
            Ok(output) if output.status.success()
        )
    }

    /// 识别截图中的文本
    ///
    /// # 返回
    /// tesseract 的原始输出（未归一化）
    pub async fn recognize(&self, capture: &RawCapture) -> Result<String, OcrError> {
        debug!("开始 OCR: {} (psm={})", capture.path.display(), self.psm);

        let mut cmd = Command::new(&self.binary);
        cmd.arg(&capture.path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| OcrError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OcrError::EngineUnavailable {
                        hint: format!("找不到 {}", self.binary.display()),
                    }
                } else {
                    OcrError::Failed {
                        detail: e.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("OCR 完成，输出 {} 字符", text.chars().count());
        Ok(text)
    }
}

/// 枚举 tesseract 的候选路径
fn candidate_binaries() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(custom) = std::env::var("TESSERACT_CMD") {
        candidates.push(PathBuf::from(custom));
    }
    candidates.push(PathBuf::from("tesseract"));

    // Windows 上常见的情况：装了 tesseract 却没有加进 PATH
    #[cfg(target_os = "windows")]
    for base in [
        r"C:\Program Files\Tesseract-OCR",
        r"C:\Program Files (x86)\Tesseract-OCR",
    ] {
        let candidate = std::path::Path::new(base).join("tesseract.exe");
        if candidate.exists() {
            candidates.push(candidate);
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_binaries_contains_path_default() {
        let candidates = candidate_binaries();
        assert!(candidates.contains(&PathBuf::from("tesseract")));
    }

    /// 需要本机装有 tesseract
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_detect_live -- --ignored
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_detect_live() {
        let config = Config::default();
        let engine = OcrEngine::detect(&config).await.expect("定位 tesseract 失败");
        assert!(engine.verify().await);
    }
}
