//! 程序配置
//!
//! 取值优先级：内置默认值 < `screen_qna.toml` < 环境变量

use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::models::Region;

/// 缺省配置文件名（工作目录下）
const DEFAULT_CONFIG_FILE: &str = "screen_qna.toml";

/// 监视周期超限策略
///
/// 上个周期还没结束时错过的 tick 是顺延还是丢弃。丢弃是安全的：
/// 问题再次出现时缓存保证不会产生重复开销。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    Defer,
    Drop,
}

impl FromStr for OverrunPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "defer" => Ok(OverrunPolicy::Defer),
            "drop" => Ok(OverrunPolicy::Drop),
            _ => Err(ConfigError::InvalidValue {
                name: "overrun_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// OpenAI API 密钥（必填，缺失在启动时报错）
    pub openai_api_key: String,
    /// API 基地址（兼容 OpenAI 协议的服务均可）
    pub api_base_url: String,
    /// 模型名称
    pub model_name: String,
    /// tesseract 语言参数，如 "eng+ara"
    pub ocr_languages: String,
    /// tesseract 页面分割模式
    pub ocr_psm: u8,
    /// OCR 超时（秒）
    pub ocr_timeout_secs: u64,
    /// 监视模式轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 固定截取区域（缺省截全屏）
    pub capture_region: Option<Region>,
    /// 问题候选的最小字符数
    pub min_question_chars: usize,
    /// 单个问题的最大尝试次数（含首次调用）
    pub max_retries: u32,
    /// 重试退避基数（毫秒，按尝试次数指数增长）
    pub retry_base_ms: u64,
    /// 后端并发上限
    pub max_concurrent_requests: usize,
    /// 单次后端调用超时（秒）
    pub request_timeout_secs: u64,
    /// 是否把答案写入剪贴板
    pub copy_to_clipboard: bool,
    /// 是否打印 OCR 原始文本
    pub show_ocr_text: bool,
    /// 未能回答的问题记录文件
    pub warn_file: String,
    /// 问答记录文件（可选）
    pub answer_file: Option<String>,
    /// 退出时导出缓存历史的 JSON 文件（可选）
    pub history_file: Option<String>,
    /// 监视周期超限策略
    pub overrun_policy: OverrunPolicy,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            ocr_languages: "eng+ara".to_string(),
            ocr_psm: 6,
            ocr_timeout_secs: 20,
            poll_interval_secs: 10,
            capture_region: None,
            min_question_chars: 3,
            max_retries: 3,
            retry_base_ms: 500,
            max_concurrent_requests: 4,
            request_timeout_secs: 30,
            copy_to_clipboard: true,
            show_ocr_text: false,
            warn_file: "warn.txt".to_string(),
            answer_file: None,
            history_file: None,
            overrun_policy: OverrunPolicy::Defer,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → screen_qna.toml → 环境变量
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Err(e) = config.apply_file(DEFAULT_CONFIG_FILE) {
            warn!("⚠️ 配置文件有误，忽略: {}", e);
        }
        config.apply_env();
        config
    }

    /// 启动期校验
    ///
    /// 缺密钥是配置错误，不是每次调用时的错误
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_retries".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_concurrent_requests".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// 叠加配置文件（文件不存在时静默跳过）
    fn apply_file(&mut self, path: &str) -> Result<(), ConfigError> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Ok(());
        };
        let overrides: FileOverrides =
            toml::from_str(&content).map_err(|e| ConfigError::FileParse {
                path: path.to_string(),
                detail: e.to_string(),
            })?;
        overrides.apply_to(self)
    }

    /// 叠加环境变量
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = v;
        }
        self.api_base_url = env_string("LLM_API_BASE_URL", &self.api_base_url);
        self.model_name = env_string("LLM_MODEL_NAME", &self.model_name);
        self.ocr_languages = env_string("OCR_LANGUAGES", &self.ocr_languages);
        self.ocr_psm = env_parse("OCR_PSM", self.ocr_psm);
        self.ocr_timeout_secs = env_parse("OCR_TIMEOUT_SECS", self.ocr_timeout_secs);
        self.poll_interval_secs = env_parse("POLL_INTERVAL_SECS", self.poll_interval_secs);
        self.min_question_chars = env_parse("MIN_QUESTION_CHARS", self.min_question_chars);
        self.max_retries = env_parse("MAX_RETRIES", self.max_retries);
        self.retry_base_ms = env_parse("RETRY_BASE_MS", self.retry_base_ms);
        self.max_concurrent_requests =
            env_parse("MAX_CONCURRENT_REQUESTS", self.max_concurrent_requests);
        self.request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", self.request_timeout_secs);
        self.copy_to_clipboard = env_parse("COPY_TO_CLIPBOARD", self.copy_to_clipboard);
        self.show_ocr_text = env_parse("SHOW_OCR_TEXT", self.show_ocr_text);
        self.warn_file = env_string("WARN_FILE", &self.warn_file);
        self.verbose_logging = env_parse("VERBOSE_LOGGING", self.verbose_logging);

        if let Ok(v) = std::env::var("ANSWER_FILE") {
            self.answer_file = Some(v);
        }
        if let Ok(v) = std::env::var("HISTORY_FILE") {
            self.history_file = Some(v);
        }
        if let Ok(v) = std::env::var("CAPTURE_REGION") {
            match v.parse() {
                Ok(region) => self.capture_region = Some(region),
                Err(e) => warn!("⚠️ CAPTURE_REGION 无效，忽略: {}", e),
            }
        }
        if let Ok(v) = std::env::var("OVERRUN_POLICY") {
            match v.parse() {
                Ok(policy) => self.overrun_policy = policy,
                Err(e) => warn!("⚠️ OVERRUN_POLICY 无效，忽略: {}", e),
            }
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// screen_qna.toml 里可覆盖的字段
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOverrides {
    openai_api_key: Option<String>,
    api_base_url: Option<String>,
    model_name: Option<String>,
    ocr_languages: Option<String>,
    ocr_psm: Option<u8>,
    ocr_timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    capture_region: Option<String>,
    min_question_chars: Option<usize>,
    max_retries: Option<u32>,
    retry_base_ms: Option<u64>,
    max_concurrent_requests: Option<usize>,
    request_timeout_secs: Option<u64>,
    copy_to_clipboard: Option<bool>,
    show_ocr_text: Option<bool>,
    warn_file: Option<String>,
    answer_file: Option<String>,
    history_file: Option<String>,
    overrun_policy: Option<OverrunPolicy>,
    verbose_logging: Option<bool>,
}

impl FileOverrides {
    fn apply_to(self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(v) = self.openai_api_key {
            config.openai_api_key = v;
        }
        if let Some(v) = self.api_base_url {
            config.api_base_url = v;
        }
        if let Some(v) = self.model_name {
            config.model_name = v;
        }
        if let Some(v) = self.ocr_languages {
            config.ocr_languages = v;
        }
        if let Some(v) = self.ocr_psm {
            config.ocr_psm = v;
        }
        if let Some(v) = self.ocr_timeout_secs {
            config.ocr_timeout_secs = v;
        }
        if let Some(v) = self.poll_interval_secs {
            config.poll_interval_secs = v;
        }
        if let Some(v) = self.capture_region {
            config.capture_region = Some(v.parse()?);
        }
        if let Some(v) = self.min_question_chars {
            config.min_question_chars = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.retry_base_ms {
            config.retry_base_ms = v;
        }
        if let Some(v) = self.max_concurrent_requests {
            config.max_concurrent_requests = v;
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.copy_to_clipboard {
            config.copy_to_clipboard = v;
        }
        if let Some(v) = self.show_ocr_text {
            config.show_ocr_text = v;
        }
        if let Some(v) = self.warn_file {
            config.warn_file = v;
        }
        if let Some(v) = self.answer_file {
            config.answer_file = Some(v);
        }
        if let Some(v) = self.history_file {
            config.history_file = Some(v);
        }
        if let Some(v) = self.overrun_policy {
            config.overrun_policy = v;
        }
        if let Some(v) = self.verbose_logging {
            config.verbose_logging = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.min_question_chars, 3);
        assert_eq!(config.max_retries, 3);
        assert!(config.max_concurrent_requests > 0);
        assert_eq!(config.overrun_policy, OverrunPolicy::Defer);
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey)
        ));

        let config = Config {
            openai_api_key: "sk-test".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = Config {
            openai_api_key: "sk-test".to_string(),
            max_retries: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_apply() {
        let toml_text = r#"
            model_name = "gpt-4o"
            poll_interval_secs = 15
            capture_region = "0,0,1280,720"
            overrun_policy = "drop"
        "#;
        let overrides: FileOverrides = toml::from_str(toml_text).unwrap();

        let mut config = Config::default();
        overrides.apply_to(&mut config).unwrap();

        assert_eq!(config.model_name, "gpt-4o");
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.overrun_policy, OverrunPolicy::Drop);
        let region = config.capture_region.unwrap();
        assert_eq!((region.width, region.height), (1280, 720));
    }

    #[test]
    fn test_file_overrides_reject_bad_region() {
        let overrides: FileOverrides = toml::from_str(r#"capture_region = "wide""#).unwrap();
        let mut config = Config::default();
        assert!(overrides.apply_to(&mut config).is_err());
    }

    #[test]
    fn test_overrun_policy_parse() {
        assert_eq!("defer".parse::<OverrunPolicy>().unwrap(), OverrunPolicy::Defer);
        assert_eq!("DROP".parse::<OverrunPolicy>().unwrap(), OverrunPolicy::Drop);
        assert!("sometimes".parse::<OverrunPolicy>().is_err());
    }
}
