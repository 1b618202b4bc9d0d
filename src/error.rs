//! 错误类型定义
//!
//! 分类与传播策略：
//! - 截屏 / OCR 错误只中止当前周期（监视模式下个间隔继续）
//! - 配置错误在启动时即致命
//! - 后端错误按可重试 / 终止性分类，由调度器按策略处理
//! - `InvariantViolation` 代表 reserve/resolve 纪律被破坏，
//!   属于编程缺陷而非运行时状况，必须立即终止

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 截屏子系统错误
    #[error("截屏错误: {0}")]
    Capture(#[from] CaptureError),
    /// OCR 引擎错误
    #[error("OCR错误: {0}")]
    Ocr(#[from] OcrError),
    /// 后端调用错误
    #[error("后端错误: {0}")]
    Backend(#[from] BackendError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 缓存协调协议被破坏
    #[error("不变量被破坏: {0}")]
    InvariantViolation(String),
}

/// 截屏子系统错误
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 当前环境无法读取屏幕
    #[error("无法读取屏幕: {reason}")]
    Unavailable { reason: String },
    /// 截屏命令本身执行失败
    #[error("截屏命令执行失败 ({command}): {detail}")]
    CommandFailed { command: String, detail: String },
}

/// OCR 引擎错误
#[derive(Debug, Error)]
pub enum OcrError {
    /// 找不到可用的 tesseract
    #[error("OCR 引擎不可用: {hint}")]
    EngineUnavailable { hint: String },
    /// 识别超时
    #[error("OCR 识别超时 ({secs} 秒)")]
    Timeout { secs: u64 },
    /// 识别过程报错
    #[error("OCR 识别失败: {detail}")]
    Failed { detail: String },
}

/// 后端（语言模型）调用错误
///
/// 同时充当缓存 `Failed` 条目中记录的错误类别，因此要求 `Clone`
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// 调用超时
    #[error("后端调用超时")]
    Timeout,
    /// 触发限流
    #[error("后端限流: {0}")]
    RateLimited(String),
    /// 认证失败（密钥无效、权限不足）
    #[error("后端认证失败: {0}")]
    AuthError(String),
    /// 请求被后端拒绝
    #[error("请求被后端拒绝: {0}")]
    InvalidRequest(String),
    /// 网络 / 传输层错误
    #[error("传输错误: {0}")]
    Transport(String),
    /// 调用被取消（用户中断 / 流水线停摆）
    #[error("调用被取消")]
    Cancelled,
}

impl BackendError {
    /// 是否属于可重试的瞬时错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout | BackendError::RateLimited(_) | BackendError::Transport(_)
        )
    }

    /// 是否应当让整个流水线停摆
    ///
    /// 认证失败后对同一后端逐题重试没有意义
    pub fn is_halting(&self) -> bool {
        matches!(self, BackendError::AuthError(_))
    }

    /// 类别短名（用于日志与历史导出）
    pub fn kind_name(&self) -> &'static str {
        match self {
            BackendError::Timeout => "timeout",
            BackendError::RateLimited(_) => "rate_limited",
            BackendError::AuthError(_) => "auth_error",
            BackendError::InvalidRequest(_) => "invalid_request",
            BackendError::Transport(_) => "transport",
            BackendError::Cancelled => "cancelled",
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少 API 密钥
    #[error("缺少 API 密钥（请设置 OPENAI_API_KEY）")]
    MissingApiKey,
    /// 配置项取值无效
    #[error("配置项 {name} 的值无效: {value}")]
    InvalidValue { name: String, value: String },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {detail}")]
    FileParse { path: String, detail: String },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
