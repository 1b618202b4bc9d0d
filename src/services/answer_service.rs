//! 答案服务 - 业务能力层
//!
//! 只负责"向语言模型要一个答案"的能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务均可）

use async_openai::error::OpenAIError;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::BackendError;

/// 事实问答的系统提示词
const SYSTEM_PROMPT: &str = "You are a factual question answering assistant. \
    Answer ACCURATELY and CONCISELY with ONLY the direct answer phrase. \
    If the question is Arabic respond in Arabic.";

/// 后端能力接口
///
/// 调度器只依赖这个接口；测试用桩实现替换真实服务
pub trait AnswerBackend: Send + Sync {
    /// 回答单个问题
    fn answer<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String, BackendError>>;
}

/// 答案服务
///
/// 职责：
/// - 调用 LLM API 回答单个问题
/// - 把底层错误映射为统一的 `BackendError` 分类
/// - 不出现 Vec<Question>
/// - 不关心缓存、重试与并发
pub struct AnswerService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl AnswerService {
    /// 创建新的答案服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.model_name.clone(),
        }
    }

    async fn ask(&self, question: &str) -> Result<String, BackendError> {
        debug!("调用 LLM API，模型: {}", self.model_name);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(classify_error)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(question)
            .build()
            .map_err(classify_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.2)
            .max_tokens(512u32)
            .build()
            .map_err(classify_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_error(e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| BackendError::InvalidRequest("LLM 返回内容为空".to_string()))?;

        Ok(content.trim().to_string())
    }
}

impl AnswerBackend for AnswerService {
    fn answer<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        Box::pin(self.ask(question))
    }
}

/// 把 async-openai 错误映射为统一分类
fn classify_error(err: OpenAIError) -> BackendError {
    match err {
        OpenAIError::ApiError(api) => classify_message(&api.message),
        other => {
            let text = other.to_string();
            let lower = text.to_lowercase();
            if lower.contains("timed out") || lower.contains("timeout") {
                BackendError::Timeout
            } else {
                classify_message(&text)
            }
        }
    }
}

/// 依据错误消息文本归类
///
/// 兼容 OpenAI 协议的各家服务返回的错误结构并不统一，
/// 消息文本是最稳定的判据
fn classify_message(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
        || lower.contains("429")
    {
        BackendError::RateLimited(message.to_string())
    } else if lower.contains("api key")
        || lower.contains("authentication")
        || lower.contains("unauthorized")
        || lower.contains("401")
        || lower.contains("403")
    {
        BackendError::AuthError(message.to_string())
    } else if lower.contains("invalid") || lower.contains("400") {
        BackendError::InvalidRequest(message.to_string())
    } else {
        BackendError::Transport(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert!(matches!(
            classify_message("Rate limit reached for requests"),
            BackendError::RateLimited(_)
        ));
        assert!(matches!(
            classify_message("You exceeded your current quota"),
            BackendError::RateLimited(_)
        ));
    }

    #[test]
    fn test_classify_auth() {
        assert!(matches!(
            classify_message("Incorrect API key provided"),
            BackendError::AuthError(_)
        ));
        assert!(matches!(
            classify_message("401 Unauthorized"),
            BackendError::AuthError(_)
        ));
    }

    #[test]
    fn test_classify_invalid_request() {
        assert!(matches!(
            classify_message("Invalid request: model not found"),
            BackendError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_classify_fallback_is_transport() {
        assert!(matches!(
            classify_message("connection reset by peer"),
            BackendError::Transport(_)
        ));
    }

    /// 真实 API 连通性测试
    ///
    /// 运行方式：
    /// ```bash
    /// OPENAI_API_KEY=sk-... cargo test test_answer_service_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_answer_service_live() {
        let config = Config {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            ..Config::default()
        };
        let service = AnswerService::new(&config);

        let result = service.ask("Who wrote Hamlet?").await;
        match result {
            Ok(answer) => {
                println!("✅ LLM 响应: {}", answer);
                assert!(!answer.is_empty());
            }
            Err(e) => panic!("❌ LLM 调用失败: {}", e),
        }
    }
}
