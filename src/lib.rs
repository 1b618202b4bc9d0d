//! # Screen QnA
//!
//! 截取屏幕区域、识别其中的问题并调用语言模型作答的工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `ScreenCapturer` - 调用平台截屏工具，产出临时 PNG
//! - `OcrEngine` - 调用 tesseract，产出原始文本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文本 / 问题
//! - `text_normalizer` - OCR 文本归一化（纯函数）
//! - `QuestionExtractor` - 候选问题提取与指纹计算
//! - `AnswerService` - 语言模型问答能力
//! - `AnswerSink` - 终端 / 剪贴板 / 文件输出能力
//! - `WarnWriter` - 记录未能回答的问题
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个周期"的完整处理流程
//! - `CycleCtx` - 上下文封装（第几个周期）
//! - `CycleFlow` - 流程编排（归一化 → 提取 → 调度 → 发放 → 兜底）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/answer_orchestrator` - 缓存协调、并发与重试
//! - `orchestrator/app` - 运行模式、状态机与收尾
//!
//! ## 去重核心
//!
//! 指纹缓存（`cache`）通过 reserve/resolve 两段式协议保证
//! 同一指纹至多一次在途后端调用，重复出现的问题直接用缓存答案。
//!
//! ## 模块结构

pub mod cache;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use cache::{CacheEntry, FingerprintCache, Outcome};
pub use config::Config;
pub use error::{AppError, AppResult, BackendError};
pub use models::{AnsweredPair, Fingerprint, Question, Region};
pub use orchestrator::{AnswerOrchestrator, App, BatchOutcome, RunMode};
pub use services::{AnswerBackend, QuestionExtractor};
pub use workflow::{CycleCtx, CycleFlow, PipelineState};
