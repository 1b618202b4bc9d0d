//! 周期处理流程 - 流程层
//!
//! 核心职责：定义"一个周期的文本"的完整处理流程
//!
//! 流程顺序：
//! 1. 归一化 → 提取候选问题
//! 2. 调度器解决（缓存去重 + 后端调用）
//! 3. 发放到各输出端
//! 4. 失败问题写 warn 文件（兜底）

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cache::FingerprintCache;
use crate::config::Config;
use crate::models::LanguageProfile;
use crate::orchestrator::AnswerOrchestrator;
use crate::services::{text_normalizer, AnswerBackend, AnswerSink, QuestionExtractor, WarnWriter};
use crate::utils::logging::truncate_text;
use crate::workflow::cycle_ctx::CycleCtx;

/// 流水线状态机
///
/// `Halted` 是终态：后端持续认证失败或用户取消后进入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    Extracting,
    Dispatching,
    Delivering,
    Halted,
}

/// 单周期处理报告
#[derive(Debug, Default)]
pub struct CycleReport {
    /// 提取出的候选问题数
    pub extracted: usize,
    /// 实际发放的问答对数
    pub delivered: usize,
    /// 其中来自缓存的数量
    pub from_cache: usize,
    /// 最终失败的问题数
    pub failed: usize,
    /// 是否触发停摆
    pub halted: bool,
}

/// 周期处理流程
///
/// - 编排一个周期内从文本到发放的全过程
/// - 不持有屏幕 / OCR 资源
/// - 只依赖业务能力（services）与调度器
pub struct CycleFlow {
    profile: LanguageProfile,
    extractor: QuestionExtractor,
    orchestrator: AnswerOrchestrator,
    sinks: Vec<Box<dyn AnswerSink>>,
    warn_writer: WarnWriter,
    show_ocr_text: bool,
    verbose_logging: bool,
}

impl CycleFlow {
    /// 创建新的周期处理流程
    pub fn new(
        config: &Config,
        backend: Arc<dyn AnswerBackend>,
        cache: Arc<FingerprintCache>,
        sinks: Vec<Box<dyn AnswerSink>>,
    ) -> Self {
        let profile = LanguageProfile::from_hint(&config.ocr_languages);
        Self {
            extractor: QuestionExtractor::new(config.min_question_chars, profile.clone()),
            orchestrator: AnswerOrchestrator::new(config, backend, cache),
            sinks,
            warn_writer: WarnWriter::new(config.warn_file.clone()),
            show_ocr_text: config.show_ocr_text,
            verbose_logging: config.verbose_logging,
            profile,
        }
    }

    /// 是否已停摆
    pub fn is_halted(&self) -> bool {
        self.orchestrator.is_halted()
    }

    /// 处理一个周期的 OCR 原始文本
    pub async fn run(
        &self,
        raw_text: &str,
        ctx: &CycleCtx,
        state: &mut PipelineState,
    ) -> Result<CycleReport> {
        if self.show_ocr_text && !raw_text.trim().is_empty() {
            println!("{}", raw_text.trim());
        }

        // ========== 归一化 + 提取 ==========
        *state = PipelineState::Extracting;
        let normalized = text_normalizer::normalize(raw_text, &self.profile);
        let questions = self.extractor.extract(&normalized);

        let mut report = CycleReport {
            extracted: questions.len(),
            ..Default::default()
        };

        if questions.is_empty() {
            info!("{} 没有发现问题，本周期结束", ctx);
            *state = PipelineState::Idle;
            return Ok(report);
        }

        info!("{} 🔍 发现 {} 个候选问题", ctx, questions.len());
        if self.verbose_logging {
            for (i, question) in questions.iter().enumerate() {
                info!("{}   {}. {}", ctx, i + 1, truncate_text(&question.text, 80));
            }
        }

        // ========== 调度 ==========
        *state = PipelineState::Dispatching;
        let outcome = self.orchestrator.resolve(&questions).await?;
        report.delivered = outcome.pairs.len();
        report.from_cache = outcome.from_cache;
        report.failed = outcome.failures.len();
        report.halted = outcome.halted;

        // 失败的问题写入 warn 文件
        for (question, kind) in &outcome.failures {
            if let Err(e) = self.warn_writer.write(question, kind) {
                warn!("{} ⚠️ 写入警告文件失败: {}", ctx, e);
            }
        }

        // ========== 发放 ==========
        *state = PipelineState::Delivering;
        if !outcome.pairs.is_empty() {
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(&outcome.pairs) {
                    warn!("{} ⚠️ 输出端 {} 发放失败: {}", ctx, sink.name(), e);
                }
            }
            info!(
                "{} ✓ 发放 {} 组问答 (缓存命中 {})",
                ctx, report.delivered, report.from_cache
            );
        }

        if report.halted {
            warn!("{} ⚠️ 后端不可用，流水线停摆", ctx);
            *state = PipelineState::Halted;
        } else {
            *state = PipelineState::Idle;
        }

        Ok(report)
    }
}
