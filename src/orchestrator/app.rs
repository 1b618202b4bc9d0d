//! 应用编排 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验配置、定位 OCR 引擎、装配流水线
//! 2. **模式驱动**：单次模式（截一次，可交互重拍）与监视模式
//!    （固定间隔循环直到 Ctrl-C）
//! 3. **状态机**：Idle → Capturing → Extracting → Dispatching →
//!    Delivering → Idle；认证失败或用户取消进入 Halted 终态
//! 4. **资源管理**：唯一持有 ScreenCapturer 与 OcrEngine
//! 5. **收尾**：取消在途条目、输出统计、导出历史

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::cache::{CacheEntry, FingerprintCache};
use crate::config::{Config, OverrunPolicy};
use crate::error::AppError;
use crate::infrastructure::{OcrEngine, ScreenCapturer};
use crate::services::{AnswerService, AnswerSink, ClipboardSink, FileSink, TerminalSink};
use crate::workflow::{CycleCtx, CycleFlow, CycleReport, PipelineState};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 截取一次并回答，随后交互式选择重拍或退出
    Once,
    /// 按固定间隔持续监视
    Watch,
}

/// 应用主结构
pub struct App {
    config: Config,
    capturer: ScreenCapturer,
    ocr: OcrEngine,
    flow: CycleFlow,
    cache: Arc<FingerprintCache>,
    state: PipelineState,
    cycle_index: u64,
}

impl App {
    /// 初始化应用
    ///
    /// 配置校验（缺 API 密钥在这里失败）与 OCR 引擎定位
    /// 都在启动期完成，不留到第一个周期才暴露
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        log_startup(&config);

        let ocr = OcrEngine::detect(&config).await?;
        let capturer = ScreenCapturer::new();

        let cache = Arc::new(FingerprintCache::new());
        let backend = Arc::new(AnswerService::new(&config));
        let sinks = build_sinks(&config)?;
        let flow = CycleFlow::new(&config, backend, cache.clone(), sinks);

        Ok(Self {
            config,
            capturer,
            ocr,
            flow,
            cache,
            state: PipelineState::Idle,
            cycle_index: 0,
        })
    }

    /// 当前状态机位置
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 按模式运行应用主逻辑
    pub async fn run(mut self, mode: RunMode) -> Result<()> {
        let result = match mode {
            RunMode::Once => self.run_once().await,
            RunMode::Watch => self.run_watch().await,
        };
        self.shutdown();
        result
    }

    /// 单次模式：截取一次，交互式决定是否重拍
    async fn run_once(&mut self) -> Result<()> {
        loop {
            if let Err(e) = self.run_cycle("once").await {
                if is_fatal(&e) {
                    return Err(e);
                }
                // 单次模式把失败报告给用户，仍然提供重拍机会
                error!("❌ 周期执行失败: {}", e);
            }
            if self.state == PipelineState::Halted {
                warn!("⚠️ 流水线已停摆，不再继续");
                return Ok(());
            }
            if !prompt_retake().await? {
                return Ok(());
            }
        }
    }

    /// 监视模式：按固定间隔循环，Ctrl-C 退出
    async fn run_watch(&mut self) -> Result<()> {
        let period = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let mut ticker = interval(period);
        // 周期间才轮询 tick，同一区域绝不会重叠截取；
        // 超限策略决定错过的 tick 顺延还是丢弃
        ticker.set_missed_tick_behavior(match self.config.overrun_policy {
            OverrunPolicy::Defer => MissedTickBehavior::Delay,
            OverrunPolicy::Drop => MissedTickBehavior::Skip,
        });

        info!(
            "👀 监视模式启动，每 {} 秒截取一次 (Ctrl-C 退出)",
            period.as_secs()
        );

        loop {
            let mut interrupted = false;
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => { interrupted = true; }
            }
            if interrupted {
                info!("收到 Ctrl-C，准备退出...");
                self.state = PipelineState::Halted;
                return Ok(());
            }

            let mut cycle_result = None;
            tokio::select! {
                result = self.run_cycle("watch") => { cycle_result = Some(result); }
                _ = tokio::signal::ctrl_c() => {}
            }

            match cycle_result {
                // 周期中途被 Ctrl-C 打断：在途调用被放弃，
                // 悬空的 Pending 条目由 shutdown 统一标记取消
                None => {
                    info!("收到 Ctrl-C，放弃当前周期");
                    self.state = PipelineState::Halted;
                    return Ok(());
                }
                Some(Ok(())) => {}
                Some(Err(e)) if is_fatal(&e) => return Err(e),
                // 截屏 / OCR 失败只中止当前周期，下个间隔继续
                Some(Err(e)) => warn!("⚠️ 本周期失败，下个间隔继续: {}", e),
            }

            if self.state == PipelineState::Halted {
                warn!("⚠️ 流水线停摆，监视模式退出");
                return Ok(());
            }
        }
    }

    /// 执行一个完整周期：截取 → OCR → 文本处理
    async fn run_cycle(&mut self, mode: &'static str) -> Result<()> {
        self.cycle_index += 1;
        let ctx = CycleCtx::new(self.cycle_index, mode);
        info!("\n{} {}", ctx, "─".repeat(40));

        self.state = PipelineState::Capturing;
        let raw = match self.capturer.capture(self.config.capture_region).await {
            Ok(raw) => raw,
            Err(e) => {
                self.state = PipelineState::Idle;
                return Err(e.into());
            }
        };

        let text = match self.ocr.recognize(&raw).await {
            Ok(text) => {
                raw.cleanup();
                text
            }
            Err(e) => {
                raw.cleanup();
                self.state = PipelineState::Idle;
                return Err(e.into());
            }
        };

        let report = self.flow.run(&text, &ctx, &mut self.state).await?;
        log_cycle_complete(&ctx, &report);
        Ok(())
    }

    /// 收尾：取消在途条目、打印统计、导出历史
    fn shutdown(&self) {
        let cancelled = self.cache.cancel_pending();
        if cancelled > 0 {
            warn!("⚠️ {} 个在途问题被标记为取消", cancelled);
        }
        print_final_stats(&self.cache, self.cycle_index);

        if let Some(path) = &self.config.history_file {
            if let Err(e) = export_history(&self.cache, path) {
                warn!("⚠️ 导出历史失败: {}", e);
            }
        }
    }
}

/// 只有不变量被破坏才算致命错误，其余按周期级失败处理
fn is_fatal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::InvariantViolation(_))
    )
}

/// 按配置装配输出端
fn build_sinks(config: &Config) -> Result<Vec<Box<dyn AnswerSink>>> {
    let mut sinks: Vec<Box<dyn AnswerSink>> = vec![Box::new(TerminalSink)];
    if config.copy_to_clipboard {
        sinks.push(Box::new(ClipboardSink));
    }
    if let Some(path) = &config.answer_file {
        sinks.push(Box::new(FileSink::new(path.clone())?));
    }
    Ok(sinks)
}

/// 交互式询问：重拍还是退出（单次模式）
async fn prompt_retake() -> Result<bool> {
    let line = tokio::task::spawn_blocking(|| {
        use std::io::Write;
        print!("(1) 重新截取  (2) 退出: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("等待输入任务失败")?
    .context("读取输入失败")?;
    Ok(line.trim() == "1")
}

/// 历史条目（导出用）
#[derive(serde::Serialize)]
struct HistoryEntry {
    question_key: String,
    state: &'static str,
    answer: Option<String>,
    error: Option<String>,
    attempts: u32,
}

/// 把缓存快照导出为 JSON 文件
fn export_history(cache: &FingerprintCache, path: &str) -> Result<()> {
    let snapshot = cache.snapshot();
    let mut entries: Vec<HistoryEntry> = snapshot
        .iter()
        .map(|(fp, entry)| match entry {
            CacheEntry::Pending { attempts, .. } => HistoryEntry {
                question_key: fp.to_string(),
                state: "pending",
                answer: None,
                error: None,
                attempts: *attempts,
            },
            CacheEntry::Answered { answer, .. } => HistoryEntry {
                question_key: fp.to_string(),
                state: "answered",
                answer: Some(answer.clone()),
                error: None,
                attempts: 0,
            },
            CacheEntry::Failed {
                kind, attempts, ..
            } => HistoryEntry {
                question_key: fp.to_string(),
                state: "failed",
                answer: None,
                error: Some(kind.to_string()),
                attempts: *attempts,
            },
        })
        .collect();
    entries.sort_by(|a, b| a.question_key.cmp(&b.question_key));

    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json).with_context(|| format!("无法写入历史文件: {}", path))?;
    info!("📜 历史已导出: {} ({} 条)", path, entries.len());
    Ok(())
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 屏幕问答流水线启动");
    info!(
        "📊 模型: {} | OCR 语言: {} | 并发上限: {}",
        config.model_name, config.ocr_languages, config.max_concurrent_requests
    );
    if let Some(region) = config.capture_region {
        info!("📐 固定截取区域: {}", region);
    }
    info!("{}", "=".repeat(60));
}

fn log_cycle_complete(ctx: &CycleCtx, report: &CycleReport) {
    info!(
        "{} ✅ 周期完成: 候选 {} / 发放 {} (缓存 {}) / 失败 {}",
        ctx, report.extracted, report.delivered, report.from_cache, report.failed
    );
}

fn print_final_stats(cache: &FingerprintCache, cycles: u64) {
    let snapshot = cache.snapshot();
    let answered = snapshot
        .values()
        .filter(|e| matches!(e, CacheEntry::Answered { .. }))
        .count();
    let failed = snapshot
        .values()
        .filter(|e| matches!(e, CacheEntry::Failed { .. }))
        .count();

    info!("\n{}", "=".repeat(60));
    info!("📊 运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🔁 周期数: {}", cycles);
    info!("✅ 已回答问题: {}", answered);
    info!("❌ 失败问题: {}", failed);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::models::Fingerprint;
    use crate::cache::Outcome;

    #[test]
    fn test_is_fatal_only_for_invariant_violation() {
        let fatal: anyhow::Error = AppError::InvariantViolation("test".to_string()).into();
        assert!(is_fatal(&fatal));

        let cycle_level: anyhow::Error = AppError::Backend(BackendError::Timeout).into();
        assert!(!is_fatal(&cycle_level));

        let plain = anyhow::anyhow!("something else");
        assert!(!is_fatal(&plain));
    }

    #[test]
    fn test_export_history_roundtrip() {
        let cache = FingerprintCache::new();
        let answered = Fingerprint::of("Who wrote Hamlet?");
        let failed = Fingerprint::of("What is an atom?");

        assert!(cache.reserve(&answered));
        cache
            .resolve(
                &answered,
                Outcome::Answered {
                    answer: "William Shakespeare".to_string(),
                },
            )
            .unwrap();
        assert!(cache.reserve(&failed));
        cache
            .resolve(
                &failed,
                Outcome::Failed {
                    kind: BackendError::Timeout,
                    attempts: 3,
                },
            )
            .unwrap();

        let path = std::env::temp_dir().join("screen_qna_history_test.json");
        export_history(&cache, &path.to_string_lossy()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(content.contains("\"answered\""));
        assert!(content.contains("\"failed\""));

        let _ = std::fs::remove_file(&path);
    }
}
