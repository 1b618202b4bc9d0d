//! 答案调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **去重协调**：每个问题先经 `reserve` 预订指纹，这是唯一的
//!    派发闸门；预订失败的按缓存现状处理（已答 → 直接发放，
//!    在途 → 本周期跳过，可重试失败 → 重新预订）
//! 2. **并发控制**：同一批内不同指纹的后端调用并发执行，
//!    上限 `max_concurrent_requests`
//! 3. **重试退避**：可重试失败按指数退避重试，总尝试次数封顶
//! 4. **停摆信号**：认证类失败后不再派发任何问题（本批与后续批）
//! 5. **顺序保证**：发放顺序 == 提取顺序（阅读顺序），与后端
//!    完成顺序无关
//!
//! 调用方不得假设每个输入问题都有对应输出。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, FingerprintCache, Outcome};
use crate::config::Config;
use crate::error::{AppResult, BackendError};
use crate::models::{AnsweredPair, Fingerprint, Question};
use crate::services::AnswerBackend;
use crate::utils::logging::truncate_text;

/// 一批问题的调度结果
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// 成功发放的问答对（阅读顺序）
    pub pairs: Vec<AnsweredPair>,
    /// 本批最终失败的问题（文本 + 错误类别）
    pub failures: Vec<(String, BackendError)>,
    /// 命中缓存直接发放的数量
    pub from_cache: usize,
    /// 是否处于停摆状态
    pub halted: bool,
}

/// 单个问题的派发去向
enum Disposition {
    /// 预订成功，需要调用后端；携带此前累计的尝试次数
    Dispatch { prior_attempts: u32 },
    /// 缓存已有答案，直接发放
    Cached(String),
    /// 本周期跳过（在途 / 终止性失败 / 重试耗尽）
    Skip,
}

/// 单次派发的结果
enum DispatchResult {
    Answered { idx: usize, pair: AnsweredPair },
    Failed { question: String, kind: BackendError },
    /// 停摆后放弃，未发起调用
    Abandoned,
}

/// 答案调度器
pub struct AnswerOrchestrator {
    backend: Arc<dyn AnswerBackend>,
    cache: Arc<FingerprintCache>,
    max_retries: u32,
    retry_base: Duration,
    request_timeout: Duration,
    max_in_flight: usize,
    halted: AtomicBool,
}

impl AnswerOrchestrator {
    pub fn new(
        config: &Config,
        backend: Arc<dyn AnswerBackend>,
        cache: Arc<FingerprintCache>,
    ) -> Self {
        Self {
            backend,
            cache,
            max_retries: config.max_retries.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_in_flight: config.max_concurrent_requests.max(1),
            halted: AtomicBool::new(false),
        }
    }

    /// 是否已进入停摆状态
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// 解决一批问题
    ///
    /// # 返回
    /// 发放序列按提取顺序排列；被跳过 / 失败的问题不在其中
    pub async fn resolve(&self, questions: &[Question]) -> AppResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if questions.is_empty() {
            return Ok(outcome);
        }
        if self.is_halted() {
            warn!("⚠️ 调度器已停摆，本批 {} 个问题不再派发", questions.len());
            outcome.halted = true;
            return Ok(outcome);
        }

        // ========== 第一阶段：逐个问题决定去向 ==========
        // 占位向量保证最终发放顺序与提取顺序一致
        let mut slots: Vec<Option<AnsweredPair>> = vec![None; questions.len()];
        let mut to_dispatch: Vec<(usize, &Question, u32)> = Vec::new();

        for (idx, question) in questions.iter().enumerate() {
            match self.classify(question) {
                Disposition::Dispatch { prior_attempts } => {
                    to_dispatch.push((idx, question, prior_attempts));
                }
                Disposition::Cached(answer) => {
                    outcome.from_cache += 1;
                    slots[idx] = Some(AnsweredPair {
                        question: question.text.clone(),
                        answer,
                    });
                }
                Disposition::Skip => {}
            }
        }

        info!(
            "📨 本批问题 {} 个: 新派发 {}, 缓存命中 {}",
            questions.len(),
            to_dispatch.len(),
            outcome.from_cache
        );

        // ========== 第二阶段：受限并发调用后端 ==========
        let results: Vec<AppResult<DispatchResult>> = stream::iter(to_dispatch)
            .map(|(idx, question, prior)| self.dispatch_one(idx, question, prior))
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for result in results {
            match result? {
                DispatchResult::Answered { idx, pair } => slots[idx] = Some(pair),
                DispatchResult::Failed { question, kind } => {
                    outcome.failures.push((question, kind));
                }
                DispatchResult::Abandoned => {}
            }
        }

        outcome.pairs = slots.into_iter().flatten().collect();
        outcome.halted = self.is_halted();
        Ok(outcome)
    }

    /// 决定单个问题的去向
    fn classify(&self, question: &Question) -> Disposition {
        let fp = &question.fingerprint;
        if self.cache.reserve(fp) {
            return Disposition::Dispatch { prior_attempts: 0 };
        }
        match self.cache.lookup(fp) {
            Some(CacheEntry::Answered { answer, .. }) => {
                debug!("✓ 缓存命中: {}", fp);
                Disposition::Cached(answer)
            }
            Some(CacheEntry::Pending { .. }) => {
                debug!("同指纹调用在途，本周期跳过: {}", fp);
                Disposition::Skip
            }
            Some(CacheEntry::Failed { .. }) => match self.cache.retry_failed(fp, self.max_retries)
            {
                Some(prior_attempts) => {
                    debug!("失败条目重新进入派发: {}", fp);
                    Disposition::Dispatch { prior_attempts }
                }
                None => Disposition::Skip,
            },
            // reserve 返回 false 后条目必然存在；走到这里说明缓存被绕过修改
            None => {
                error!("指纹 {} 在 reserve 失败后却不在缓存中", fp);
                Disposition::Skip
            }
        }
    }

    /// 派发单个问题（带超时、退避重试与停摆检查）
    async fn dispatch_one(
        &self,
        idx: usize,
        question: &Question,
        prior_attempts: u32,
    ) -> AppResult<DispatchResult> {
        let fp = &question.fingerprint;
        let mut attempts = prior_attempts;

        loop {
            if self.is_halted() {
                // 停摆后不再发起调用，把已预订的条目标记为取消
                self.cache.resolve(
                    fp,
                    Outcome::Failed {
                        kind: BackendError::Cancelled,
                        attempts,
                    },
                )?;
                return Ok(DispatchResult::Abandoned);
            }

            attempts += 1;
            debug!(
                "📤 调用后端 (第 {}/{} 次): {}",
                attempts,
                self.max_retries,
                truncate_text(&question.text, 60)
            );

            let result = match timeout(self.request_timeout, self.backend.answer(&question.text))
                .await
            {
                Ok(inner) => inner,
                Err(_) => Err(BackendError::Timeout),
            };

            match result {
                Ok(answer) => {
                    self.cache.resolve(
                        fp,
                        Outcome::Answered {
                            answer: answer.clone(),
                        },
                    )?;
                    return Ok(DispatchResult::Answered {
                        idx,
                        pair: AnsweredPair {
                            question: question.text.clone(),
                            answer,
                        },
                    });
                }
                Err(kind) if kind.is_halting() => {
                    error!("❌ 认证失败，停止派发后续问题: {}", kind);
                    self.halted.store(true, Ordering::SeqCst);
                    self.finish_failed(fp, kind.clone(), attempts)?;
                    return Ok(DispatchResult::Failed {
                        question: question.text.clone(),
                        kind,
                    });
                }
                Err(kind) if kind.is_retryable() && attempts < self.max_retries => {
                    let backoff = self.backoff(attempts);
                    warn!(
                        "⚠️ 调用失败 ({})，{} 毫秒后重试",
                        kind,
                        backoff.as_millis()
                    );
                    sleep(backoff).await;
                }
                Err(kind) => {
                    warn!("⚠️ 问题最终失败 ({} 次尝试): {}", attempts, kind);
                    self.finish_failed(fp, kind.clone(), attempts)?;
                    return Ok(DispatchResult::Failed {
                        question: question.text.clone(),
                        kind,
                    });
                }
            }
        }
    }

    fn finish_failed(&self, fp: &Fingerprint, kind: BackendError, attempts: u32) -> AppResult<()> {
        self.cache.resolve(fp, Outcome::Failed { kind, attempts })
    }

    /// 指数退避：base * 2^(attempts-1)
    fn backoff(&self, attempts: u32) -> Duration {
        let shift = attempts.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(1u32 << shift)
    }
}
