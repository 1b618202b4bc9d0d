//! 指纹缓存
//!
//! 整个系统里唯一被多个并发路径修改的共享结构。所有修改都走
//! reserve / resolve 两段式协议：
//! - `reserve` 原子地插入 `Pending`，保证同一指纹至多一次在途后端调用
//! - `resolve` 把 `Pending` 迁移到 `Answered` / `Failed` 终态
//!
//! 进程生命周期内条目只增不减，增长上界是见过的不同问题数量，
//! 对交互式工具而言可以接受。缓存以显式对象的形式被调度器与应用
//! 持有（而不是模块级全局），测试各自运行在隔离的实例上。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use crate::error::{AppError, AppResult, BackendError};
use crate::models::Fingerprint;

/// 缓存条目状态
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// 已被某个调用方占用，后端调用在途（或即将发起）
    Pending {
        since: DateTime<Local>,
        attempts: u32,
    },
    /// 已得到答案
    Answered {
        answer: String,
        at: DateTime<Local>,
    },
    /// 调用失败；可重试类别可经 `retry_failed` 重新进入 `Pending`
    Failed {
        kind: BackendError,
        at: DateTime<Local>,
        attempts: u32,
    },
}

/// `resolve` 的目标状态
#[derive(Debug, Clone)]
pub enum Outcome {
    Answered { answer: String },
    Failed { kind: BackendError, attempts: u32 },
}

/// 指纹缓存
#[derive(Debug, Default)]
pub struct FingerprintCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询指纹当前状态
    pub fn lookup(&self, fp: &Fingerprint) -> Option<CacheEntry> {
        self.lock().get(fp).cloned()
    }

    /// 预订指纹：不存在时原子插入 `Pending` 并返回 true
    ///
    /// 返回 false 表示该指纹已被别的调用方持有，调用方不得发起
    /// 后端调用。这是"同一问题至多一次在途调用"的唯一闸门。
    pub fn reserve(&self, fp: &Fingerprint) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(fp) {
            return false;
        }
        entries.insert(
            fp.clone(),
            CacheEntry::Pending {
                since: Local::now(),
                attempts: 0,
            },
        );
        true
    }

    /// 把可重试且尝试次数未耗尽的 `Failed` 条目重新置为 `Pending`
    ///
    /// # 返回
    /// 重新预订成功时返回此前累计的尝试次数
    pub fn retry_failed(&self, fp: &Fingerprint, max_retries: u32) -> Option<u32> {
        let mut entries = self.lock();
        match entries.get(fp) {
            Some(CacheEntry::Failed { kind, attempts, .. })
                if kind.is_retryable() && *attempts < max_retries =>
            {
                let prior = *attempts;
                entries.insert(
                    fp.clone(),
                    CacheEntry::Pending {
                        since: Local::now(),
                        attempts: prior,
                    },
                );
                Some(prior)
            }
            _ => None,
        }
    }

    /// 把 `Pending` 条目迁移到终态
    ///
    /// 对非 `Pending` 条目调用意味着 reserve/resolve 纪律被破坏，
    /// 返回 `InvariantViolation`（正确运行下绝不发生）。
    pub fn resolve(&self, fp: &Fingerprint, outcome: Outcome) -> AppResult<()> {
        let mut entries = self.lock();
        match entries.get(fp) {
            Some(CacheEntry::Pending { .. }) => {
                let entry = match outcome {
                    Outcome::Answered { answer } => CacheEntry::Answered {
                        answer,
                        at: Local::now(),
                    },
                    Outcome::Failed { kind, attempts } => CacheEntry::Failed {
                        kind,
                        at: Local::now(),
                        attempts,
                    },
                };
                entries.insert(fp.clone(), entry);
                Ok(())
            }
            other => Err(AppError::InvariantViolation(format!(
                "resolve 要求条目处于 Pending 状态，实际为 {:?} (指纹: {})",
                other, fp
            ))),
        }
    }

    /// 取消所有在途条目（用户中断 / 进程退出时调用）
    ///
    /// 永远停在 `Pending` 的条目会让后续周期的去重逻辑悄悄吞掉
    /// 该问题，所以取消时必须把它们显式迁移到 `Failed(Cancelled)`。
    pub fn cancel_pending(&self) -> usize {
        let mut entries = self.lock();
        let mut cancelled = 0;
        for entry in entries.values_mut() {
            if let CacheEntry::Pending { attempts, .. } = entry {
                let prior = *attempts;
                *entry = CacheEntry::Failed {
                    kind: BackendError::Cancelled,
                    at: Local::now(),
                    attempts: prior,
                };
                cancelled += 1;
            }
        }
        cancelled
    }

    /// 只读快照（历史展示 / 统计导出）
    pub fn snapshot(&self) -> HashMap<Fingerprint, CacheEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, CacheEntry>> {
        // 临界区内没有 panic 路径，锁中毒时直接取回内部数据
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(text: &str) -> Fingerprint {
        Fingerprint::of(text)
    }

    #[test]
    fn test_reserve_is_exclusive() {
        let cache = FingerprintCache::new();
        let key = fp("Who wrote Hamlet?");

        assert!(cache.reserve(&key));
        // 第二次预订同一指纹必须失败
        assert!(!cache.reserve(&key));
        assert!(matches!(
            cache.lookup(&key),
            Some(CacheEntry::Pending { .. })
        ));
    }

    #[test]
    fn test_resolve_answered() {
        let cache = FingerprintCache::new();
        let key = fp("Who wrote Hamlet?");

        assert!(cache.reserve(&key));
        cache
            .resolve(
                &key,
                Outcome::Answered {
                    answer: "William Shakespeare".to_string(),
                },
            )
            .unwrap();

        match cache.lookup(&key) {
            Some(CacheEntry::Answered { answer, .. }) => {
                assert_eq!(answer, "William Shakespeare");
            }
            other => panic!("期望 Answered，实际为 {:?}", other),
        }
        // 已回答的指纹不可再预订
        assert!(!cache.reserve(&key));
    }

    #[test]
    fn test_resolve_without_reserve_is_invariant_violation() {
        let cache = FingerprintCache::new();
        let key = fp("Who wrote Hamlet?");

        let result = cache.resolve(
            &key,
            Outcome::Answered {
                answer: "x".to_string(),
            },
        );
        assert!(matches!(result, Err(AppError::InvariantViolation(_))));
    }

    #[test]
    fn test_resolve_twice_is_invariant_violation() {
        let cache = FingerprintCache::new();
        let key = fp("Who wrote Hamlet?");

        assert!(cache.reserve(&key));
        cache
            .resolve(
                &key,
                Outcome::Failed {
                    kind: BackendError::Timeout,
                    attempts: 3,
                },
            )
            .unwrap();

        let second = cache.resolve(
            &key,
            Outcome::Answered {
                answer: "x".to_string(),
            },
        );
        assert!(matches!(second, Err(AppError::InvariantViolation(_))));
    }

    #[test]
    fn test_retry_failed_transitions() {
        let cache = FingerprintCache::new();
        let key = fp("Who wrote Hamlet?");

        assert!(cache.reserve(&key));
        cache
            .resolve(
                &key,
                Outcome::Failed {
                    kind: BackendError::Timeout,
                    attempts: 1,
                },
            )
            .unwrap();

        // 可重试且未耗尽 -> 重新进入 Pending，保留累计次数
        assert_eq!(cache.retry_failed(&key, 3), Some(1));
        assert!(matches!(
            cache.lookup(&key),
            Some(CacheEntry::Pending { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_retry_failed_respects_limits() {
        let cache = FingerprintCache::new();
        let exhausted = fp("q1?");
        let terminal = fp("q2?");

        assert!(cache.reserve(&exhausted));
        cache
            .resolve(
                &exhausted,
                Outcome::Failed {
                    kind: BackendError::Timeout,
                    attempts: 3,
                },
            )
            .unwrap();
        // 尝试次数已耗尽
        assert_eq!(cache.retry_failed(&exhausted, 3), None);

        assert!(cache.reserve(&terminal));
        cache
            .resolve(
                &terminal,
                Outcome::Failed {
                    kind: BackendError::InvalidRequest("bad".to_string()),
                    attempts: 1,
                },
            )
            .unwrap();
        // 终止性错误不重试
        assert_eq!(cache.retry_failed(&terminal, 3), None);
    }

    #[test]
    fn test_cancel_pending() {
        let cache = FingerprintCache::new();
        let pending = fp("q1?");
        let answered = fp("q2?");

        assert!(cache.reserve(&pending));
        assert!(cache.reserve(&answered));
        cache
            .resolve(
                &answered,
                Outcome::Answered {
                    answer: "ok".to_string(),
                },
            )
            .unwrap();

        assert_eq!(cache.cancel_pending(), 1);
        assert!(matches!(
            cache.lookup(&pending),
            Some(CacheEntry::Failed {
                kind: BackendError::Cancelled,
                ..
            })
        ));
        // 已终态的条目不受影响
        assert!(matches!(
            cache.lookup(&answered),
            Some(CacheEntry::Answered { .. })
        ));
    }

    #[test]
    fn test_snapshot_is_readonly_copy() {
        let cache = FingerprintCache::new();
        let key = fp("q1?");
        assert!(cache.reserve(&key));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 1);

        // 修改快照不影响缓存本体
        drop(snapshot);
        assert_eq!(cache.len(), 1);
    }
}
