//! 周期上下文
//!
//! 封装"我正在跑第几个周期"这一信息

use std::fmt::Display;

/// 周期上下文
#[derive(Debug, Clone)]
pub struct CycleCtx {
    /// 周期序号（从 1 开始，仅用于日志显示）
    pub cycle_index: u64,

    /// 运行模式标签
    pub mode: &'static str,
}

impl CycleCtx {
    pub fn new(cycle_index: u64, mode: &'static str) -> Self {
        Self { cycle_index, mode }
    }
}

impl Display for CycleCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[周期 {} ({})]", self.cycle_index, self.mode)
    }
}
