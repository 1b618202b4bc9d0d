pub mod cycle_ctx;
pub mod cycle_flow;

pub use cycle_ctx::CycleCtx;
pub use cycle_flow::{CycleFlow, CycleReport, PipelineState};
