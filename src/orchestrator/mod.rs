pub mod answer_orchestrator;
pub mod app;

pub use answer_orchestrator::{AnswerOrchestrator, BatchOutcome};
pub use app::{App, RunMode};
