pub mod answer_service;
pub mod question_extractor;
pub mod sink;
pub mod text_normalizer;
pub mod warn_writer;

pub use answer_service::{AnswerBackend, AnswerService};
pub use question_extractor::QuestionExtractor;
pub use sink::{AnswerSink, ClipboardSink, FileSink, TerminalSink};
pub use warn_writer::WarnWriter;
