pub mod ocr_engine;
pub mod screen_capturer;

pub use ocr_engine::OcrEngine;
pub use screen_capturer::{RawCapture, ScreenCapturer};
