pub mod language;
pub mod question;
pub mod region;

pub use language::LanguageProfile;
pub use question::{AnsweredPair, Fingerprint, Question};
pub use region::Region;
