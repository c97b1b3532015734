pub mod codec;
pub mod domain;
pub mod ports;
pub mod session;
pub mod text;

pub use domain::{
    Badge, GeneratedContent, PassageRecord, ProgressRecord, QuizOption, QuizQuestion,
    VocabularyEntry,
};
pub use ports::{ContentGenerator, PortError, PortResult, RecordStore, TextToSpeechService};
pub use session::{LearnerSession, Lesson, QuizOutcome};
