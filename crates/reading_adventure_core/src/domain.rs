//! crates/reading_adventure_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};

//=========================================================================================
// Reward Rules
//=========================================================================================

/// Points awarded for starting a freshly generated passage.
pub const PASSAGE_START_POINTS: u64 = 10;
/// Points awarded for each vocabulary word learned for the first time.
pub const WORD_LEARNED_POINTS: u64 = 5;
/// Points awarded for submitting the comprehension answers of a lesson.
pub const COMPREHENSION_POINTS: u64 = 20;
/// Points awarded per correctly answered quiz question.
pub const QUIZ_CORRECT_POINTS: u64 = 5;
/// Only the first few questions of a lesson are presented and graded.
pub const LESSON_QUESTION_LIMIT: usize = 3;

pub const READER_BADGE_POINTS: u64 = 50;
pub const MASTER_READER_POINTS: u64 = 100;

//=========================================================================================
// Learning Content
//=========================================================================================

/// A single new word introduced by a passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub word: String,
    pub definition: String,
}

impl VocabularyEntry {
    pub fn new(word: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            definition: definition.into(),
        }
    }
}

/// One generated unit of learning content. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageRecord {
    pub passage: String,
    pub vocabulary: Vec<VocabularyEntry>,
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PassageRecord {
    /// Creates a record stamped with the current time.
    pub fn new(passage: String, vocabulary: Vec<VocabularyEntry>, questions: Vec<String>) -> Self {
        Self {
            passage,
            vocabulary,
            questions,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub option: String,
    pub is_correct: bool,
}

/// A multiple-choice vocabulary question. Quizzes live only in memory
/// for the current lesson; the passages table has no column for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<QuizOption>,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.is_correct)
            .map(|o| o.option.as_str())
    }
}

/// Everything the content generator produces for a new lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub passage: String,
    pub vocabulary: Vec<VocabularyEntry>,
    pub questions: Vec<String>,
    pub quiz: Vec<QuizQuestion>,
}

impl GeneratedContent {
    /// Splits the content into the persisted record and the in-memory quiz.
    pub fn into_record(self) -> (PassageRecord, Vec<QuizQuestion>) {
        (
            PassageRecord::new(self.passage, self.vocabulary, self.questions),
            self.quiz,
        )
    }
}

//=========================================================================================
// Learner Progress
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Reader,
    MasterReader,
}

impl Badge {
    pub fn title(&self) -> &'static str {
        match self {
            Badge::Reader => "Reader Badge",
            Badge::MasterReader => "Master Reader",
        }
    }
}

/// The single per-learner tally of points and learned vocabulary.
///
/// The session changes points only through [`ProgressRecord::award`], which
/// never subtracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressRecord {
    pub points: u64,
    pub passages_completed: u64,
    pub vocab_learned: Vec<String>,
    /// `None` until the record has been saved at least once.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn award(&mut self, points: u64) {
        self.points = self.points.saturating_add(points);
    }

    pub fn complete_passage(&mut self) {
        self.passages_completed = self.passages_completed.saturating_add(1);
    }

    /// Records a word as learned. Returns `false` if it was already known.
    pub fn learn_word(&mut self, word: &str) -> bool {
        if self.vocab_learned.iter().any(|w| w == word) {
            return false;
        }
        self.vocab_learned.push(word.to_string());
        true
    }

    pub fn has_learned(&self, word: &str) -> bool {
        self.vocab_learned.iter().any(|w| w == word)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }

    pub fn badges(&self) -> Vec<Badge> {
        let mut badges = Vec::new();
        if self.points >= READER_BADGE_POINTS {
            badges.push(Badge::Reader);
        }
        if self.points >= MASTER_READER_POINTS {
            badges.push(Badge::MasterReader);
        }
        badges
    }
}
