//! crates/reading_adventure_core/src/session.rs
//!
//! The learner's session: the current lesson, the passage history and the
//! progress record, plus the point rules applied after each activity.
//!
//! The session is an explicit value owned by the presentation layer. Every
//! progress change is saved before it is committed in memory, so a failed
//! write never leaves the two out of step.

use crate::domain::{
    PassageRecord, ProgressRecord, QuizQuestion, COMPREHENSION_POINTS, LESSON_QUESTION_LIMIT,
    PASSAGE_START_POINTS, QUIZ_CORRECT_POINTS, WORD_LEARNED_POINTS,
};
use crate::ports::{ContentGenerator, PortError, PortResult, RecordStore};
use chrono::Utc;
use tracing::{info, warn};

/// The passage currently being studied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub passage: PassageRecord,
    /// Empty for passages loaded from the store.
    pub quiz: Vec<QuizQuestion>,
    pub comprehension_submitted: bool,
    pub quiz_submitted: bool,
}

impl Lesson {
    pub fn new(passage: PassageRecord, quiz: Vec<QuizQuestion>) -> Self {
        Self {
            passage,
            quiz,
            comprehension_submitted: false,
            quiz_submitted: false,
        }
    }

    /// The comprehension questions presented to the learner.
    pub fn presented_questions(&self) -> &[String] {
        let end = self.passage.questions.len().min(LESSON_QUESTION_LIMIT);
        &self.passage.questions[..end]
    }

    pub fn presented_quiz(&self) -> &[QuizQuestion] {
        let end = self.quiz.len().min(LESSON_QUESTION_LIMIT);
        &self.quiz[..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub correct: usize,
    pub graded: usize,
    pub points_awarded: u64,
}

#[derive(Debug)]
pub struct LearnerSession {
    progress: ProgressRecord,
    passages: Vec<PassageRecord>,
    lesson: Option<Lesson>,
}

impl LearnerSession {
    /// Builds a session from already loaded state. The most recent passage,
    /// if any, becomes the current lesson.
    pub fn new(progress: ProgressRecord, passages: Vec<PassageRecord>) -> Self {
        let lesson = passages.last().cloned().map(|p| Lesson::new(p, Vec::new()));
        Self {
            progress,
            passages,
            lesson,
        }
    }

    /// Loads the passage history and progress from the store.
    pub fn resume(store: &dyn RecordStore) -> Self {
        let passages = store.load_all_passages();
        let progress = store.load_progress();
        info!(
            passages = passages.len(),
            points = progress.points,
            "Resumed learner session"
        );
        Self::new(progress, passages)
    }

    pub fn progress(&self) -> &ProgressRecord {
        &self.progress
    }

    pub fn passages(&self) -> &[PassageRecord] {
        &self.passages
    }

    pub fn lesson(&self) -> Option<&Lesson> {
        self.lesson.as_ref()
    }

    pub fn current_lesson(&self) -> PortResult<&Lesson> {
        self.lesson
            .as_ref()
            .ok_or_else(|| PortError::NotFound("No lesson is in progress".to_string()))
    }

    /// Returns the current lesson, generating one only if there is none yet.
    pub async fn ensure_lesson(
        &mut self,
        store: &dyn RecordStore,
        generator: &dyn ContentGenerator,
    ) -> PortResult<&Lesson> {
        if self.lesson.is_none() {
            info!("No stored passage, generating the first lesson");
            return self.start_new_lesson(store, generator).await;
        }
        self.current_lesson()
    }

    /// Generates a new passage, stores it and makes it the current lesson.
    ///
    /// If generation fails nothing is stored and the session is unchanged.
    pub async fn start_new_lesson(
        &mut self,
        store: &dyn RecordStore,
        generator: &dyn ContentGenerator,
    ) -> PortResult<&Lesson> {
        let content = generator.generate().await.map_err(|e| {
            warn!("Content generation failed, keeping existing lessons: {}", e);
            e
        })?;
        if content.passage.trim().is_empty() {
            return Err(PortError::Generation(
                "Generated passage is empty".to_string(),
            ));
        }

        let (record, quiz) = content.into_record();
        store.append_passage(&record)?;
        info!(
            words = record.vocabulary.len(),
            questions = record.questions.len(),
            quiz = quiz.len(),
            "Stored new passage"
        );
        self.passages.push(record.clone());
        self.lesson = Some(Lesson::new(record, quiz));

        let mut updated = self.progress.clone();
        updated.complete_passage();
        updated.award(PASSAGE_START_POINTS);
        self.commit(store, updated)?;

        self.current_lesson()
    }

    /// Marks every word of the current lesson as learned. Returns the words
    /// that were new to the learner.
    pub fn learn_vocabulary(&mut self, store: &dyn RecordStore) -> PortResult<Vec<String>> {
        let lesson = self.current_lesson()?;
        let mut updated = self.progress.clone();
        let newly_learned: Vec<String> = lesson
            .passage
            .vocabulary
            .iter()
            .filter(|entry| updated.learn_word(&entry.word))
            .map(|entry| entry.word.clone())
            .collect();

        if newly_learned.is_empty() {
            return Ok(newly_learned);
        }

        updated.award(WORD_LEARNED_POINTS * newly_learned.len() as u64);
        self.commit(store, updated)?;
        Ok(newly_learned)
    }

    /// Records the learner's comprehension answers. Points are awarded once
    /// per lesson; later submissions award nothing.
    pub fn submit_comprehension(
        &mut self,
        store: &dyn RecordStore,
        answers: &[String],
    ) -> PortResult<u64> {
        let already_submitted = self.current_lesson()?.comprehension_submitted;
        if answers.iter().all(|a| a.trim().is_empty()) {
            return Err(PortError::InvalidInput(
                "At least one answer is required".to_string(),
            ));
        }
        if already_submitted {
            return Ok(0);
        }

        let mut updated = self.progress.clone();
        updated.award(COMPREHENSION_POINTS);
        self.commit(store, updated)?;
        if let Some(lesson) = self.lesson.as_mut() {
            lesson.comprehension_submitted = true;
        }
        Ok(COMPREHENSION_POINTS)
    }

    /// Grades the quiz against the options flagged correct.
    pub fn submit_quiz(
        &mut self,
        store: &dyn RecordStore,
        answers: &[String],
    ) -> PortResult<QuizOutcome> {
        let lesson = self.current_lesson()?;
        if lesson.quiz.is_empty() {
            return Err(PortError::InvalidInput(
                "This lesson has no quiz".to_string(),
            ));
        }

        let presented = lesson.presented_quiz();
        let correct = presented
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.correct_option() == Some(answer.as_str()))
            .count();
        let graded = presented.len();

        if lesson.quiz_submitted {
            return Ok(QuizOutcome {
                correct,
                graded,
                points_awarded: 0,
            });
        }

        let points_awarded = QUIZ_CORRECT_POINTS * correct as u64;
        let mut updated = self.progress.clone();
        updated.award(points_awarded);
        self.commit(store, updated)?;
        if let Some(lesson) = self.lesson.as_mut() {
            lesson.quiz_submitted = true;
        }

        Ok(QuizOutcome {
            correct,
            graded,
            points_awarded,
        })
    }

    fn commit(&mut self, store: &dyn RecordStore, mut updated: ProgressRecord) -> PortResult<()> {
        updated.touch(Utc::now());
        store.save_progress(&updated)?;
        self.progress = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeneratedContent, QuizOption, VocabularyEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        passages: Mutex<Vec<PassageRecord>>,
        progress: Mutex<Option<ProgressRecord>>,
        saves: Mutex<usize>,
        fail_writes: bool,
    }

    impl RecordStore for MemoryStore {
        fn append_passage(&self, record: &PassageRecord) -> PortResult<()> {
            if self.fail_writes {
                return Err(PortError::Storage("disk full".to_string()));
            }
            self.passages.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn load_all_passages(&self) -> Vec<PassageRecord> {
            self.passages.lock().unwrap().clone()
        }

        fn save_progress(&self, record: &ProgressRecord) -> PortResult<()> {
            if self.fail_writes {
                return Err(PortError::Storage("disk full".to_string()));
            }
            *self.progress.lock().unwrap() = Some(record.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        fn load_progress(&self) -> ProgressRecord {
            self.progress.lock().unwrap().clone().unwrap_or_default()
        }
    }

    struct FixedGenerator {
        content: Option<GeneratedContent>,
    }

    #[async_trait]
    impl ContentGenerator for FixedGenerator {
        async fn generate(&self) -> PortResult<GeneratedContent> {
            self.content
                .clone()
                .ok_or_else(|| PortError::Generation("upstream API error".to_string()))
        }
    }

    fn sample_content() -> GeneratedContent {
        GeneratedContent {
            passage: "The sun is a star. Trees are plants.".to_string(),
            vocabulary: vec![
                VocabularyEntry::new("sun", "a star"),
                VocabularyEntry::new("tree", "a plant"),
            ],
            questions: vec![
                "What is the sun?".to_string(),
                "What are trees?".to_string(),
            ],
            quiz: vec![
                QuizQuestion {
                    question: "What does 'sun' mean?".to_string(),
                    options: vec![
                        QuizOption { option: "a star".to_string(), is_correct: true },
                        QuizOption { option: "a plant".to_string(), is_correct: false },
                    ],
                },
                QuizQuestion {
                    question: "What does 'tree' mean?".to_string(),
                    options: vec![
                        QuizOption { option: "a star".to_string(), is_correct: false },
                        QuizOption { option: "a plant".to_string(), is_correct: true },
                    ],
                },
            ],
        }
    }

    fn working_generator() -> FixedGenerator {
        FixedGenerator { content: Some(sample_content()) }
    }

    #[tokio::test]
    async fn test_ensure_lesson_generates_only_when_empty() {
        let store = MemoryStore::default();
        let generator = working_generator();
        let mut session = LearnerSession::resume(&store);
        assert!(session.lesson().is_none());

        session.ensure_lesson(&store, &generator).await.unwrap();
        session.ensure_lesson(&store, &generator).await.unwrap();

        assert_eq!(store.load_all_passages().len(), 1);
        assert_eq!(session.progress().points, PASSAGE_START_POINTS);
        assert_eq!(session.progress().passages_completed, 1);
    }

    #[tokio::test]
    async fn test_resume_uses_latest_stored_passage() {
        let store = MemoryStore::default();
        let generator = working_generator();
        {
            let mut first = LearnerSession::resume(&store);
            first.start_new_lesson(&store, &generator).await.unwrap();
            first.start_new_lesson(&store, &generator).await.unwrap();
        }

        let mut session = LearnerSession::resume(&store);
        assert_eq!(session.passages().len(), 2);
        assert_eq!(session.progress().passages_completed, 2);
        let lesson = session.ensure_lesson(&store, &generator).await.unwrap();
        assert!(lesson.quiz.is_empty());
        assert_eq!(store.load_all_passages().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_generation_changes_nothing() {
        let store = MemoryStore::default();
        let mut session = LearnerSession::resume(&store);
        session
            .start_new_lesson(&store, &working_generator())
            .await
            .unwrap();
        let before = session.progress().clone();

        let broken = FixedGenerator { content: None };
        let result = session.start_new_lesson(&store, &broken).await;

        assert!(matches!(result, Err(PortError::Generation(_))));
        assert_eq!(store.load_all_passages().len(), 1);
        assert_eq!(session.progress(), &before);
        assert_eq!(store.load_progress(), before);
    }

    #[tokio::test]
    async fn test_empty_passage_is_rejected() {
        let store = MemoryStore::default();
        let mut content = sample_content();
        content.passage = "   ".to_string();
        let generator = FixedGenerator { content: Some(content) };
        let mut session = LearnerSession::resume(&store);

        let result = session.start_new_lesson(&store, &generator).await;
        assert!(matches!(result, Err(PortError::Generation(_))));
        assert!(store.load_all_passages().is_empty());
    }

    #[tokio::test]
    async fn test_learn_vocabulary_awards_new_words_once() {
        let store = MemoryStore::default();
        let mut session = LearnerSession::resume(&store);
        session
            .start_new_lesson(&store, &working_generator())
            .await
            .unwrap();

        let learned = session.learn_vocabulary(&store).unwrap();
        assert_eq!(learned, vec!["sun", "tree"]);
        assert_eq!(session.progress().points, PASSAGE_START_POINTS + 2 * WORD_LEARNED_POINTS);

        let again = session.learn_vocabulary(&store).unwrap();
        assert!(again.is_empty());
        assert_eq!(session.progress().points, PASSAGE_START_POINTS + 2 * WORD_LEARNED_POINTS);
        assert_eq!(store.load_progress().vocab_learned, vec!["sun", "tree"]);
    }

    #[tokio::test]
    async fn test_comprehension_requires_an_answer_and_pays_once() {
        let store = MemoryStore::default();
        let mut session = LearnerSession::resume(&store);
        session
            .start_new_lesson(&store, &working_generator())
            .await
            .unwrap();

        let blank = vec!["  ".to_string()];
        assert!(matches!(
            session.submit_comprehension(&store, &blank),
            Err(PortError::InvalidInput(_))
        ));

        let answers = vec!["A star".to_string(), String::new()];
        assert_eq!(session.submit_comprehension(&store, &answers).unwrap(), COMPREHENSION_POINTS);
        assert_eq!(session.submit_comprehension(&store, &answers).unwrap(), 0);
        assert_eq!(session.progress().points, PASSAGE_START_POINTS + COMPREHENSION_POINTS);
        assert!(session.lesson().unwrap().comprehension_submitted);
    }

    #[tokio::test]
    async fn test_quiz_grading() {
        let store = MemoryStore::default();
        let mut session = LearnerSession::resume(&store);
        session
            .start_new_lesson(&store, &working_generator())
            .await
            .unwrap();

        let answers = vec!["a star".to_string(), "a star".to_string()];
        let outcome = session.submit_quiz(&store, &answers).unwrap();
        assert_eq!(
            outcome,
            QuizOutcome { correct: 1, graded: 2, points_awarded: QUIZ_CORRECT_POINTS }
        );

        let retry = session.submit_quiz(&store, &["a star".to_string(), "a plant".to_string()]).unwrap();
        assert_eq!(retry.correct, 2);
        assert_eq!(retry.points_awarded, 0);
        assert_eq!(store.load_progress().points, PASSAGE_START_POINTS + QUIZ_CORRECT_POINTS);
    }

    #[tokio::test]
    async fn test_quiz_missing_for_stored_passage() {
        let store = MemoryStore::default();
        store
            .append_passage(&PassageRecord::new("Old passage.".to_string(), vec![], vec![]))
            .unwrap();
        let mut session = LearnerSession::resume(&store);
        assert!(matches!(
            session.submit_quiz(&store, &[]),
            Err(PortError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_activities_need_a_lesson() {
        let store = MemoryStore::default();
        let mut session = LearnerSession::resume(&store);
        assert!(matches!(session.learn_vocabulary(&store), Err(PortError::NotFound(_))));
        assert!(matches!(
            session.submit_comprehension(&store, &["answer".to_string()]),
            Err(PortError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_save_keeps_memory_unchanged() {
        let record = PassageRecord::new(
            "Stored.".to_string(),
            vec![VocabularyEntry::new("moon", "Earth's satellite")],
            vec![],
        );
        let store = MemoryStore { fail_writes: true, ..Default::default() };
        let mut session = LearnerSession::new(ProgressRecord::default(), vec![record]);

        let result = session.learn_vocabulary(&store);
        assert!(matches!(result, Err(PortError::Storage(_))));
        assert_eq!(session.progress(), &ProgressRecord::default());
        assert_eq!(*store.saves.lock().unwrap(), 0);
    }

    #[test]
    fn test_presented_questions_are_capped() {
        let questions: Vec<String> = (1..=5).map(|i| format!("Question {i}?")).collect();
        let lesson = Lesson::new(PassageRecord::new("Text.".to_string(), vec![], questions), vec![]);
        assert_eq!(lesson.presented_questions().len(), LESSON_QUESTION_LIMIT);
    }
}
