//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use reading_adventure_core::{
    domain::{PassageRecord, ProgressRecord, QuizQuestion},
    ports::PortError,
    session::Lesson,
    text::split_into_sentences,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_progress_handler,
        list_passages_handler,
        get_lesson_handler,
        new_lesson_handler,
        ensure_lesson_handler,
        learn_vocabulary_handler,
        submit_comprehension_handler,
        submit_quiz_handler,
        speech_handler,
    ),
    components(
        schemas(
            ProgressResponse,
            PassageResponse,
            VocabularyItem,
            LessonResponse,
            QuizQuestionView,
            VocabularyResponse,
            ActivityResponse,
            QuizResponse,
            ComprehensionRequest,
            QuizRequest,
            SpeechRequest,
        )
    ),
    tags(
        (name = "Reading Adventure API", description = "API endpoints for the reading practice app.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The learner's progress and earned badges.
#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    points: u64,
    passages_completed: u64,
    vocab_learned: Vec<String>,
    last_updated: Option<DateTime<Utc>>,
    badges: Vec<String>,
}

impl From<&ProgressRecord> for ProgressResponse {
    fn from(progress: &ProgressRecord) -> Self {
        Self {
            points: progress.points,
            passages_completed: progress.passages_completed,
            vocab_learned: progress.vocab_learned.clone(),
            last_updated: progress.last_updated,
            badges: progress
                .badges()
                .iter()
                .map(|b| b.title().to_string())
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VocabularyItem {
    word: String,
    definition: String,
    learned: bool,
}

#[derive(Serialize, ToSchema)]
pub struct PassageResponse {
    passage: String,
    vocabulary: Vec<VocabularyItem>,
    questions: Vec<String>,
    created_at: DateTime<Utc>,
}

impl PassageResponse {
    fn new(record: &PassageRecord, progress: &ProgressRecord) -> Self {
        Self {
            passage: record.passage.clone(),
            vocabulary: record
                .vocabulary
                .iter()
                .map(|v| VocabularyItem {
                    word: v.word.clone(),
                    definition: v.definition.clone(),
                    learned: progress.has_learned(&v.word),
                })
                .collect(),
            questions: record.questions.clone(),
            created_at: record.created_at,
        }
    }
}

/// A quiz question as shown to the learner, without the answer.
#[derive(Serialize, ToSchema)]
pub struct QuizQuestionView {
    question: String,
    options: Vec<String>,
}

impl From<&QuizQuestion> for QuizQuestionView {
    fn from(question: &QuizQuestion) -> Self {
        Self {
            question: question.question.clone(),
            options: question.options.iter().map(|o| o.option.clone()).collect(),
        }
    }
}

/// The lesson currently being studied.
#[derive(Serialize, ToSchema)]
pub struct LessonResponse {
    grade_level: String,
    passage: PassageResponse,
    /// The passage split into sentences, for reading aloud one at a time.
    sentences: Vec<String>,
    comprehension_questions: Vec<String>,
    quiz: Vec<QuizQuestionView>,
    comprehension_submitted: bool,
    quiz_submitted: bool,
    progress: ProgressResponse,
}

impl LessonResponse {
    fn new(lesson: &Lesson, progress: &ProgressRecord, grade_level: &str) -> Self {
        Self {
            grade_level: grade_level.to_string(),
            passage: PassageResponse::new(&lesson.passage, progress),
            sentences: split_into_sentences(&lesson.passage.passage),
            comprehension_questions: lesson.presented_questions().to_vec(),
            quiz: lesson.presented_quiz().iter().map(QuizQuestionView::from).collect(),
            comprehension_submitted: lesson.comprehension_submitted,
            quiz_submitted: lesson.quiz_submitted,
            progress: ProgressResponse::from(progress),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VocabularyResponse {
    newly_learned: Vec<String>,
    progress: ProgressResponse,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityResponse {
    points_awarded: u64,
    progress: ProgressResponse,
}

#[derive(Serialize, ToSchema)]
pub struct QuizResponse {
    correct: usize,
    graded: usize,
    points_awarded: u64,
    progress: ProgressResponse,
}

#[derive(Deserialize, ToSchema)]
pub struct ComprehensionRequest {
    answers: Vec<String>,
}

/// The selected option text for each quiz question, in order.
#[derive(Deserialize, ToSchema)]
pub struct QuizRequest {
    answers: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SpeechRequest {
    text: String,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

fn port_error_response(e: PortError) -> HandlerError {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Generation(_) => StatusCode::BAD_GATEWAY,
        PortError::Storage(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {:?}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the learner's progress.
#[utoipa::path(
    get,
    path = "/progress",
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse)
    )
)]
pub async fn get_progress_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<ProgressResponse> {
    let session = app_state.session.lock().await;
    Json(ProgressResponse::from(session.progress()))
}

/// List every stored passage, oldest first.
#[utoipa::path(
    get,
    path = "/passages",
    responses(
        (status = 200, description = "Stored passages", body = [PassageResponse])
    )
)]
pub async fn list_passages_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<Vec<PassageResponse>> {
    let session = app_state.session.lock().await;
    let progress = session.progress();
    Json(
        session
            .passages()
            .iter()
            .map(|p| PassageResponse::new(p, progress))
            .collect(),
    )
}

/// Get the current lesson.
#[utoipa::path(
    get,
    path = "/lesson",
    responses(
        (status = 200, description = "The current lesson", body = LessonResponse),
        (status = 404, description = "No lesson has been generated yet")
    )
)]
pub async fn get_lesson_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<LessonResponse>, HandlerError> {
    let session = app_state.session.lock().await;
    let lesson = session.current_lesson().map_err(port_error_response)?;
    Ok(Json(LessonResponse::new(
        lesson,
        session.progress(),
        &app_state.config.grade_level,
    )))
}

/// Generate a new lesson and store its passage.
#[utoipa::path(
    post,
    path = "/lesson",
    responses(
        (status = 201, description = "Lesson generated", body = LessonResponse),
        (status = 502, description = "The content generator failed; nothing was stored"),
        (status = 500, description = "The passage or progress could not be saved")
    )
)]
pub async fn new_lesson_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<LessonResponse>), HandlerError> {
    let mut session = app_state.session.lock().await;
    session
        .start_new_lesson(app_state.store.as_ref(), app_state.generator.as_ref())
        .await
        .map_err(port_error_response)?;
    info!("New lesson started");

    let lesson = session.current_lesson().map_err(port_error_response)?;
    let response = LessonResponse::new(lesson, session.progress(), &app_state.config.grade_level);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Return the current lesson, generating one only if none is stored yet.
#[utoipa::path(
    post,
    path = "/lesson/ensure",
    responses(
        (status = 200, description = "The current or newly generated lesson", body = LessonResponse),
        (status = 502, description = "The content generator failed; nothing was stored")
    )
)]
pub async fn ensure_lesson_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<LessonResponse>, HandlerError> {
    let mut session = app_state.session.lock().await;
    session
        .ensure_lesson(app_state.store.as_ref(), app_state.generator.as_ref())
        .await
        .map_err(port_error_response)?;

    let lesson = session.current_lesson().map_err(port_error_response)?;
    Ok(Json(LessonResponse::new(
        lesson,
        session.progress(),
        &app_state.config.grade_level,
    )))
}

/// Mark the current lesson's vocabulary as learned.
#[utoipa::path(
    post,
    path = "/lesson/vocabulary",
    responses(
        (status = 200, description = "Words learned", body = VocabularyResponse),
        (status = 404, description = "No lesson in progress")
    )
)]
pub async fn learn_vocabulary_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<VocabularyResponse>, HandlerError> {
    let mut session = app_state.session.lock().await;
    let newly_learned = session
        .learn_vocabulary(app_state.store.as_ref())
        .map_err(port_error_response)?;
    Ok(Json(VocabularyResponse {
        newly_learned,
        progress: ProgressResponse::from(session.progress()),
    }))
}

/// Submit answers to the comprehension questions.
#[utoipa::path(
    post,
    path = "/lesson/comprehension",
    request_body = ComprehensionRequest,
    responses(
        (status = 200, description = "Answers recorded", body = ActivityResponse),
        (status = 400, description = "No answer was given"),
        (status = 404, description = "No lesson in progress")
    )
)]
pub async fn submit_comprehension_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ComprehensionRequest>,
) -> Result<Json<ActivityResponse>, HandlerError> {
    let mut session = app_state.session.lock().await;
    let points_awarded = session
        .submit_comprehension(app_state.store.as_ref(), &payload.answers)
        .map_err(port_error_response)?;
    Ok(Json(ActivityResponse {
        points_awarded,
        progress: ProgressResponse::from(session.progress()),
    }))
}

/// Submit the vocabulary quiz.
#[utoipa::path(
    post,
    path = "/lesson/quiz",
    request_body = QuizRequest,
    responses(
        (status = 200, description = "Quiz graded", body = QuizResponse),
        (status = 400, description = "The lesson has no quiz"),
        (status = 404, description = "No lesson in progress")
    )
)]
pub async fn submit_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, HandlerError> {
    let mut session = app_state.session.lock().await;
    let outcome = session
        .submit_quiz(app_state.store.as_ref(), &payload.answers)
        .map_err(port_error_response)?;
    Ok(Json(QuizResponse {
        correct: outcome.correct,
        graded: outcome.graded,
        points_awarded: outcome.points_awarded,
        progress: ProgressResponse::from(session.progress()),
    }))
}

/// Read text aloud. Returns MP3 audio (`audio/mpeg`).
#[utoipa::path(
    post,
    path = "/speech",
    request_body = SpeechRequest,
    responses(
        (status = 200, description = "MP3 audio of the text"),
        (status = 400, description = "The text is blank")
    )
)]
pub async fn speech_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SpeechRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let audio = app_state
        .tts_adapter
        .generate_audio(&payload.text)
        .await
        .map_err(port_error_response)?;
    Ok(([(CONTENT_TYPE, "audio/mpeg")], audio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::csv_store::{CsvStore, PASSAGES_FILE};
    use crate::config::Config;
    use async_trait::async_trait;
    use reading_adventure_core::domain::{
        GeneratedContent, QuizOption, VocabularyEntry, PASSAGE_START_POINTS, QUIZ_CORRECT_POINTS,
        WORD_LEARNED_POINTS,
    };
    use reading_adventure_core::ports::{ContentGenerator, PortResult, TextToSpeechService};
    use std::path::Path;
    use tempfile::tempdir;

    struct StubGenerator {
        fail: bool,
    }

    #[async_trait]
    impl ContentGenerator for StubGenerator {
        async fn generate(&self) -> PortResult<GeneratedContent> {
            if self.fail {
                return Err(PortError::Generation("rate limited".to_string()));
            }
            Ok(GeneratedContent {
                passage: "Butterflies drink nectar. They grow in a chrysalis!".to_string(),
                vocabulary: vec![
                    VocabularyEntry::new("nectar", "sweet liquid, found in flowers"),
                    VocabularyEntry::new("chrysalis", "a protective shell"),
                ],
                questions: vec!["What do butterflies drink?".to_string()],
                quiz: vec![QuizQuestion {
                    question: "What is nectar?".to_string(),
                    options: vec![
                        QuizOption { option: "Sweet liquid".to_string(), is_correct: true },
                        QuizOption { option: "A shell".to_string(), is_correct: false },
                    ],
                }],
            })
        }
    }

    struct StubSpeech;

    #[async_trait]
    impl TextToSpeechService for StubSpeech {
        async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
            if text.trim().is_empty() {
                return Err(PortError::InvalidInput("Nothing to read aloud".to_string()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    fn app_state(dir: &Path, fail: bool) -> Arc<AppState> {
        let config = Config::from_lookup(|_| None).unwrap();
        Arc::new(AppState::new(
            Arc::new(config),
            Arc::new(CsvStore::in_dir(dir)),
            Arc::new(StubGenerator { fail }),
            Arc::new(StubSpeech),
        ))
    }

    #[tokio::test]
    async fn test_fresh_start_has_no_lesson() {
        let temp = tempdir().unwrap();
        let state = app_state(temp.path(), false);

        let progress = get_progress_handler(State(state.clone())).await.0;
        assert_eq!(progress.points, 0);
        assert!(progress.last_updated.is_none());

        let err = get_lesson_handler(State(state.clone())).await.err().unwrap();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert!(list_passages_handler(State(state)).await.0.is_empty());
    }

    #[tokio::test]
    async fn test_lesson_flow_persists_across_restart() {
        let temp = tempdir().unwrap();
        let state = app_state(temp.path(), false);

        let (status, lesson) = new_lesson_handler(State(state.clone())).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lesson.0.sentences, vec!["Butterflies drink nectar", "They grow in a chrysalis"]);
        assert_eq!(lesson.0.quiz[0].options, vec!["Sweet liquid", "A shell"]);
        assert!(temp.path().join(PASSAGES_FILE).exists());

        let vocab = learn_vocabulary_handler(State(state.clone())).await.unwrap().0;
        assert_eq!(vocab.newly_learned, vec!["nectar", "chrysalis"]);

        let quiz = submit_quiz_handler(
            State(state.clone()),
            Json(QuizRequest { answers: vec!["Sweet liquid".to_string()] }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(quiz.correct, 1);
        let expected = PASSAGE_START_POINTS + 2 * WORD_LEARNED_POINTS + QUIZ_CORRECT_POINTS;
        assert_eq!(quiz.progress.points, expected);

        // A new process resumes with the stored passage and progress.
        let restarted = app_state(temp.path(), true);
        let lesson = ensure_lesson_handler(State(restarted.clone())).await.unwrap().0;
        assert_eq!(lesson.passage.vocabulary[0].definition, "sweet liquid, found in flowers");
        assert!(lesson.passage.vocabulary.iter().all(|v| v.learned));
        assert!(lesson.quiz.is_empty());
        assert_eq!(lesson.progress.points, expected);
        assert_eq!(list_passages_handler(State(restarted)).await.0.len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let temp = tempdir().unwrap();
        let state = app_state(temp.path(), true);

        let err = new_lesson_handler(State(state.clone())).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);
        assert!(!temp.path().join(PASSAGES_FILE).exists());
        assert_eq!(get_progress_handler(State(state)).await.0.points, 0);
    }

    #[tokio::test]
    async fn test_blank_comprehension_is_bad_request() {
        let temp = tempdir().unwrap();
        let state = app_state(temp.path(), false);
        new_lesson_handler(State(state.clone())).await.unwrap();

        let err = submit_comprehension_handler(
            State(state.clone()),
            Json(ComprehensionRequest { answers: vec![" ".to_string()] }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let ok = submit_comprehension_handler(
            State(state),
            Json(ComprehensionRequest { answers: vec!["Nectar".to_string()] }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(ok.points_awarded, 20);
    }

    #[tokio::test]
    async fn test_speech_returns_audio() {
        let temp = tempdir().unwrap();
        let state = app_state(temp.path(), false);

        let response = speech_handler(
            State(state.clone()),
            Json(SpeechRequest { text: "nectar".to_string() }),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/mpeg");

        let err = speech_handler(State(state), Json(SpeechRequest { text: String::new() }))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_port_error_status_codes() {
        let cases = [
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PortError::Generation("x".into()), StatusCode::BAD_GATEWAY),
            (PortError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (PortError::Unexpected("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(port_error_response(error).0, expected);
        }
    }
}
