//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{tts::parse_voice, CsvStore, OpenAiContentAdapter, OpenAiTtsAdapter},
    config::Config,
    error::ApiError,
    web::{
        ensure_lesson_handler, get_lesson_handler, get_progress_handler, learn_vocabulary_handler,
        list_passages_handler, new_lesson_handler, rest::ApiDoc, speech_handler,
        state::AppState, submit_comprehension_handler, submit_quiz_handler,
    },
};
use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Record Store ---
    let store = Arc::new(CsvStore::in_dir(&config.data_dir));
    info!(
        "Using passages at {} and progress at {}",
        store.passages_path().display(),
        store.progress_path().display()
    );

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(config.require_openai_api_key()?);
    let openai_client = Client::with_config(openai_config);

    let generator = Arc::new(OpenAiContentAdapter::new(
        openai_client.clone(),
        config.content_model.clone(),
        config.grade_level.clone(),
        config.content_temperature,
    ));

    let tts_voice = parse_voice(&config.tts_voice).ok_or_else(|| {
        ApiError::Internal(format!(
            "Invalid TTS voice specified in config: '{}'",
            config.tts_voice
        ))
    })?;
    let tts_adapter = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));

    // --- 4. Build the Shared AppState (resumes the learner's session) ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        store,
        generator,
        tts_adapter,
    ));

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/progress", get(get_progress_handler))
        .route("/passages", get(list_passages_handler))
        .route("/lesson", get(get_lesson_handler).post(new_lesson_handler))
        .route("/lesson/ensure", post(ensure_lesson_handler))
        .route("/lesson/vocabulary", post(learn_vocabulary_handler))
        .route("/lesson/comprehension", post(submit_comprehension_handler))
        .route("/lesson/quiz", post(submit_quiz_handler))
        .route("/speech", post(speech_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
