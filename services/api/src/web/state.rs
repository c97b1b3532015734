//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use reading_adventure_core::ports::{ContentGenerator, RecordStore, TextToSpeechService};
use reading_adventure_core::session::LearnerSession;
use std::sync::Arc;
use tokio::sync::Mutex;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The app serves a single learner. Their session sits behind one async mutex, so
/// the store only ever sees one writer at a time.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RecordStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub session: Mutex<LearnerSession>,
}

impl AppState {
    /// Creates the state, resuming the learner's session from the store.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn ContentGenerator>,
        tts_adapter: Arc<dyn TextToSpeechService>,
    ) -> Self {
        let session = LearnerSession::resume(store.as_ref());
        Self {
            config,
            store,
            generator,
            tts_adapter,
            session: Mutex::new(session),
        }
    }
}
