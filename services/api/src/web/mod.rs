pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{
    ensure_lesson_handler, get_lesson_handler, get_progress_handler, learn_vocabulary_handler,
    list_passages_handler, new_lesson_handler, speech_handler, submit_comprehension_handler,
    submit_quiz_handler,
};
