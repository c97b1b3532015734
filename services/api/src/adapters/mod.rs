pub mod content_llm;
pub mod csv_store;
pub mod tts;

pub use content_llm::OpenAiContentAdapter;
pub use csv_store::CsvStore;
pub use tts::OpenAiTtsAdapter;
