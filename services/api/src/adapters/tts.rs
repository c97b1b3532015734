//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service,
//! used to read passages, single sentences and vocabulary words aloud.
//! It implements the `TextToSpeechService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::audio::{CreateSpeechRequest, SpeechModel, Voice},
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use reading_adventure_core::ports::{PortError, PortResult, TextToSpeechService};
use tracing::debug;

/// Parses a configured voice name.
pub fn parse_voice(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

/// An adapter that implements the `TextToSpeechService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiTtsAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

#[async_trait]
impl TextToSpeechService for OpenAiTtsAdapter {
    /// Returns MP3 audio for the given text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PortError::InvalidInput("Nothing to read aloud".to_string()));
        }
        debug!(chars = text.len(), "Requesting speech");

        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.voice.clone(),
            ..Default::default()
        };

        // The orphan rule keeps us from a `From` impl, so map the error by hand.
        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}
