//! services/api/src/adapters/content_llm.rs
//!
//! This module contains the adapter for the content-generating LLM.
//! It implements the `ContentGenerator` port from the `core` crate.

const PASSAGE_INSTRUCTIONS: &str = r#"You write reading practice for young English learners.

Write a short, engaging reading passage (about 100-150 words). The passage should be fun,
use simple vocabulary, and include 3-5 new words the reader might not know yet.

Reply with ONLY a JSON object, no markdown and no explanation, shaped exactly like this:
{"passage": "<the passage>", "vocabulary": [{"word": "<new word>", "definition": "<simple definition>"}]}"#;

const QUESTIONS_INSTRUCTIONS: &str = r#"You write comprehension questions for young English learners.

Given a reading passage, write exactly 3 questions that test understanding of it.

Reply with ONLY a JSON object, no markdown and no explanation, shaped exactly like this:
{"questions": ["<question 1>", "<question 2>", "<question 3>"]}"#;

const QUIZ_INSTRUCTIONS: &str = r#"You write vocabulary quizzes for young English learners.

Given a passage and its vocabulary words, write 3 multiple-choice questions about the meaning
and usage of the vocabulary words. Each question has 4 options and exactly one correct option.

Reply with ONLY a JSON object, no markdown and no explanation, shaped exactly like this:
{"questions": [{"question": "<question>", "options": [{"option": "<text>", "is_correct": false}]}]}"#;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use reading_adventure_core::{
    domain::{GeneratedContent, QuizOption, QuizQuestion, VocabularyEntry},
    ports::{ContentGenerator, PortError, PortResult},
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    grade_level: String,
    temperature: f32,
}

impl OpenAiContentAdapter {
    /// Creates a new `OpenAiContentAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: String,
        grade_level: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            model,
            grade_level,
            temperature,
        }
    }

    /// Sends one chat completion and parses the reply as a JSON object.
    async fn complete_json<T: DeserializeOwned>(
        &self,
        instructions: &str,
        user_input: String,
    ) -> PortResult<T> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Generation("Content LLM response contained no text content.".to_string())
            })?;

        parse_json_reply(&content)
    }
}

//=========================================================================================
// Reply Payloads
//=========================================================================================

#[derive(Deserialize)]
struct PassagePayload {
    passage: String,
    #[serde(default)]
    vocabulary: Vec<VocabularyPayload>,
}

#[derive(Deserialize)]
struct VocabularyPayload {
    word: String,
    definition: String,
}

impl PassagePayload {
    fn to_domain(self) -> PortResult<(String, Vec<VocabularyEntry>)> {
        let passage = self.passage.trim().to_string();
        if passage.is_empty() {
            return Err(PortError::Generation("LLM returned an empty passage.".to_string()));
        }
        let vocabulary = self
            .vocabulary
            .into_iter()
            .filter(|v| !v.word.trim().is_empty())
            .map(|v| VocabularyEntry::new(v.word.trim(), v.definition.trim()))
            .collect();
        Ok((passage, vocabulary))
    }
}

#[derive(Deserialize)]
struct QuestionsPayload {
    questions: Vec<String>,
}

impl QuestionsPayload {
    fn to_domain(self) -> PortResult<Vec<String>> {
        let questions: Vec<String> = self
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() {
            return Err(PortError::Generation("LLM returned no questions.".to_string()));
        }
        Ok(questions)
    }
}

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<QuizQuestionPayload>,
}

#[derive(Deserialize)]
struct QuizQuestionPayload {
    question: String,
    options: Vec<QuizOptionPayload>,
}

#[derive(Deserialize)]
struct QuizOptionPayload {
    option: String,
    #[serde(default)]
    is_correct: bool,
}

impl QuizPayload {
    /// Keeps only questions that can actually be graded.
    fn to_domain(self) -> Vec<QuizQuestion> {
        self.questions
            .into_iter()
            .map(|q| QuizQuestion {
                question: q.question.trim().to_string(),
                options: q
                    .options
                    .into_iter()
                    .map(|o| QuizOption {
                        option: o.option.trim().to_string(),
                        is_correct: o.is_correct,
                    })
                    .collect(),
            })
            .filter(|q| !q.question.is_empty() && q.correct_option().is_some())
            .collect()
    }
}

/// Parses the JSON object in an LLM reply, tolerating code fences or prose
/// around it.
fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> PortResult<T> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    };
    serde_json::from_str(json).map_err(|e| {
        debug!(reply, "Unparsable LLM reply");
        PortError::Generation(format!("LLM reply was not the expected JSON: {}", e))
    })
}

//=========================================================================================
// `ContentGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerator for OpenAiContentAdapter {
    /// Generates a passage, then its comprehension questions, then a vocabulary quiz.
    /// A failed quiz is not fatal; the lesson simply has no quiz.
    async fn generate(&self) -> PortResult<GeneratedContent> {
        let passage: PassagePayload = self
            .complete_json(
                PASSAGE_INSTRUCTIONS,
                format!("Write a passage for a {} grader.", self.grade_level),
            )
            .await?;
        let (passage, vocabulary) = passage.to_domain()?;

        let questions: QuestionsPayload = self
            .complete_json(QUESTIONS_INSTRUCTIONS, format!("PASSAGE:\n{}", passage))
            .await?;
        let questions = questions.to_domain()?;

        let vocabulary_list = vocabulary
            .iter()
            .map(|v| format!("{}: {}", v.word, v.definition))
            .collect::<Vec<_>>()
            .join(", ");
        let quiz = match self
            .complete_json::<QuizPayload>(
                QUIZ_INSTRUCTIONS,
                format!("PASSAGE:\n{}\n\nVOCABULARY:\n{}", passage, vocabulary_list),
            )
            .await
        {
            Ok(payload) => payload.to_domain(),
            Err(e) => {
                warn!("Quiz generation failed, continuing without a quiz: {}", e);
                Vec::new()
            }
        };

        info!(
            words = vocabulary.len(),
            questions = questions.len(),
            quiz = quiz.len(),
            "Generated new reading content"
        );
        Ok(GeneratedContent {
            passage,
            vocabulary,
            questions,
            quiz,
        })
    }
}
