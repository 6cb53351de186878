//! services/api/src/adapters/quiz_llm.rs
//!
//! This module contains the adapter for the quiz-generating LLM.
//! It implements the `QuizGenerationService` port from the `core` crate.
//! The model is constrained to JSON output and the decoded question set is
//! validated against the quiz contract before it leaves the adapter.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use learnpath_core::domain::QuizQuestion;
use learnpath_core::ports::{PortError, PortResult, QuizGenerationService};
use serde::Deserialize;

const QUIZ_SYSTEM_PROMPT: &str = r#"You generate multiple-choice quizzes for a tutoring application.

Respond with a JSON object of this exact shape:
{
  "questions": [
    {
      "question": "...",
      "options": ["...", "...", "...", "..."],
      "correct_answer": "... (exact string match to one of the options)",
      "explanation": "... (brief explanation of why this answer is correct)"
    }
  ]
}

Rules:
1. Generate between 10 and 15 questions.
2. Every question has exactly 4 options.
3. "correct_answer" must be byte-identical to one of the options."#;

const QUIZ_USER_TEMPLATE: &str = r#"Generate a customized quiz for the topic: "{topic_title}".

**TOPIC MATERIAL:**
{topic_content}

**USER'S RECENT QUESTIONS (Address their confusion):**
{chat_context}

**INSTRUCTIONS:**
1. Generate 10-15 multiple-choice questions.
2. Ensure 4 options per question.
3. Focus on key concepts and specifically target areas where the user asked questions in the chat history."#;

/// Lesson material is trimmed to this many characters before prompting.
const TOPIC_CONTENT_CAP: usize = 15_000;

#[derive(Deserialize)]
struct QuizPayload {
    questions: Vec<QuizQuestion>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QuizGenerationService` using an
/// OpenAI-compatible LLM in JSON mode.
#[derive(Clone)]
pub struct OpenAiQuizAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiQuizAdapter {
    /// Creates a new `OpenAiQuizAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Enforces the quiz contract on decoded model output: 10-15 questions,
/// exactly 4 options each, and a correct answer that matches an option.
fn validate_questions(questions: &[QuizQuestion]) -> PortResult<()> {
    if !(10..=15).contains(&questions.len()) {
        return Err(PortError::Unexpected(format!(
            "quiz must contain 10-15 questions, model produced {}",
            questions.len()
        )));
    }
    for (i, q) in questions.iter().enumerate() {
        if q.options.len() != 4 {
            return Err(PortError::Unexpected(format!(
                "question {} has {} options instead of 4",
                i,
                q.options.len()
            )));
        }
        if !q.options.contains(&q.correct_answer) {
            return Err(PortError::Unexpected(format!(
                "question {} has a correct answer that matches no option",
                i
            )));
        }
    }
    Ok(())
}

fn truncate_chars(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}

//=========================================================================================
// `QuizGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizGenerationService for OpenAiQuizAdapter {
    async fn generate_quiz(
        &self,
        topic_title: &str,
        topic_content: &str,
        chat_context: &str,
    ) -> PortResult<Vec<QuizQuestion>> {
        let chat_context = if chat_context.trim().is_empty() {
            "No prior questions asked."
        } else {
            chat_context
        };
        let user_input = QUIZ_USER_TEMPLATE
            .replace("{topic_title}", topic_title)
            .replace(
                "{topic_content}",
                &truncate_chars(topic_content, TOPIC_CONTENT_CAP),
            )
            .replace("{chat_context}", chat_context);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(QUIZ_SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_input)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?
                    .into(),
            ])
            .response_format(ResponseFormat::JsonObject)
            .temperature(0.5)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Quiz LLM response contained no text content.".to_string())
            })?;

        let payload: QuizPayload = serde_json::from_str(&content)
            .map_err(|e| PortError::Unexpected(format!("quiz output was not valid JSON: {e}")))?;

        validate_questions(&payload.questions)?;
        Ok(payload.questions)
    }
}
