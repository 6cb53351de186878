//! services/api/src/web/tutor_task.rs
//!
//! This module contains the asynchronous "worker" function for one tutor
//! chat exchange: context injection on a fresh thread, the tool loop for
//! quiz requests, and the streamed final reply. The assistant turn is
//! persisted only after the stream has been fully drained, so a client
//! disconnect mid-stream commits nothing to history.

use crate::web::quiz_task;
use crate::web::state::AppState;
use learnpath_core::domain::{ChatTurn, ThreadKey, TurnRole};
use learnpath_core::gate::CourseIndex;
use learnpath_core::ports::{PortError, PortResult, TextChunkStream, TutorReply};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lesson content injected into the context turn is truncated to this many
/// characters.
const LESSON_CONTENT_CAP: usize = 20_000;

/// Sent verbatim by the model when the student strays off the lesson topic.
/// This is a prompt-level contract, not mechanically enforced.
const OFF_TOPIC_REFUSAL: &str =
    "Sorry, I can only help with questions about your current lesson topic.";

/// Upper bound on tool round-trips within one exchange.
const MAX_TOOL_ROUNDS: usize = 3;

/// Handles one user message on a topic's tutor thread and returns the
/// model's reply as a chunk stream.
pub async fn tutor_chat(
    app_state: Arc<AppState>,
    user_id: Uuid,
    course_id: Uuid,
    topic_id: &str,
    message: &str,
) -> PortResult<TextChunkStream> {
    let course = app_state.courses.get_course(user_id, course_id).await?;
    let index = CourseIndex::build(&course);
    let topic = index
        .topic(topic_id)
        .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

    let key = ThreadKey {
        user_id,
        course_id,
        topic_id: topic_id.to_string(),
    };

    let mut history = app_state.conversations.thread(&key).await?;

    // A fresh thread gets exactly one context turn, with the student's first
    // message folded in. Later messages are appended as plain user turns.
    let new_turn = if history.is_empty() {
        info!(topic = %topic.title, "injecting tutor context for new thread");
        ChatTurn::new(
            TurnRole::SystemContext,
            build_context(
                &course.preferences.level,
                &topic.title,
                topic.markdown_content.as_deref().unwrap_or("No content generated yet."),
                message,
            ),
        )
    } else {
        ChatTurn::new(TurnRole::User, message)
    };
    app_state.conversations.append_turn(&key, new_turn.clone()).await?;
    history.push(new_turn);

    // Tool loop: a quiz request extends the history with a tool turn and
    // re-invokes the model; anything else is the terminal streamed reply.
    for _ in 0..MAX_TOOL_ROUNDS {
        match app_state.tutor.chat(&history).await? {
            TutorReply::QuizRequested(call) => {
                info!(
                    topic = %call.topic,
                    difficulty = %call.difficulty,
                    "tutor requested quiz generation"
                );
                let tool_result = match quiz_task::ensure_quiz(
                    app_state.clone(),
                    user_id,
                    course_id,
                    topic_id,
                )
                .await
                {
                    Ok(outcome) => format!(
                        "Quiz for \"{}\" is ready with {} questions. Tell the student it is waiting in the quiz panel; do not repeat the questions here.",
                        topic.title,
                        outcome.questions.len(),
                    ),
                    Err(e) => {
                        warn!(error = %e, "quiz tool invocation failed");
                        "Quiz generation failed. Apologize briefly and suggest the student try again from the quiz panel.".to_string()
                    }
                };
                let tool_turn = ChatTurn::new(TurnRole::Tool, tool_result);
                app_state.conversations.append_turn(&key, tool_turn.clone()).await?;
                history.push(tool_turn);
            }
            TutorReply::Stream(stream) => {
                return Ok(persist_on_completion(
                    stream,
                    app_state.clone(),
                    key,
                ));
            }
        }
    }

    Err(PortError::Unexpected(
        "Tutor exceeded the tool invocation limit for a single exchange.".to_string(),
    ))
}

/// Wraps the model's chunk stream so the assistant turn is appended to the
/// thread once, after the final chunk. An upstream error or an early drop
/// ends the stream without committing anything.
fn persist_on_completion(
    mut upstream: TextChunkStream,
    app_state: Arc<AppState>,
    key: ThreadKey,
) -> TextChunkStream {
    Box::pin(async_stream::stream! {
        let mut full_reply = String::new();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(text) => {
                    full_reply.push_str(&text);
                    yield Ok(text);
                }
                Err(e) => {
                    warn!(error = %e, "tutor stream failed mid-reply; turn not persisted");
                    yield Err(e);
                    return;
                }
            }
        }
        let turn = ChatTurn::new(TurnRole::Assistant, full_reply);
        if let Err(e) = app_state.conversations.append_turn(&key, turn).await {
            warn!(error = %e, "failed to persist assistant turn");
        }
    })
}

fn build_context(level: &str, topic_title: &str, content: &str, first_message: &str) -> String {
    let content: String = content.chars().take(LESSON_CONTENT_CAP).collect();
    format!(
        r#"You are an expert AI Tutor and Senior Software Engineer.

**YOUR GOAL:** Help a {level} student understand the topic: "{topic_title}".

**CONTEXT (The Lesson Material):**
"""
{content}
"""

**INSTRUCTIONS:**
1. Answer questions primarily using the provided CONTEXT.
2. If the student is confused, explain using simple analogies and examples.
3. If the student asks for a quiz, call the 'generate_quiz' tool.
4. Keep answers concise. Do not just repeat the text; explain it in your own words.
5. Use markdown formatting for code examples and structured content.
6. If the student asks about anything outside this topic, reply with exactly this sentence and nothing else: "{refusal}"

Be helpful, patient, and educational.

The student's first message:
{first_message}"#,
        level = level,
        topic_title = topic_title,
        content = content,
        refusal = OFF_TOPIC_REFUSAL,
        first_message = first_message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_truncates_lesson_content() {
        let long = "x".repeat(30_000);
        let context = build_context("beginner", "Ownership", &long, "hi");
        // The template text plus the capped content stays well under the raw length.
        assert!(context.chars().count() < 21_000);
        assert!(context.contains("Ownership"));
        assert!(context.contains("hi"));
    }

    #[test]
    fn context_carries_refusal_sentence() {
        let context = build_context("beginner", "Ownership", "lesson", "hi");
        assert!(context.contains(OFF_TOPIC_REFUSAL));
    }
}
