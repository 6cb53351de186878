//! services/api/src/web/quiz_task.rs
//!
//! Quiz lifecycle orchestration: fetch-or-create generation and grading.
//! Grading itself is pure (`gate::grade_quiz`); this module does the fresh
//! reads, the targeted writes, and the full progress recompute that follows
//! every grading event.

use crate::web::state::AppState;
use learnpath_core::domain::{QuizQuestion, QuizStatus, ThreadKey, TurnRole};
use learnpath_core::gate::{grade_quiz, CourseIndex, QuizReport};
use learnpath_core::ports::{PortError, PortResult};
use learnpath_core::progress;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// How many recent conversation turns are passed to the quiz generator as a
/// signal of the learner's confusion areas.
const CHAT_CONTEXT_TURNS: usize = 10;

/// Result of a fetch-or-create quiz request.
pub struct QuizOutcome {
    pub questions: Vec<QuizQuestion>,
    /// False when an existing `generated` or `passed` set was returned.
    pub freshly_generated: bool,
}

/// Returns the topic's quiz, generating one if none is active. An existing
/// quiz in `generated` or `passed` status is returned as-is; `pending` and
/// `failed` topics get a fresh question set, so a learner who failed is not
/// stuck retaking identical questions.
pub async fn ensure_quiz(
    app_state: Arc<AppState>,
    user_id: Uuid,
    course_id: Uuid,
    topic_id: &str,
) -> PortResult<QuizOutcome> {
    let course = app_state.courses.get_course(user_id, course_id).await?;
    let index = CourseIndex::build(&course);
    let topic = index
        .topic(topic_id)
        .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

    if matches!(topic.quiz_status, QuizStatus::Generated | QuizStatus::Passed)
        && !topic.quiz.is_empty()
    {
        return Ok(QuizOutcome {
            questions: topic.quiz.clone(),
            freshly_generated: false,
        });
    }

    let content = topic.markdown_content.as_deref().ok_or_else(|| {
        PortError::QuizNotReady(
            "Lesson content must be generated before a quiz can be created.".to_string(),
        )
    })?;

    let chat_context = recent_chat_context(&app_state, user_id, course_id, topic_id).await?;

    info!(topic = %topic.title, "generating quiz");
    let questions = app_state
        .quiz
        .generate_quiz(&topic.title, content, &chat_context)
        .await?;

    app_state
        .courses
        .store_quiz(course_id, topic_id, &questions)
        .await?;

    Ok(QuizOutcome {
        questions,
        freshly_generated: true,
    })
}

/// Grades a submission against the stored question set, records the outcome
/// on the topic, and recomputes the course-wide progress snapshot.
pub async fn submit_quiz(
    app_state: Arc<AppState>,
    user_id: Uuid,
    course_id: Uuid,
    topic_id: &str,
    answers: &[String],
) -> PortResult<QuizReport> {
    // Fresh read right before the targeted write.
    let course = app_state.courses.get_course(user_id, course_id).await?;
    let index = CourseIndex::build(&course);
    let topic = index
        .topic(topic_id)
        .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

    if topic.quiz.is_empty() {
        return Err(PortError::QuizNotReady(
            "No quiz has been generated for this topic yet.".to_string(),
        ));
    }

    let report = grade_quiz(&topic.quiz, answers);
    let (status, is_completed) = if report.passed {
        (QuizStatus::Passed, true)
    } else {
        (QuizStatus::Failed, false)
    };
    info!(
        topic = %topic.title,
        score = report.score,
        passed = report.passed,
        "quiz graded"
    );

    app_state
        .courses
        .store_quiz_result(course_id, topic_id, report.score, status, is_completed)
        .await?;

    // Progress is always recomputed from the full unit set, never patched.
    let updated = app_state.courses.get_course(user_id, course_id).await?;
    let recomputed = progress::recompute(&updated);
    app_state
        .courses
        .store_progress(course_id, &recomputed.progress, recomputed.status)
        .await?;

    Ok(report)
}

/// Collects the last few turns of the topic's tutor thread, formatted for
/// the quiz generator. The context turn is skipped; it is lesson material,
/// not a confusion signal.
async fn recent_chat_context(
    app_state: &AppState,
    user_id: Uuid,
    course_id: Uuid,
    topic_id: &str,
) -> PortResult<String> {
    let key = ThreadKey {
        user_id,
        course_id,
        topic_id: topic_id.to_string(),
    };
    let thread = app_state.conversations.thread(&key).await?;
    let lines: Vec<String> = thread
        .iter()
        .filter(|turn| !matches!(turn.role, TurnRole::SystemContext))
        .rev()
        .take(CHAT_CONTEXT_TURNS)
        .map(|turn| {
            let label = match turn.role {
                TurnRole::User => "Student",
                TurnRole::Assistant => "Tutor",
                TurnRole::Tool => "Tool",
                TurnRole::SystemContext => "Context",
            };
            format!("{}: {}", label, turn.content)
        })
        .collect();
    Ok(lines.into_iter().rev().collect::<Vec<_>>().join("\n"))
}
