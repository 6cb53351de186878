//! crates/learnpath_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    ChatTurn, Course, CourseStatus, NewsHit, PipelineState, Preferences, Progress, QuizQuestion,
    QuizStatus, ResearchQueries, Roadmap, SearchHit, ThreadKey,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The planner returned content that could not be decoded into the
    /// expected query triplet. Fatal to the pipeline invocation; the port
    /// performs no retry of its own.
    #[error("Planner output was not parseable: {0}")]
    MalformedPlan(String),
    /// Grading was attempted before a quiz was generated.
    #[error("Quiz not ready: {0}")]
    QuizNotReady(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A lazy, finite, non-restartable sequence of text chunks.
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String, PortError>> + Send>>;

//=========================================================================================
// Persistence Ports
//=========================================================================================

/// Course persistence. Every targeted write re-reads the current persisted
/// roadmap before mutating it, so concurrent updates to sibling fields are
/// never clobbered by a stale in-memory copy.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn create_course(
        &self,
        user_id: Uuid,
        topic: &str,
        preferences: Preferences,
        roadmap: Roadmap,
    ) -> PortResult<Course>;

    async fn get_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Course>;

    async fn list_courses(&self, user_id: Uuid) -> PortResult<Vec<Course>>;

    /// Writes generated lesson content for a topic, but only if the topic
    /// does not already hold content. Returns the content now persisted and
    /// whether this call was the one that wrote it. A caller that lost the
    /// race discards its own result and serves the winner's.
    async fn store_lesson_content(
        &self,
        course_id: Uuid,
        topic_id: &str,
        content: &str,
    ) -> PortResult<StoredLesson>;

    /// Replaces a topic's question set and marks its quiz `Generated`.
    async fn store_quiz(
        &self,
        course_id: Uuid,
        topic_id: &str,
        questions: &[QuizQuestion],
    ) -> PortResult<()>;

    /// Records a grading outcome on a topic: score, quiz status, and the
    /// completion flag tied to it.
    async fn store_quiz_result(
        &self,
        course_id: Uuid,
        topic_id: &str,
        score: u8,
        status: QuizStatus,
        is_completed: bool,
    ) -> PortResult<()>;

    /// Overwrites the derived progress snapshot and course status.
    async fn store_progress(
        &self,
        course_id: Uuid,
        progress: &Progress,
        status: CourseStatus,
    ) -> PortResult<()>;
}

/// Outcome of a conditional lesson-content write.
#[derive(Debug, Clone)]
pub struct StoredLesson {
    pub content: String,
    /// True when this call performed the write; false when another
    /// invocation had already persisted content for the topic.
    pub wrote: bool,
}

/// Conversation checkpoint store, keyed by (user, course, topic).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the full ordered turn log for a thread. An unknown thread is
    /// an empty log, not an error.
    async fn thread(&self, key: &ThreadKey) -> PortResult<Vec<ChatTurn>>;

    async fn append_turn(&self, key: &ThreadKey, turn: ChatTurn) -> PortResult<()>;
}

//=========================================================================================
// LLM Task Ports
//=========================================================================================

/// Plans the three research queries for a lesson.
#[async_trait]
pub trait ResearchPlannerService: Send + Sync {
    /// Fails with `PortError::MalformedPlan` if the completion service
    /// returns non-parseable content. The caller decides whether to retry.
    async fn plan_queries(
        &self,
        topic_title: &str,
        course_topic: &str,
        student_level: &str,
    ) -> PortResult<ResearchQueries>;
}

/// Web search, news search, and full-content fetch.
#[async_trait]
pub trait ResearchService: Send + Sync {
    async fn search(&self, query: &str) -> PortResult<Vec<SearchHit>>;

    async fn news_search(&self, query: &str) -> PortResult<Vec<NewsHit>>;

    /// Fetches the readable content of a page, capped at a fixed size.
    async fn fetch_content(&self, url: &str) -> PortResult<String>;
}

/// Synthesizes the final lesson document from the full pipeline state.
#[async_trait]
pub trait LessonWriterService: Send + Sync {
    async fn write_lesson(&self, state: &PipelineState) -> PortResult<String>;
}

/// Generates a multiple-choice quiz for a topic.
#[async_trait]
pub trait QuizGenerationService: Send + Sync {
    /// `chat_context` carries the learner's recent tutor exchanges so the
    /// quiz can target their confusion areas; empty when no history exists.
    async fn generate_quiz(
        &self,
        topic_title: &str,
        topic_content: &str,
        chat_context: &str,
    ) -> PortResult<Vec<QuizQuestion>>;
}

/// Arguments the model supplies when it requests a quiz mid-conversation.
#[derive(Debug, Clone)]
pub struct QuizToolCall {
    pub topic: String,
    pub difficulty: String,
    pub num_questions: u32,
}

/// One model response in the tutor loop: either a request to invoke the
/// quiz tool, or the final reply as a token stream.
pub enum TutorReply {
    QuizRequested(QuizToolCall),
    Stream(TextChunkStream),
}

/// The conversational tutor model, with the quiz-generation tool bound.
#[async_trait]
pub trait TutorService: Send + Sync {
    /// Replays the full thread history and returns the model's next move.
    async fn chat(&self, history: &[ChatTurn]) -> PortResult<TutorReply>;
}

/// Generates the structured course roadmap at creation time.
#[async_trait]
pub trait RoadmapService: Send + Sync {
    async fn generate_roadmap(&self, topic: &str, preferences: &Preferences)
        -> PortResult<Roadmap>;
}
