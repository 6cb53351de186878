//! crates/learnpath_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database backend; the serde derives
//! exist only so the roadmap and conversation turns can round-trip through
//! the document columns that store them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pedagogical flavor of a topic. Drives the shape of generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Theory,
    Practical,
    Project,
}

/// Lifecycle of a topic's quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Pending,
    Generated,
    Passed,
    Failed,
}

/// Lifecycle of a whole course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Generating,
    Active,
    Completed,
    Archived,
}

/// One multiple-choice question. `correct_answer` is an exact string match
/// of one of the four options. Never handed to clients as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// The smallest schedulable lesson item within a course.
///
/// Invariant: `is_completed` holds exactly when `quiz_status == Passed`.
/// `markdown_content` is written at most once and is immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub estimated_minutes: u32,
    pub markdown_content: Option<String>,
    pub is_completed: bool,
    pub quiz_status: QuizStatus,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
    pub quiz_score: u8,
}

/// One syllabus week: an ordered container of topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekGroup {
    pub week_number: u32,
    pub title: String,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub total_weeks: u32,
    pub syllabus: Vec<WeekGroup>,
}

/// Scope of the hands-on project work the learner asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectScope {
    Small,
    Capstone,
    RealWorld,
}

/// Generation preferences captured at course creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub level: String,
    pub total_duration_weeks: u32,
    pub goals: String,
    pub project_scope: ProjectScope,
}

/// Derived progress snapshot. Always recomputed from the full unit set
/// (see `progress::recompute`), never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub percent_complete: u8,
    pub current_week: u32,
    pub completed_topic_ids: Vec<String>,
    pub total_study_minutes: u32,
    pub last_study_session: Option<DateTime<Utc>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            percent_complete: 0,
            current_week: 1,
            completed_topic_ids: Vec::new(),
            total_study_minutes: 0,
            last_study_session: None,
        }
    }
}

/// A learning path owned by one user.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    pub status: CourseStatus,
    pub preferences: Preferences,
    pub roadmap: Roadmap,
    pub progress: Progress,
}

//=========================================================================================
// Conversation Threads
//=========================================================================================

/// Identifies one tutor conversation: one thread per (user, course, topic).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The one-time injected context message. At most one per thread.
    SystemContext,
    User,
    Assistant,
    /// Output of a tool the model asked for (quiz generation).
    Tool,
}

/// A single persisted turn in a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

//=========================================================================================
// Lesson-Generation Pipeline State
//=========================================================================================

/// The three planned research queries for one lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchQueries {
    /// General trends and broad context.
    pub search: String,
    /// Recent breakthroughs and updates.
    pub news: String,
    /// Best search term to locate the official documentation URL.
    pub docs_keyword: String,
}

/// Ephemeral working data threaded through the generation pipeline.
/// Created at invocation, discarded once the lesson is persisted.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub topic_title: String,
    pub course_topic: String,
    pub student_level: String,
    pub lesson_type: LessonType,
    pub estimated_minutes: u32,
    pub queries: Option<ResearchQueries>,
    pub research_context: Option<String>,
    pub final_lesson: Option<String>,
}

impl PipelineState {
    pub fn new(
        topic_title: impl Into<String>,
        course_topic: impl Into<String>,
        student_level: impl Into<String>,
        lesson_type: LessonType,
        estimated_minutes: u32,
    ) -> Self {
        Self {
            topic_title: topic_title.into(),
            course_topic: course_topic.into(),
            student_level: student_level.into(),
            lesson_type,
            estimated_minutes,
            queries: None,
            research_context: None,
            final_lesson: None,
        }
    }
}

//=========================================================================================
// Search Results
//=========================================================================================

/// One general web search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// One news search hit (separate index from general search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsHit {
    pub title: String,
    pub description: String,
    pub url: String,
    pub date: String,
    pub source: String,
}
