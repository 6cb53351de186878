//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `CourseStore` and `ConversationStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`. The course
//! roadmap lives in a JSONB column; every targeted mutation re-reads it inside a
//! transaction (`FOR UPDATE`) so a stale in-memory copy is never written back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnpath_core::domain::{
    ChatTurn, Course, CourseStatus, Preferences, Progress, QuizQuestion, QuizStatus, Roadmap,
    ThreadKey, TurnRole,
};
use learnpath_core::ports::{
    ConversationStore, CourseStore, PortError, PortResult, StoredLesson,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `CourseStore` and
/// `ConversationStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    user_id: Uuid,
    topic: String,
    status: String,
    preferences: serde_json::Value,
    roadmap: serde_json::Value,
    progress: serde_json::Value,
}

impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        Ok(Course {
            id: self.id,
            user_id: self.user_id,
            topic: self.topic,
            status: status_from_str(&self.status)?,
            preferences: serde_json::from_value(self.preferences)
                .map_err(|e| PortError::Unexpected(format!("corrupt preferences column: {e}")))?,
            roadmap: serde_json::from_value(self.roadmap)
                .map_err(|e| PortError::Unexpected(format!("corrupt roadmap column: {e}")))?,
            progress: serde_json::from_value(self.progress)
                .map_err(|e| PortError::Unexpected(format!("corrupt progress column: {e}")))?,
        })
    }
}

#[derive(FromRow)]
struct TurnRecord {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TurnRecord {
    fn to_domain(self) -> PortResult<ChatTurn> {
        Ok(ChatTurn {
            role: role_from_str(&self.role)?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

fn status_to_str(status: CourseStatus) -> &'static str {
    match status {
        CourseStatus::Generating => "generating",
        CourseStatus::Active => "active",
        CourseStatus::Completed => "completed",
        CourseStatus::Archived => "archived",
    }
}

fn status_from_str(s: &str) -> PortResult<CourseStatus> {
    match s {
        "generating" => Ok(CourseStatus::Generating),
        "active" => Ok(CourseStatus::Active),
        "completed" => Ok(CourseStatus::Completed),
        "archived" => Ok(CourseStatus::Archived),
        other => Err(PortError::Unexpected(format!(
            "unknown course status '{other}' in database"
        ))),
    }
}

fn role_to_str(role: TurnRole) -> &'static str {
    match role {
        TurnRole::SystemContext => "system_context",
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
        TurnRole::Tool => "tool",
    }
}

fn role_from_str(s: &str) -> PortResult<TurnRole> {
    match s {
        "system_context" => Ok(TurnRole::SystemContext),
        "user" => Ok(TurnRole::User),
        "assistant" => Ok(TurnRole::Assistant),
        "tool" => Ok(TurnRole::Tool),
        other => Err(PortError::Unexpected(format!(
            "unknown turn role '{other}' in database"
        ))),
    }
}

//=========================================================================================
// Transactional Roadmap Read-Modify-Write Helpers
//=========================================================================================

impl DbAdapter {
    /// Fetches the current roadmap document under a row lock, so the
    /// subsequent write targets the freshest persisted version.
    async fn roadmap_for_update(
        tx: &mut Transaction<'_, Postgres>,
        course_id: Uuid,
    ) -> PortResult<Roadmap> {
        let value: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT roadmap FROM courses WHERE id = $1 FOR UPDATE")
                .bind(course_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let (roadmap,) = value
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;
        serde_json::from_value(roadmap)
            .map_err(|e| PortError::Unexpected(format!("corrupt roadmap column: {e}")))
    }

    async fn write_roadmap(
        tx: &mut Transaction<'_, Postgres>,
        course_id: Uuid,
        roadmap: &Roadmap,
    ) -> PortResult<()> {
        let value = serde_json::to_value(roadmap)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query("UPDATE courses SET roadmap = $1, updated_at = now() WHERE id = $2")
            .bind(value)
            .bind(course_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

fn find_topic_mut<'a>(roadmap: &'a mut Roadmap, topic_id: &str) -> Option<&'a mut learnpath_core::domain::Topic> {
    roadmap
        .syllabus
        .iter_mut()
        .flat_map(|week| week.topics.iter_mut())
        .find(|t| t.id == topic_id)
}

//=========================================================================================
// `CourseStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseStore for DbAdapter {
    async fn create_course(
        &self,
        user_id: Uuid,
        topic: &str,
        preferences: Preferences,
        roadmap: Roadmap,
    ) -> PortResult<Course> {
        let id = Uuid::new_v4();
        let progress = Progress::default();
        sqlx::query(
            "INSERT INTO courses (id, user_id, topic, status, preferences, roadmap, progress) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(topic)
        .bind(status_to_str(CourseStatus::Generating))
        .bind(serde_json::to_value(&preferences).map_err(|e| PortError::Unexpected(e.to_string()))?)
        .bind(serde_json::to_value(&roadmap).map_err(|e| PortError::Unexpected(e.to_string()))?)
        .bind(serde_json::to_value(&progress).map_err(|e| PortError::Unexpected(e.to_string()))?)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(Course {
            id,
            user_id,
            topic: topic.to_string(),
            status: CourseStatus::Generating,
            preferences,
            roadmap,
            progress,
        })
    }

    async fn get_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Course> {
        let record: Option<CourseRecord> = sqlx::query_as(
            "SELECT id, user_id, topic, status, preferences, roadmap, progress \
             FROM courses WHERE id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?
            .to_domain()
    }

    async fn list_courses(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let records: Vec<CourseRecord> = sqlx::query_as(
            "SELECT id, user_id, topic, status, preferences, roadmap, progress \
             FROM courses WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn store_lesson_content(
        &self,
        course_id: Uuid,
        topic_id: &str,
        content: &str,
    ) -> PortResult<StoredLesson> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut roadmap = Self::roadmap_for_update(&mut tx, course_id).await?;
        let topic = find_topic_mut(&mut roadmap, topic_id)
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

        // Content is written at most once. A concurrent invocation that
        // already persisted wins; this caller serves the existing text.
        if let Some(existing) = &topic.markdown_content {
            let existing = existing.clone();
            tx.rollback()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            return Ok(StoredLesson {
                content: existing,
                wrote: false,
            });
        }

        topic.markdown_content = Some(content.to_string());
        Self::write_roadmap(&mut tx, course_id, &roadmap).await?;
        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(StoredLesson {
            content: content.to_string(),
            wrote: true,
        })
    }

    async fn store_quiz(
        &self,
        course_id: Uuid,
        topic_id: &str,
        questions: &[QuizQuestion],
    ) -> PortResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut roadmap = Self::roadmap_for_update(&mut tx, course_id).await?;
        let topic = find_topic_mut(&mut roadmap, topic_id)
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

        topic.quiz = questions.to_vec();
        topic.quiz_status = QuizStatus::Generated;

        Self::write_roadmap(&mut tx, course_id, &roadmap).await?;
        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn store_quiz_result(
        &self,
        course_id: Uuid,
        topic_id: &str,
        score: u8,
        status: QuizStatus,
        is_completed: bool,
    ) -> PortResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut roadmap = Self::roadmap_for_update(&mut tx, course_id).await?;
        let topic = find_topic_mut(&mut roadmap, topic_id)
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

        topic.quiz_score = score;
        topic.quiz_status = status;
        topic.is_completed = is_completed;

        Self::write_roadmap(&mut tx, course_id, &roadmap).await?;
        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn store_progress(
        &self,
        course_id: Uuid,
        progress: &Progress,
        status: CourseStatus,
    ) -> PortResult<()> {
        let value = serde_json::to_value(progress)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE courses SET progress = $1, status = $2, updated_at = now() WHERE id = $3",
        )
        .bind(value)
        .bind(status_to_str(status))
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Course {} not found",
                course_id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for DbAdapter {
    async fn thread(&self, key: &ThreadKey) -> PortResult<Vec<ChatTurn>> {
        let records: Vec<TurnRecord> = sqlx::query_as(
            "SELECT role, content, created_at FROM chat_turns \
             WHERE user_id = $1 AND course_id = $2 AND topic_id = $3 ORDER BY seq ASC",
        )
        .bind(key.user_id)
        .bind(key.course_id)
        .bind(&key.topic_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn append_turn(&self, key: &ThreadKey, turn: ChatTurn) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_turns (user_id, course_id, topic_id, role, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(key.user_id)
        .bind(key.course_id)
        .bind(&key.topic_id)
        .bind(role_to_str(turn.role))
        .bind(&turn.content)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
