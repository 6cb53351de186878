//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use learnpath_core::ports::{
    ConversationStore, CourseStore, LessonWriterService, QuizGenerationService,
    ResearchPlannerService, ResearchService, RoadmapService, TutorService,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Key for the per-topic generation locks.
pub type TopicLockKey = (Uuid, String);

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub courses: Arc<dyn CourseStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub planner: Arc<dyn ResearchPlannerService>,
    pub research: Arc<dyn ResearchService>,
    pub writer: Arc<dyn LessonWriterService>,
    pub quiz: Arc<dyn QuizGenerationService>,
    pub tutor: Arc<dyn TutorService>,
    pub roadmap: Arc<dyn RoadmapService>,
    /// One async lock per (course, topic) so concurrent generation requests
    /// for the same unit coalesce onto a single pipeline run.
    pub topic_locks: Arc<Mutex<HashMap<TopicLockKey, Arc<Mutex<()>>>>>,
}

impl AppState {
    /// Returns the lock guarding content generation for one topic, creating
    /// it on first use. The outer map lock is held only for the lookup.
    pub async fn topic_lock(&self, course_id: Uuid, topic_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.topic_locks.lock().await;
        locks
            .entry((course_id, topic_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops a topic's lock entry. Called once content is persisted: the
    /// cached short-circuit handles every later request, so the entry would
    /// otherwise sit in the map for the process lifetime. Waiters that still
    /// hold a clone of the lock are unaffected.
    pub async fn release_topic_lock(&self, course_id: Uuid, topic_id: &str) {
        self.topic_locks
            .lock()
            .await
            .remove(&(course_id, topic_id.to_string()));
    }
}
