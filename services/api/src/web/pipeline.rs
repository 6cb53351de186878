//! services/api/src/web/pipeline.rs
//!
//! The lesson-generation pipeline: Planning -> Researching -> Writing, with
//! a Cached short-circuit and the linear-unlock gate in front. The target
//! topic is mutated once, atomically, only after the Writer succeeds; a
//! failed invocation persists nothing and a retry restarts from Planning.

use crate::web::state::AppState;
use learnpath_core::domain::{PipelineState, ResearchQueries};
use learnpath_core::gate::{AccessDecision, CourseIndex};
use learnpath_core::ports::{PortError, PortResult, ResearchService};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Placeholder used when the documentation leg of research yields nothing.
const NO_DOCS_PLACEHOLDER: &str = "No deep documentation found.";

/// Documentation content is truncated to this many characters before it is
/// merged into the research context.
const DOCS_CHAR_CAP: usize = 15_000;

/// Outcome of one generate-lesson invocation. Locked is a normal result the
/// caller turns into an actionable message, not a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated { content: String },
    Cached { content: String },
    Locked { blocking_title: String },
}

/// Runs the pipeline for one (course, topic) pair.
///
/// Concurrency: a per-topic async lock serializes in-process invocations and
/// the cache is re-checked under the lock, so two racing requests observe a
/// single completion-service call and identical content. The store-level
/// conditional write catches racers from other processes.
pub async fn generate_lesson(
    app_state: Arc<AppState>,
    user_id: Uuid,
    course_id: Uuid,
    topic_id: &str,
) -> PortResult<GenerationOutcome> {
    let course = app_state.courses.get_course(user_id, course_id).await?;
    let index = CourseIndex::build(&course);

    let topic = index
        .topic(topic_id)
        .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;

    // Cost saver: existing content is returned immediately, never regenerated.
    if let Some(content) = &topic.markdown_content {
        return Ok(GenerationOutcome::Cached {
            content: content.clone(),
        });
    }

    match index.check_access(topic_id) {
        AccessDecision::Granted => {}
        AccessDecision::Locked { blocking_title } => {
            return Ok(GenerationOutcome::Locked { blocking_title });
        }
        AccessDecision::NotFound => {
            return Err(PortError::NotFound(format!("Topic {} not found", topic_id)));
        }
    }

    let mut state = PipelineState::new(
        topic.title.clone(),
        course.topic.clone(),
        course.preferences.level.clone(),
        topic.lesson_type,
        topic.estimated_minutes,
    );

    let lock = app_state.topic_lock(course_id, topic_id).await;
    let _guard = lock.lock().await;

    // Re-check under the lock: a concurrent invocation may have finished
    // while this one was waiting.
    let fresh = app_state.courses.get_course(user_id, course_id).await?;
    let fresh_index = CourseIndex::build(&fresh);
    if let Some(content) = fresh_index
        .topic(topic_id)
        .and_then(|t| t.markdown_content.clone())
    {
        return Ok(GenerationOutcome::Cached { content });
    }

    let start = Instant::now();
    info!(topic = %state.topic_title, "lesson pipeline: planning");
    let queries = app_state
        .planner
        .plan_queries(&state.topic_title, &state.course_topic, &state.student_level)
        .await?;
    state.queries = Some(queries.clone());

    info!(topic = %state.topic_title, "lesson pipeline: researching");
    state.research_context = Some(run_research(app_state.research.as_ref(), &queries).await);

    info!(topic = %state.topic_title, "lesson pipeline: writing");
    let lesson = app_state.writer.write_lesson(&state).await?;
    state.final_lesson = Some(lesson.clone());

    // Single atomic mutation of the topic, only after the writer succeeded.
    let stored = app_state
        .courses
        .store_lesson_content(course_id, topic_id, &lesson)
        .await?;
    // Content now exists, so the lock entry has no further use.
    app_state.release_topic_lock(course_id, topic_id).await;
    info!(
        topic = %state.topic_title,
        elapsed = ?start.elapsed(),
        wrote = stored.wrote,
        "lesson pipeline: complete"
    );

    if stored.wrote {
        Ok(GenerationOutcome::Generated {
            content: stored.content,
        })
    } else {
        // Another invocation persisted first; its content is served.
        Ok(GenerationOutcome::Cached {
            content: stored.content,
        })
    }
}

//=========================================================================================
// Researcher Stage
//=========================================================================================

/// Executes the three research calls concurrently. A fault in one leg does
/// not cancel the others; each degrades independently to a placeholder so
/// the pipeline still produces a usable, if thinner, context.
async fn run_research(research: &dyn ResearchService, queries: &ResearchQueries) -> String {
    let (general, news, docs_hits) = tokio::join!(
        research.search(&queries.search),
        research.news_search(&queries.news),
        research.search(&queries.docs_keyword),
    );

    let general_section = match general {
        Ok(hits) => hits
            .iter()
            .map(|h| format!("- {} ({}): {}", h.title, h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            warn!(error = %e, "general search degraded");
            format!("Search failed: {e}")
        }
    };

    let news_section = match news {
        Ok(articles) => articles
            .iter()
            .map(|n| format!("- [{}] {} ({}): {}", n.date, n.title, n.source, n.description))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            warn!(error = %e, "news search degraded");
            format!("News search failed: {e}")
        }
    };

    // Best documentation hit gets one extra full-content fetch.
    let docs_section = match docs_hits {
        Ok(hits) => match hits.first() {
            Some(best) => {
                info!(url = %best.url, "fetching documentation content");
                match research.fetch_content(&best.url).await {
                    Ok(content) => truncate_chars(&content, DOCS_CHAR_CAP),
                    Err(e) => {
                        warn!(error = %e, url = %best.url, "documentation fetch degraded");
                        NO_DOCS_PLACEHOLDER.to_string()
                    }
                }
            }
            None => NO_DOCS_PLACEHOLDER.to_string(),
        },
        Err(e) => {
            warn!(error = %e, "documentation search degraded");
            NO_DOCS_PLACEHOLDER.to_string()
        }
    };

    merge_research(&general_section, &news_section, &docs_section)
}

fn merge_research(general: &str, news: &str, docs: &str) -> String {
    format!(
        "=== GENERAL TRENDS & CONTEXT ===\n{general}\n\n\
         === LATEST NEWS & BREAKTHROUGHS ===\n{news}\n\n\
         === DEEP DIVE (OFFICIAL DOCS CONTENT) ===\n{docs}"
    )
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() > cap {
        text.chars().take(cap).collect()
    } else {
        text.to_string()
    }
}
