//! services/api/src/adapters/roadmap_llm.rs
//!
//! This module contains the adapter for the roadmap-generating LLM used at
//! course creation. It implements the `RoadmapService` port from the `core`
//! crate. Week numbers and topic ids (`w{week}-t{n}`) are derived from the
//! syllabus position, never taken from the model, so ids stay unique even
//! when the model misnumbers its weeks.

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
use learnpath_core::domain::{
    LessonType, Preferences, ProjectScope, QuizStatus, Roadmap, Topic, WeekGroup,
};
use learnpath_core::ports::{PortError, PortResult, RoadmapService};
use serde::Deserialize;

const ROADMAP_SYSTEM_PROMPT: &str = r#"You design week-by-week learning roadmaps for a tutoring application.

Respond with a JSON object of this exact shape:
{
  "syllabus": [
    {
      "week_number": 1,
      "title": "...",
      "topics": [
        { "title": "...", "type": "theory" | "practical" | "project", "estimated_minutes": 15 }
      ]
    }
  ]
}

Rules:
1. Produce exactly the requested number of weeks.
2. 2-4 topics per week, ordered from fundamentals to advanced material.
3. Mix theory and practical topics; reserve "project" topics for the later weeks.
4. "estimated_minutes" is the study time for one sitting, between 10 and 60."#;

#[derive(Deserialize)]
struct RoadmapPayload {
    syllabus: Vec<WeekPayload>,
}

#[derive(Deserialize)]
struct WeekPayload {
    title: String,
    topics: Vec<TopicPayload>,
}

#[derive(Deserialize)]
struct TopicPayload {
    title: String,
    #[serde(rename = "type")]
    lesson_type: LessonType,
    #[serde(default = "default_minutes")]
    estimated_minutes: u32,
}

fn default_minutes() -> u32 {
    15
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `RoadmapService` using an OpenAI-compatible
/// LLM in JSON mode.
#[derive(Clone)]
pub struct OpenAiRoadmapAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiRoadmapAdapter {
    /// Creates a new `OpenAiRoadmapAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn scope_label(scope: ProjectScope) -> &'static str {
    match scope {
        ProjectScope::Small => "small",
        ProjectScope::Capstone => "capstone",
        ProjectScope::RealWorld => "real-world",
    }
}

fn into_roadmap(payload: RoadmapPayload) -> Roadmap {
    let syllabus: Vec<WeekGroup> = payload
        .syllabus
        .into_iter()
        .enumerate()
        .map(|(wi, week)| {
            let week_number = (wi + 1) as u32;
            let topics = week
                .topics
                .into_iter()
                .enumerate()
                .map(|(i, t)| Topic {
                    id: format!("w{}-t{}", week_number, i + 1),
                    title: t.title,
                    lesson_type: t.lesson_type,
                    estimated_minutes: t.estimated_minutes,
                    markdown_content: None,
                    is_completed: false,
                    quiz_status: QuizStatus::Pending,
                    quiz: Vec::new(),
                    quiz_score: 0,
                })
                .collect();
            WeekGroup {
                week_number,
                title: week.title,
                topics,
            }
        })
        .collect();

    Roadmap {
        total_weeks: syllabus.len() as u32,
        syllabus,
    }
}

//=========================================================================================
// `RoadmapService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RoadmapService for OpenAiRoadmapAdapter {
    async fn generate_roadmap(
        &self,
        topic: &str,
        preferences: &Preferences,
    ) -> PortResult<Roadmap> {
        let user_input = format!(
            "Course topic: \"{}\"\nStudent level: {}\nDuration: {} weeks\nGoals: {}\nProject scope: {}",
            topic,
            preferences.level,
            preferences.total_duration_weeks,
            preferences.goals,
            scope_label(preferences.project_scope),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(ROADMAP_SYSTEM_PROMPT)
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
            .temperature(0.4)
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
                PortError::Unexpected("Roadmap LLM response contained no text content.".to_string())
            })?;

        let payload: RoadmapPayload = serde_json::from_str(&content).map_err(|e| {
            PortError::Unexpected(format!("roadmap output was not valid JSON: {e}"))
        })?;

        if payload.syllabus.is_empty() {
            return Err(PortError::Unexpected(
                "roadmap output contained no weeks".to_string(),
            ));
        }

        Ok(into_roadmap(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(title: &str, topics: Vec<TopicPayload>) -> WeekPayload {
        WeekPayload {
            title: title.to_string(),
            topics,
        }
    }

    fn topic(title: &str, lesson_type: LessonType, minutes: u32) -> TopicPayload {
        TopicPayload {
            title: title.to_string(),
            lesson_type,
            estimated_minutes: minutes,
        }
    }

    #[test]
    fn assigns_topic_ids_per_week() {
        let payload = RoadmapPayload {
            syllabus: vec![
                week(
                    "Basics",
                    vec![
                        topic("Intro", LessonType::Theory, 15),
                        topic("Setup", LessonType::Practical, 20),
                    ],
                ),
                week("Deeper", vec![topic("Project", LessonType::Project, 45)]),
            ],
        };
        let roadmap = into_roadmap(payload);
        assert_eq!(roadmap.total_weeks, 2);
        assert_eq!(roadmap.syllabus[0].topics[0].id, "w1-t1");
        assert_eq!(roadmap.syllabus[0].topics[1].id, "w1-t2");
        assert_eq!(roadmap.syllabus[1].topics[0].id, "w2-t1");
        assert_eq!(roadmap.syllabus[1].topics[0].quiz_status, QuizStatus::Pending);
    }

    #[test]
    fn week_numbering_follows_position_and_ids_stay_unique() {
        // Model-supplied week numbering is ignored entirely, so a syllabus
        // with repeated or out-of-order numbering still gets unique ids.
        let payload = RoadmapPayload {
            syllabus: vec![
                week("First", vec![topic("A", LessonType::Theory, 15)]),
                week("Also claims to be first", vec![topic("B", LessonType::Theory, 15)]),
            ],
        };
        let roadmap = into_roadmap(payload);
        assert_eq!(roadmap.syllabus[0].week_number, 1);
        assert_eq!(roadmap.syllabus[1].week_number, 2);
        let ids: Vec<_> = roadmap
            .syllabus
            .iter()
            .flat_map(|w| w.topics.iter().map(|t| t.id.clone()))
            .collect();
        assert_eq!(ids, vec!["w1-t1".to_string(), "w2-t1".to_string()]);
    }
}
