//! services/api/src/adapters/planner_llm.rs
//!
//! This module contains the adapter for the research-planning LLM.
//! It implements the `ResearchPlannerService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use learnpath_core::domain::ResearchQueries;
use learnpath_core::ports::{PortError, PortResult, ResearchPlannerService};

const PLANNER_PROMPT: &str = r#"You are a Research Planner for a technical course on "{course_topic}".
Current Lesson: "{topic}"
Target Audience: {student_level}

Generate 3 specific queries to gather comprehensive info:
1. 'search': General trends and broad context.
2. 'news': Recent breakthroughs/updates.
3. 'docs_keyword': The best search term to find the OFFICIAL documentation URL.

Return ONLY a JSON object: { "search": "...", "news": "...", "docs_keyword": "..." }"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ResearchPlannerService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiPlannerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiPlannerAdapter {
    /// Creates a new `OpenAiPlannerAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Strips markdown code fences the model sometimes wraps around JSON.
fn strip_code_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

//=========================================================================================
// `ResearchPlannerService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResearchPlannerService for OpenAiPlannerAdapter {
    /// Plans the query triplet for one lesson. Unparseable model output is a
    /// `MalformedPlan` error; no retry happens here, the caller decides.
    async fn plan_queries(
        &self,
        topic_title: &str,
        course_topic: &str,
        student_level: &str,
    ) -> PortResult<ResearchQueries> {
        let prompt = PLANNER_PROMPT
            .replace("{course_topic}", course_topic)
            .replace("{topic}", topic_title)
            .replace("{student_level}", student_level);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()])
            .temperature(0.0)
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
                PortError::MalformedPlan("planner returned no text content".to_string())
            })?;

        serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| PortError::MalformedPlan(format!("{e}: {content}")))
    }
}
