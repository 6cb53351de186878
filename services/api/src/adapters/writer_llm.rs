//! services/api/src/adapters/writer_llm.rs
//!
//! This module contains the adapter for the lesson-writing LLM.
//! It implements the `LessonWriterService` port from the `core` crate.
//!
//! The section contract below is a prompt-level structural requirement, not
//! mechanically validated: consumers must tolerate minor structural drift
//! and assume nothing beyond "valid markdown".

const WRITER_SYSTEM_TEMPLATE: &str = r#"You are an expert educator and senior software engineer specializing in creating world-class learning content. Your mission is to craft study material that is clear, engaging, professionally structured, and optimized for deep understanding.

## Context
- **Course Topic**: {course_topic}
- **Student Level**: {student_level}
- **Current Lesson**: {topic}
- **Estimated Time**: {estimated_minutes} minutes
- **Lesson Type**: {lesson_type}

## RESEARCH DATA (CRITICAL)
You have just performed real-time research. You MUST incorporate the following information into the "Concept Overview" and "Core Concepts" sections where relevant. Do not ignore this.

{research_context}

## Content Structure Requirements

Your response MUST follow this exact structure in clean, minimal Markdown:

### 1. **Learning Objectives** (2-3 bullet points)
- What the student will be able to do after this lesson
- Keep focused and measurable

### 2. **Concept Overview & Industry Trends** (2-3 paragraphs)
- Start with the "why" - why does this concept matter?
- **INTEGRATE RESEARCH**: Mention current trends or recent news from the research data provided above.
- Provide a high-level explanation suitable for {student_level} level
- Use analogies or real-world comparisons to build intuition

### 3. **Core Concepts** (Main Content)
{type_guidance}

### 4. **Common Pitfalls & Mistakes**
- List 3-5 mistakes {student_level} learners commonly make
- Explain WHY each is wrong and HOW to avoid it

### 5. **Practice Checkpoint** (Quick Self-Check)
- 2-3 thought-provoking questions to test understanding
- NOT multiple choice - open-ended conceptual questions

### 6. **Key Takeaways**
- 3-5 bullet points summarizing the lesson
- Each point should be a complete, actionable insight

### 7. **Next Steps**
- What to practice or explore next
- How this connects to upcoming lessons

## Writing Guidelines

**Tone & Style:**
- Professional yet approachable - like a senior mentor explaining to a colleague
- Use "you" to address the student directly
- No fluff - every sentence must add value

**Technical Quality:**
- All code must be production-quality, not pseudocode
- Use current best practices and modern syntax
- Code blocks must specify language

**Adapt to Level:**
{level_guidance}

**Length Guidelines:**
- Total: Roughly {min_words}-{max_words} words

Now generate the study module following this structure exactly. Make it exceptional and well-spaced for optimal readability."#;

const THEORY_GUIDANCE: &str = r#"- Break down into digestible sub-concepts
- **INTEGRATE RESEARCH**: Use the "Official Docs Content" to ensure technical accuracy.
- Use **bold** for key terms (first mention only)
- Include real-world examples and use cases
- Add visual analogies or comparisons
- Use > blockquotes for important notes or tips"#;

const PRACTICAL_GUIDANCE: &str = r#"- Provide 3-5 progressive code examples
- **INTEGRATE RESEARCH**: Use patterns found in the "Official Docs Content".
- Start simple, build complexity gradually
- Every code block must have a brief description above it, inline comments on key lines, and its expected output below
- Use real-world scenarios, not "foo/bar" examples
- Show common patterns and best practices"#;

const PROJECT_GUIDANCE: &str = r#"- Present a practical project/exercise
- Clearly define the problem to solve
- List specific requirements
- Provide starter code or architecture guidance
- Suggest implementation steps
- Include testing/validation criteria"#;

const BEGINNER_GUIDANCE: &str = r#"- Define technical terms when first used
- Provide more context and background
- Use simpler analogies
- Smaller code examples with more explanation
- Emphasize fundamentals over advanced patterns"#;

const INTERMEDIATE_GUIDANCE: &str = r#"- Assume familiarity with basics
- Focus on deeper "why" and "how it works internally"
- Compare alternative approaches
- Introduce optimization and best practices
- Reference common design patterns"#;

const ADVANCED_GUIDANCE: &str = r#"- Assume strong foundation
- Dive into internals and edge cases
- Discuss trade-offs and architectural decisions
- Reference industry standards and advanced patterns
- Challenge with complex scenarios"#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestSystemMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use learnpath_core::domain::{LessonType, PipelineState};
use learnpath_core::ports::{LessonWriterService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LessonWriterService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiWriterAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiWriterAdapter {
    /// Creates a new `OpenAiWriterAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_prompt(state: &PipelineState) -> String {
        let type_guidance = match state.lesson_type {
            LessonType::Theory => THEORY_GUIDANCE,
            LessonType::Practical => PRACTICAL_GUIDANCE,
            LessonType::Project => PROJECT_GUIDANCE,
        };
        // Free-form level string; anything unrecognized gets the middle tier.
        let level_guidance = match state.student_level.to_lowercase().as_str() {
            "beginner" => BEGINNER_GUIDANCE,
            "advanced" => ADVANCED_GUIDANCE,
            _ => INTERMEDIATE_GUIDANCE,
        };
        let lesson_type = match state.lesson_type {
            LessonType::Theory => "theory",
            LessonType::Practical => "practical",
            LessonType::Project => "project",
        };
        let research_context = state
            .research_context
            .as_deref()
            .unwrap_or("No research data available.");

        WRITER_SYSTEM_TEMPLATE
            .replace("{course_topic}", &state.course_topic)
            .replace("{student_level}", &state.student_level)
            .replace("{topic}", &state.topic_title)
            .replace("{estimated_minutes}", &state.estimated_minutes.to_string())
            .replace("{lesson_type}", lesson_type)
            .replace("{research_context}", research_context)
            .replace("{type_guidance}", type_guidance)
            .replace("{level_guidance}", level_guidance)
            .replace("{min_words}", &(state.estimated_minutes * 100).to_string())
            .replace("{max_words}", &(state.estimated_minutes * 150).to_string())
    }
}

//=========================================================================================
// `LessonWriterService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LessonWriterService for OpenAiWriterAdapter {
    /// Synthesizes the final lesson markdown in one model call.
    async fn write_lesson(&self, state: &PipelineState) -> PortResult<String> {
        let prompt = Self::build_prompt(state);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()])
            .temperature(0.3)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Writer LLM response contained no text content.".to_string())
            })
    }
}
