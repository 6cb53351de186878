//! services/api/src/adapters/tutor_llm.rs
//!
//! This module contains the adapter for the conversational tutor LLM.
//! It implements the `TutorService` port from the `core` crate.
//!
//! The model is invoked in streaming mode with the `generate_quiz` tool
//! bound. The adapter inspects the stream as it arrives: tool-call deltas
//! are accumulated into a `QuizRequested` reply, while content deltas turn
//! into a token stream handed back to the caller.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequestArgs,
        FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use learnpath_core::domain::{ChatTurn, TurnRole};
use learnpath_core::ports::{PortError, PortResult, QuizToolCall, TutorReply, TutorService};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct QuizToolArgs {
    topic: String,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    #[serde(default = "default_num_questions")]
    num_questions: u32,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_num_questions() -> u32 {
    5
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TutorService` using an OpenAI-compatible LLM
/// with the quiz-generation tool bound.
#[derive(Clone)]
pub struct OpenAiTutorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTutorAdapter {
    /// Creates a new `OpenAiTutorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Maps persisted turns onto wire messages. Tool turns are replayed as
    /// system messages rather than protocol-level tool messages, so threads
    /// survive restarts without tool-call-id bookkeeping.
    fn to_messages(history: &[ChatTurn]) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        history
            .iter()
            .map(|turn| {
                let message: ChatCompletionRequestMessage = match turn.role {
                    TurnRole::SystemContext => ChatCompletionRequestSystemMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .into(),
                    TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .into(),
                    TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .into(),
                    TurnRole::Tool => ChatCompletionRequestSystemMessageArgs::default()
                        .content(format!(
                            "Tool result (generate_quiz): {}",
                            turn.content
                        ))
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?
                        .into(),
                };
                Ok(message)
            })
            .collect()
    }
}

//=========================================================================================
// `TutorService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TutorService for OpenAiTutorAdapter {
    async fn chat(&self, history: &[ChatTurn]) -> PortResult<TutorReply> {
        let quiz_tool = ChatCompletionTools::Function(ChatCompletionTool {
            function: FunctionObjectArgs::default()
                .name("generate_quiz")
                .description("Generates a quiz when the user explicitly requests one.")
                .parameters(json!({
                    "type": "object",
                    "properties": {
                        "topic": {
                            "type": "string",
                            "description": "The specific concept to test"
                        },
                        "difficulty": {
                            "type": "string",
                            "enum": ["easy", "medium", "hard"],
                            "description": "Difficulty level"
                        },
                        "num_questions": {
                            "type": "integer",
                            "description": "Number of questions"
                        }
                    },
                    "required": ["topic"]
                }))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        });

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_messages(history)?)
            .tools(vec![quiz_tool])
            .temperature(0.3)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Peek at the stream: a tool-call delta means the whole response is
        // a tool invocation; a content delta means the reply is streamed
        // text starting with that chunk.
        let mut tool_arguments = String::new();
        let mut tool_seen = false;

        while let Some(item) = upstream.next().await {
            let chunk = item.map_err(|e| PortError::Unexpected(e.to_string()))?;
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };

            if let Some(tool_calls) = choice.delta.tool_calls {
                tool_seen = true;
                for call in tool_calls {
                    if let Some(function) = call.function {
                        if let Some(arguments) = function.arguments {
                            tool_arguments.push_str(&arguments);
                        }
                    }
                }
                continue;
            }

            if let Some(first) = choice.delta.content {
                if tool_seen {
                    continue;
                }
                if first.is_empty() {
                    continue;
                }
                let stream = async_stream::stream! {
                    yield Ok(first);
                    while let Some(item) = upstream.next().await {
                        match item {
                            Ok(chunk) => {
                                let content = chunk
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|c| c.delta.content);
                                if let Some(content) = content {
                                    if !content.is_empty() {
                                        yield Ok(content);
                                    }
                                }
                            }
                            Err(e) => {
                                yield Err(PortError::Unexpected(e.to_string()));
                                return;
                            }
                        }
                    }
                };
                return Ok(TutorReply::Stream(Box::pin(stream)));
            }
        }

        if tool_seen {
            let args: QuizToolArgs = serde_json::from_str(&tool_arguments).map_err(|e| {
                PortError::Unexpected(format!("unparseable tool arguments: {e}"))
            })?;
            return Ok(TutorReply::QuizRequested(QuizToolCall {
                topic: args.topic,
                difficulty: args.difficulty,
                num_questions: args.num_questions,
            }));
        }

        // Model produced neither content nor a tool call.
        Ok(TutorReply::Stream(Box::pin(futures::stream::empty())))
    }
}
