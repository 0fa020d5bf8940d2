//! `LlmProvider` over any rig completion model.
//!
//! System messages become the rig preamble and the last user message the
//! prompt; earlier user messages are sent as history. A JSON schema is passed
//! as OpenAI Responses structured-output parameters.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, JsonSchema, LlmProvider, Role,
};

/// Wraps a rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// A request reshaped for rig's prompt/preamble/history builder.
#[derive(Debug, PartialEq, Eq)]
struct Turns {
    preamble: Option<String>,
    history: Vec<String>,
    prompt: String,
}

fn split_turns(messages: &[ChatMessage]) -> Option<Turns> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut user: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .collect();
    let prompt = user.pop()?;
    Some(Turns {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: user,
        prompt,
    })
}

fn structured_output_params(schema: &JsonSchema) -> Value {
    json!({
        "text": {
            "format": {
                "type": "json_schema",
                "name": schema.name,
                "schema": schema.schema,
                "strict": true
            }
        }
    })
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let turns = split_turns(&request.messages).ok_or_else(|| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: "request has no user message".to_string(),
        })?;

        let mut builder = self.model.completion_request(Message::user(turns.prompt));
        if !turns.history.is_empty() {
            builder = builder.messages(turns.history.into_iter().map(Message::user).collect());
        }
        if let Some(preamble) = turns.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if let Some(schema) = &request.json_schema {
            builder = builder.additional_params(structured_output_params(schema));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "no text in response".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: saturate(response.usage.input_tokens),
            output_tokens: saturate(response.usage.output_tokens),
        })
    }
}
