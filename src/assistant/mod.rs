//! Assistant seam - produces streamed replies about a client's policies
//!
//! The backend hands an [`AssistantRequest`] (client, policies, history and
//! the new prompt) to an [`Assistant`] and forwards the resulting chunk
//! stream to the chat screen.
//!
//! # Implementations
//!
//! - [`OpenAiAssistant`]: OpenAI-compatible `/chat/completions` over SSE
//! - [`ScriptedAssistant`]: offline replies built from the policy list
//!   (demo mode, tests, or when no API key is configured)

mod openai;
mod scripted;
pub mod sse;

pub use openai::OpenAiAssistant;
pub use scripted::ScriptedAssistant;

use crate::config::{AssistantConfig, AssistantProvider};
use crate::model::{Client, Message, MessageKind, Policy};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;

/// One piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantChunk {
    /// Incremental reply text
    Delta(String),
    /// Token usage reported for the whole reply
    Usage(u32),
}

/// Stream of reply chunks; ends when the reply is complete
pub type ChunkStream = BoxStream<'static, anyhow::Result<AssistantChunk>>;

/// Everything the assistant needs to answer one prompt
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub client: Client,
    pub policies: Vec<Policy>,
    /// Earlier messages of the conversation, chronological, prompt excluded
    pub history: Vec<Message>,
    pub prompt: String,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Short name for logs and the status bar
    fn name(&self) -> &'static str;

    /// Start a reply. Errors before the first chunk are returned here,
    /// errors mid-stream arrive as `Err` items.
    async fn reply(&self, request: AssistantRequest) -> anyhow::Result<ChunkStream>;
}

/// Build the configured assistant
///
/// Falls back to the scripted assistant when the OpenAI provider has no key.
pub fn create_assistant(config: &AssistantConfig) -> Arc<dyn Assistant> {
    match config.provider {
        AssistantProvider::OpenAi => match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => match OpenAiAssistant::new(config, key) {
                Ok(assistant) => Arc::new(assistant),
                Err(e) => {
                    tracing::error!("Failed to build HTTP assistant, using scripted: {:#}", e);
                    Arc::new(ScriptedAssistant::new(config.scripted_delay()))
                }
            },
            _ => {
                tracing::warn!("No assistant API key configured, using scripted assistant");
                Arc::new(ScriptedAssistant::new(config.scripted_delay()))
            }
        },
        AssistantProvider::Scripted => Arc::new(ScriptedAssistant::new(config.scripted_delay())),
    }
}

/// Rough token estimate (chars / 4), used when the provider reports none
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Chat-completions role/content pair
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

/// System prompt grounding the assistant in the client's policies
pub fn system_prompt(client: &Client, policies: &[Policy]) -> String {
    let mut prompt = format!(
        "Você é o assistente da corretora Luma. Responda em português, de forma \
         objetiva, apenas com base nas apólices abaixo do cliente {} ({}). \
         Se a informação não estiver nas apólices, diga que não a encontrou.\n\n",
        client.name, client.email
    );

    if policies.is_empty() {
        prompt.push_str("O cliente não possui apólices cadastradas.\n");
        return prompt;
    }

    prompt.push_str("Apólices:\n");
    for p in policies {
        prompt.push_str(&format!(
            "- {} nº {} ({}, {}): {}. Prêmio {}",
            p.category,
            p.number,
            p.insurer,
            p.status.label(),
            p.coverage,
            p.premium_display()
        ));
        if let Some(end) = p.ends_on {
            prompt.push_str(&format!(", vigência até {}", end.format("%d/%m/%Y")));
        }
        prompt.push_str(".\n");
    }
    prompt
}

/// Assemble the message list sent to a chat-completions endpoint
///
/// Keeps only the newest `max_history` history entries so long threads do
/// not grow the request without bound.
pub fn build_messages(request: &AssistantRequest, max_history: usize) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(request.history.len().min(max_history) + 2);
    messages.push(PromptMessage {
        role: "system",
        content: system_prompt(&request.client, &request.policies),
    });

    let skip = request.history.len().saturating_sub(max_history);
    for msg in request.history.iter().skip(skip) {
        let role = match msg.kind {
            MessageKind::User => "user",
            MessageKind::Ai => "assistant",
        };
        messages.push(PromptMessage {
            role,
            content: msg.content.clone(),
        });
    }

    messages.push(PromptMessage {
        role: "user",
        content: request.prompt.clone(),
    });
    messages
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::{PolicyStatus, Role};
    use chrono::NaiveDate;

    pub fn client() -> Client {
        Client {
            id: "u-ana".into(),
            name: "Ana Souza".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            office_id: Some("o-1".into()),
            advisor_id: Some("adv-1".into()),
        }
    }

    pub fn policies() -> Vec<Policy> {
        vec![
            Policy {
                id: "p1".into(),
                client_id: "u-ana".into(),
                insurer: "Porto Seguro".into(),
                number: "AUTO-123".into(),
                category: "Auto".into(),
                status: PolicyStatus::Active,
                coverage: "Colisão, roubo e furto, terceiros até R$ 100 mil".into(),
                premium_cents: 245_000,
                ends_on: NaiveDate::from_ymd_opt(2027, 3, 1),
            },
            Policy {
                id: "p2".into(),
                client_id: "u-ana".into(),
                insurer: "SulAmérica".into(),
                number: "VIDA-9".into(),
                category: "Vida".into(),
                status: PolicyStatus::Expired,
                coverage: "Morte natural e acidental".into(),
                premium_cents: 80_000,
                ends_on: None,
            },
        ]
    }

    pub fn request(prompt: &str) -> AssistantRequest {
        AssistantRequest {
            client: client(),
            policies: policies(),
            history: Vec::new(),
            prompt: prompt.to_string(),
        }
    }
}
