//! OpenAI-compatible streaming chat-completions client

use super::sse::{self, LineBuffer};
use super::{build_messages, Assistant, AssistantChunk, AssistantRequest, ChunkStream};
use crate::config::AssistantConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Buffered chunks between the reader task and the consumer
const CHUNK_BUFFER: usize = 64;

pub struct OpenAiAssistant {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_history: usize,
}

impl OpenAiAssistant {
    pub fn new(config: &AssistantConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_history: config.max_history,
        })
    }
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn reply(&self, request: AssistantRequest) -> Result<ChunkStream> {
        let body = json!({
            "model": self.model,
            "stream": true,
            "stream_options": { "include_usage": true },
            "messages": build_messages(&request, self.max_history),
        });

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            history = request.history.len(),
            "Requesting assistant reply"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Assistant request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Assistant returned {}: {}", status, text.trim());
        }

        // Some gateways ignore `stream: true` and answer with a plain JSON body
        if !sse::is_sse_response(response.headers()) {
            let value: serde_json::Value = response
                .json()
                .await
                .context("Failed to parse assistant response")?;
            let content = value
                .pointer("/choices/0/message/content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut chunks: Vec<Result<AssistantChunk>> = vec![Ok(AssistantChunk::Delta(content))];
            if let Some(tokens) = sse::extract_usage(&value) {
                chunks.push(Ok(AssistantChunk::Usage(tokens)));
            }
            return Ok(futures::stream::iter(chunks).boxed());
        }

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut lines = LineBuffer::new();

            'read: while let Some(next) = bytes.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(anyhow::Error::new(e).context("Assistant stream interrupted")))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    match forward_line(&tx, &line).await {
                        LineOutcome::Continue => {}
                        LineOutcome::Stop => break 'read,
                    }
                }
            }

            if let Some(line) = lines.finish() {
                let _ = forward_line(&tx, &line).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

enum LineOutcome {
    Continue,
    Stop,
}

async fn forward_line(tx: &mpsc::Sender<Result<AssistantChunk>>, line: &str) -> LineOutcome {
    let Some(parsed) = sse::parse_line(line) else {
        return LineOutcome::Continue;
    };

    if let Some(message) = parsed.error {
        let _ = tx.send(Err(anyhow::anyhow!("Assistant error: {}", message))).await;
        return LineOutcome::Stop;
    }
    if parsed.done {
        return LineOutcome::Stop;
    }
    if let Some(delta) = parsed.delta {
        if tx.send(Ok(AssistantChunk::Delta(delta))).await.is_err() {
            // Consumer went away
            return LineOutcome::Stop;
        }
    }
    if let Some(tokens) = parsed.usage {
        let _ = tx.send(Ok(AssistantChunk::Usage(tokens))).await;
    }
    LineOutcome::Continue
}
