// Offline assistant: answers from the client's policy list
//
// Used in demo mode, in tests, and whenever no API key is configured. It
// recognizes a handful of question topics (coverage, expiry, premium, count)
// and streams the answer word by word like a real completion would.

use super::{estimate_tokens, Assistant, AssistantChunk, AssistantRequest, ChunkStream};
use crate::model::{active_policies_badge, format_brl, Policy};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Question topics the scripted assistant understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Coverage,
    Expiry,
    Premium,
    Count,
    Summary,
}

impl Topic {
    fn detect(prompt: &str) -> Self {
        let p = prompt.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| p.contains(w));

        if has(&["cobertura", "cobre", "coberto"]) {
            Topic::Coverage
        } else if has(&["vence", "vencimento", "vigência", "vigencia", "renova"]) {
            Topic::Expiry
        } else if has(&["valor", "prêmio", "premio", "pago", "custa", "preço", "preco"]) {
            Topic::Premium
        } else if has(&["quantas", "quantos"]) {
            Topic::Count
        } else {
            Topic::Summary
        }
    }
}

pub struct ScriptedAssistant {
    /// Pause between streamed words (zero in tests)
    word_delay: Duration,
}

impl ScriptedAssistant {
    pub fn new(word_delay: Duration) -> Self {
        Self { word_delay }
    }

    /// Compose the full answer for a request
    pub fn compose(request: &AssistantRequest) -> String {
        let active: Vec<&Policy> = request.policies.iter().filter(|p| p.is_active()).collect();
        let first_name = request
            .client
            .name
            .split_whitespace()
            .next()
            .unwrap_or(&request.client.name);

        if request.policies.is_empty() {
            return format!(
                "Não encontrei apólices cadastradas para {}. Cadastre uma apólice para que eu possa ajudar.",
                first_name
            );
        }

        match Topic::detect(&request.prompt) {
            Topic::Coverage => {
                if active.is_empty() {
                    return format!("{} não possui apólices ativas no momento.", first_name);
                }
                let mut answer = format!("Coberturas das apólices ativas de {}:\n", first_name);
                for p in &active {
                    answer.push_str(&format!(
                        "• {} ({}, nº {}): {}\n",
                        p.category, p.insurer, p.number, p.coverage
                    ));
                }
                answer.trim_end().to_string()
            }
            Topic::Expiry => {
                let mut answer = String::from("Vigências:\n");
                for p in &request.policies {
                    let end = p
                        .ends_on
                        .map(|d| d.format("%d/%m/%Y").to_string())
                        .unwrap_or_else(|| "sem data informada".to_string());
                    answer.push_str(&format!(
                        "• {} nº {} ({}): {}\n",
                        p.category,
                        p.number,
                        p.status.label(),
                        end
                    ));
                }
                answer.trim_end().to_string()
            }
            Topic::Premium => {
                let total: i64 = active.iter().map(|p| p.premium_cents).sum();
                let mut answer = String::from("Prêmios das apólices ativas:\n");
                for p in &active {
                    answer.push_str(&format!(
                        "• {} nº {}: {}\n",
                        p.category,
                        p.number,
                        p.premium_display()
                    ));
                }
                answer.push_str(&format!("Total: {}", format_brl(total)));
                answer
            }
            Topic::Count => format!(
                "{} tem {} de {} cadastradas.",
                first_name,
                active_policies_badge(active.len()),
                request.policies.len()
            ),
            Topic::Summary => {
                let categories: Vec<&str> = active.iter().map(|p| p.category.as_str()).collect();
                if categories.is_empty() {
                    format!(
                        "{} possui {} apólice(s), nenhuma ativa. Pergunte sobre vigências para mais detalhes.",
                        first_name,
                        request.policies.len()
                    )
                } else {
                    format!(
                        "{} tem {}: {}. Posso detalhar coberturas, vigências ou valores.",
                        first_name,
                        active_policies_badge(active.len()),
                        categories.join(", ")
                    )
                }
            }
        }
    }
}

/// Split text into streamable pieces that concatenate back to the original
fn split_words(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(String::from).collect()
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn reply(&self, request: AssistantRequest) -> Result<ChunkStream> {
        let answer = Self::compose(&request);
        let tokens = estimate_tokens(&answer);
        let delay = self.word_delay;

        tracing::debug!(client = %request.client.id, tokens, "Scripted reply composed");

        let words = futures::stream::iter(split_words(&answer)).then(move |word| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, anyhow::Error>(AssistantChunk::Delta(word))
        });
        let usage = futures::stream::once(async move { Ok(AssistantChunk::Usage(tokens)) });

        Ok(words.chain(usage).boxed())
    }
}
