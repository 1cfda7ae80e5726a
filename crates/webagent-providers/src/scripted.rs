use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::{estimate_tokens, CompletionRequest, CompletionResponse, LLMProvider, Usage};

/// Replays a fixed list of responses, wrapping around once exhausted.
///
/// Useful for offline runs (`{"type": "scripted"}` in config) and for driving
/// the agent loop deterministically in tests.
pub struct ScriptedProvider {
    responses: Vec<String>,
    cursor: AtomicUsize,
    name: String,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            cursor: AtomicUsize::new(0),
            name: "scripted".to_string(),
        }
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.responses.is_empty() {
            return Err(anyhow::anyhow!("Scripted provider has no responses"));
        }

        let n = self.cursor.fetch_add(1, Ordering::SeqCst);
        let content = self.responses[n % self.responses.len()].clone();
        debug!(
            "Scripted completion #{} for {} messages",
            n + 1,
            request.messages.len()
        );

        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum::<u32>();
        let completion_tokens = estimate_tokens(&content);

        Ok(CompletionResponse {
            content,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: "scripted".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, MessageRole};

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::new(MessageRole::User, "go")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cycles_responses() {
        let provider = ScriptedProvider::new(vec!["a".into(), "b".into()]);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(provider.complete(request()).await.unwrap().content);
        }
        assert_eq!(seen, vec!["a", "b", "a", "b", "a"]);
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test]
    async fn test_empty_script_is_an_error() {
        let provider = ScriptedProvider::new(Vec::new());
        assert!(provider.complete(request()).await.is_err());
    }
}
