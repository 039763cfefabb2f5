// Model-agnostic chat driver contract (spec.md §4.2).
//
// Every backend (OpenAI, Anthropic, Ollama, ...) implements `Driver`. The
// driver never inspects or transforms prompt content beyond what the wire
// format requires, and streaming implementations deliver deltas in causal
// order, terminating with exactly one `Done` event — even on failure.

use assistant_contracts::{ConverseOutcome, ConverseResponse, Message};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub type ConverseStream = Pin<Box<dyn Stream<Item = ConverseResponse> + Send>>;

/// Call-time configuration, see the options table in spec.md §4.2.
#[derive(Debug, Clone)]
pub struct ConverseParams {
    pub model_id: String,
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
    pub json: bool,
    pub reasoning: bool,
    pub web_search: bool,
    /// Opaque agent persona blob, parsed by assistant-agentic::agent_prompt.
    pub agent_prompt: Option<String>,
    /// Prior turns to prepend ahead of the caller's `messages` argument.
    pub prior_messages: Vec<Message>,
}

impl ConverseParams {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_new_tokens: 5120,
            top_p: 0.9,
            temperature: 0.6,
            system_prompt: None,
            json: false,
            reasoning: false,
            web_search: false,
            agent_prompt: None,
            prior_messages: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }
}

/// Uniform `converse`/`converseStream` contract implemented by each backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Streaming call. Must honor `cancel` within one backend chunk and must
    /// terminate with exactly one `Done`/`Done{error}` event.
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream>;

    /// Non-streaming convenience method built from `converse_stream` by
    /// accumulating its events. Backends rarely need to override this.
    async fn converse(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
    ) -> Result<ConverseOutcome> {
        use futures::StreamExt;

        let mut stream = self
            .converse_stream(messages, params, CancellationToken::new())
            .await?;
        let mut outcome = ConverseOutcome::default();

        while let Some(event) = stream.next().await {
            match event {
                ConverseResponse::Text { text } => outcome.text.push_str(&text),
                ConverseResponse::Reasoning { reasoning } => {
                    outcome
                        .reasoning
                        .get_or_insert_with(String::new)
                        .push_str(&reasoning);
                }
                ConverseResponse::CitationEvent { citation } => outcome.citations.push(citation),
                ConverseResponse::CostEvent { cost } => outcome.cost = Some(cost),
                ConverseResponse::Done { error, .. } => {
                    if let Some(err) = error {
                        return Err(crate::error::CoreError::ProviderTransport(err.message));
                    }
                    break;
                }
            }
        }

        Ok(outcome)
    }
}

/// Lets `Box<dyn Driver>` (what `assistant-agentic::provider_factory`
/// hands back) be used directly anywhere a generic `D: Driver` is expected,
/// e.g. `AgenticPipeline<Box<dyn Driver>>`.
#[async_trait]
impl Driver for Box<dyn Driver> {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        (**self).converse_stream(messages, params, cancel).await
    }

    async fn converse(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
    ) -> Result<ConverseOutcome> {
        (**self).converse(messages, params).await
    }
}
