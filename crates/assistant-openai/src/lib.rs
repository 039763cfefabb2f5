// Driver for every OpenAI-wire-compatible backend: OpenAI itself, Ollama,
// Together, and Fireworks all speak the same `/chat/completions` shape, so
// one driver implementation serves all four — only the base URL, auth
// header, and default model differ.

mod wire;

use assistant_contracts::{BackendTag, ConverseResponse, ErrorKind, Message};
use assistant_core::driver::{ConverseParams, ConverseStream, Driver};
use assistant_core::error::{CoreError, Result};
use assistant_core::tokenizer;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use wire::{OpenAiRequest, OpenAiStreamChunk};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const TOGETHER_DEFAULT_URL: &str = "https://api.together.xyz/v1/chat/completions";
const FIREWORKS_DEFAULT_URL: &str = "https://api.fireworks.ai/inference/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiCompatDriver {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    backend: BackendTag,
}

impl OpenAiCompatDriver {
    pub fn openai(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            api_url: base_url.unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            backend: BackendTag::OpenAI,
        }
    }

    pub fn ollama(host: impl Into<String>) -> Self {
        let host = host.into();
        let base = host.trim_end_matches('/');
        Self {
            client: Client::new(),
            api_key: None,
            api_url: format!("{base}/v1/chat/completions"),
            backend: BackendTag::Ollama,
        }
    }

    pub fn together(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            api_url: TOGETHER_DEFAULT_URL.to_string(),
            backend: BackendTag::Together,
        }
    }

    pub fn fireworks(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            api_url: FIREWORKS_DEFAULT_URL.to_string(),
            backend: BackendTag::Fireworks,
        }
    }

    fn convert_role(role: assistant_contracts::Role) -> &'static str {
        match role {
            assistant_contracts::Role::User => "user",
            assistant_contracts::Role::Assistant => "assistant",
            assistant_contracts::Role::System => "system",
        }
    }
}

/// Concatenates everything sent to the model, for the fallback tokenizer
/// estimate below — this backend's wire shape carries no usage field.
fn prompt_text_for(params: &ConverseParams, messages: &[Message]) -> String {
    let mut buf = String::new();
    if let Some(system_prompt) = &params.system_prompt {
        buf.push_str(system_prompt);
        buf.push('\n');
    }
    for msg in params.prior_messages.iter().chain(messages.iter()) {
        buf.push_str(&msg.as_text());
        buf.push('\n');
    }
    buf
}

/// Inserts one `CostEvent`, estimated from `prompt_text` and the
/// accumulated output text, right before the terminal `Done` — unless the
/// call was cancelled, in which case the accumulated output is partial and
/// not worth reporting.
enum DoneState {
    Running,
    PendingDone(ConverseResponse),
    Finished,
}

fn guard_with_estimated_cost(
    mapped: impl futures::Stream<Item = ConverseResponse> + Send + 'static,
    cancel: CancellationToken,
    prompt_text: String,
    output: Arc<Mutex<String>>,
) -> ConverseStream {
    let guarded = futures::stream::unfold(
        (Box::pin(mapped), cancel, DoneState::Running, prompt_text, output),
        |(mut inner, cancel, state, prompt_text, output)| async move {
            match state {
                DoneState::Finished => None,
                DoneState::PendingDone(done_event) => {
                    Some((done_event, (inner, cancel, DoneState::Finished, prompt_text, output)))
                }
                DoneState::Running => {
                    if cancel.is_cancelled() {
                        return Some((
                            ConverseResponse::done(),
                            (inner, cancel, DoneState::Finished, prompt_text, output),
                        ));
                    }
                    match inner.next().await {
                        Some(event) if matches!(&event, ConverseResponse::Done { error: None, .. }) => {
                            let cost = tokenizer::estimate_usage(&prompt_text, &output.lock().unwrap());
                            Some((
                                ConverseResponse::CostEvent { cost },
                                (inner, cancel, DoneState::PendingDone(event), prompt_text, output),
                            ))
                        }
                        Some(event) => {
                            if let ConverseResponse::Text { text } = &event {
                                output.lock().unwrap().push_str(text);
                            }
                            let is_done = event.is_done();
                            let next_state = if is_done { DoneState::Finished } else { DoneState::Running };
                            Some((event, (inner, cancel, next_state, prompt_text, output)))
                        }
                        None => {
                            let cost = tokenizer::estimate_usage(&prompt_text, &output.lock().unwrap());
                            Some((
                                ConverseResponse::CostEvent { cost },
                                (
                                    inner,
                                    cancel,
                                    DoneState::PendingDone(ConverseResponse::done()),
                                    prompt_text,
                                    output,
                                ),
                            ))
                        }
                    }
                }
            }
        },
    );
    Box::pin(guarded)
}

#[async_trait]
impl Driver for OpenAiCompatDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system_prompt) = &params.system_prompt {
            wire_messages.push(wire::OpenAiMessage {
                role: "system".to_string(),
                content: system_prompt.clone(),
            });
        }
        for msg in params.prior_messages.iter().chain(messages.iter()) {
            wire_messages.push(wire::OpenAiMessage {
                role: Self::convert_role(msg.role).to_string(),
                content: msg.as_text(),
            });
        }

        let request = OpenAiRequest {
            model: params.model_id.clone(),
            messages: wire_messages,
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_new_tokens),
            top_p: Some(params.top_p),
            stream: true,
            response_format: if params.json {
                Some(wire::OpenAiResponseFormat::json_object())
            } else {
                None
            },
        };

        let mut req = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(api_key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = req.send().await.map_err(|e| {
            CoreError::ProviderTransport(format!("{:?} request failed: {e}", self.backend))
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited(format!(
                "{:?} rate limited",
                self.backend
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "{:?} returned {status}: {body}",
                self.backend
            )));
        }

        let prompt_text = prompt_text_for(params, &messages);
        let output = Arc::new(Mutex::new(String::new()));

        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();

        let mapped = event_stream.map(|item| match item {
            Ok(event) => {
                if event.data == "[DONE]" {
                    return ConverseResponse::done();
                }
                match serde_json::from_str::<OpenAiStreamChunk>(&event.data) {
                    Ok(chunk) => {
                        if let Some(choice) = chunk.choices.first() {
                            if let Some(content) = &choice.delta.content {
                                if !content.is_empty() {
                                    return ConverseResponse::Text {
                                        text: content.clone(),
                                    };
                                }
                            }
                            if choice.finish_reason.is_some() {
                                return ConverseResponse::done();
                            }
                        }
                        ConverseResponse::Text {
                            text: String::new(),
                        }
                    }
                    Err(e) => ConverseResponse::failed(
                        ErrorKind::MalformedModelOutput,
                        format!("failed to parse stream chunk: {e}"),
                    ),
                }
            }
            Err(e) => {
                ConverseResponse::failed(ErrorKind::ProviderTransport, format!("stream error: {e}"))
            }
        });

        Ok(guard_with_estimated_cost(mapped, cancel, prompt_text, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_contracts::Role;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn streams_text_deltas_and_terminates_with_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let driver = OpenAiCompatDriver {
            client: Client::new(),
            api_key: Some("test-key".to_string()),
            api_url: format!("{}/v1/chat/completions", server.uri()),
            backend: BackendTag::OpenAI,
        };

        let params = ConverseParams::new("gpt-4o");
        let mut stream = driver
            .converse_stream(
                vec![Message::text(Role::User, "hi")],
                &params,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut text = String::new();
        let mut saw_done = false;
        while let Some(event) = stream.next().await {
            match event {
                ConverseResponse::Text { text: delta } => text.push_str(&delta),
                ConverseResponse::Done { .. } => {
                    saw_done = true;
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(text, "Hello");
        assert!(saw_done);
    }
}
