// Drivers for Google's Gemini family: direct GoogleAI, Gemini fronted by
// Vertex, and Anthropic fronted by Vertex (the VertexAI backend's two sub-
// backends, see assistant_contracts::VertexSubBackend). The Gemini wire
// shape (`generateContent`) is identical in the direct and Vertex-fronted
// cases; only the base URL and auth header change.

mod anthropic_wire;
mod wire;

use assistant_contracts::{ConverseResponse, ErrorKind, Message, Role};
use assistant_core::driver::{ConverseParams, ConverseStream, Driver};
use assistant_core::error::{CoreError, Result};
use assistant_core::tokenizer;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use wire::{Content, GenerateContentChunk, GenerateContentRequest, GenerationConfig, Part};

const GOOGLEAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

fn convert_role(role: Role) -> Option<&'static str> {
    match role {
        Role::User => Some("user"),
        Role::Assistant => Some("model"),
        Role::System => None,
    }
}

fn build_request(params: &ConverseParams, messages: &[Message]) -> GenerateContentRequest {
    let mut contents = Vec::new();
    let mut system_instruction = None;

    if let Some(system_prompt) = &params.system_prompt {
        system_instruction = Some(Content {
            role: None,
            parts: vec![Part {
                text: system_prompt.clone(),
            }],
        });
    }

    for msg in params.prior_messages.iter().chain(messages.iter()) {
        match convert_role(msg.role) {
            Some(role) => contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![Part { text: msg.as_text() }],
            }),
            None => {
                system_instruction = Some(Content {
                    role: None,
                    parts: vec![Part { text: msg.as_text() }],
                });
            }
        }
    }

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: Some(GenerationConfig {
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            max_output_tokens: Some(params.max_new_tokens),
            response_mime_type: params.json.then(|| "application/json".to_string()),
        }),
    }
}

/// Concatenates everything sent to the model, for the fallback tokenizer
/// estimate below — none of Gemini's wire shapes used here carry a usage
/// field back.
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

/// Guarantees exactly one terminal `Done` event, with a `CostEvent`
/// (estimated from `prompt_text` and the accumulated output text) inserted
/// right before it — unless the call was cancelled, in which case the
/// accumulated output is partial and not worth reporting.
enum DoneState {
    Running,
    PendingDone(ConverseResponse),
    Finished,
}

fn guard_terminal_done(
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

fn map_chunk(data: &str) -> ConverseResponse {
    match serde_json::from_str::<GenerateContentChunk>(data) {
        Ok(chunk) => {
            let Some(candidate) = chunk.candidates.into_iter().next() else {
                return ConverseResponse::Text {
                    text: String::new(),
                };
            };
            let text = candidate
                .content
                .map(|c| {
                    c.parts
                        .into_iter()
                        .map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            if !text.is_empty() {
                ConverseResponse::Text { text }
            } else if candidate.finish_reason.is_some() {
                ConverseResponse::done()
            } else {
                ConverseResponse::Text {
                    text: String::new(),
                }
            }
        }
        Err(e) => ConverseResponse::failed(
            ErrorKind::MalformedModelOutput,
            format!("failed to parse gemini chunk: {e}"),
        ),
    }
}

/// Direct Google AI Studio driver (`GEMINI_API_KEY`).
#[derive(Clone)]
pub struct GoogleAiDriver {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleAiDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: GOOGLEAI_BASE.to_string(),
        }
    }

    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model_id, self.api_key
        )
    }
}

#[async_trait]
impl Driver for GoogleAiDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let request = build_request(params, &messages);
        let url = self.stream_url(&params.model_id);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("gemini request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited("gemini rate limited".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "gemini returned {status}: {body}"
            )));
        }

        let prompt_text = prompt_text_for(params, &messages);
        let output = Arc::new(Mutex::new(String::new()));

        let event_stream = response.bytes_stream().eventsource();
        let mapped = event_stream.map(|item| match item {
            Ok(event) => map_chunk(&event.data),
            Err(e) => {
                ConverseResponse::failed(ErrorKind::ProviderTransport, format!("stream error: {e}"))
            }
        });

        Ok(guard_terminal_done(mapped, cancel, prompt_text, output))
    }
}

/// Gemini fronted by Vertex AI, authenticated with a bearer access token
/// (the caller is responsible for minting/refreshing it — this driver does
/// not perform the GCP service-account OAuth2 exchange itself).
#[derive(Clone)]
pub struct VertexGeminiDriver {
    client: Client,
    project_id: String,
    region: String,
    access_token: String,
}

impl VertexGeminiDriver {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            region: region.into(),
            access_token: access_token.into(),
        }
    }

    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:streamGenerateContent?alt=sse",
            self.region, self.project_id, self.region, model_id
        )
    }
}

#[async_trait]
impl Driver for VertexGeminiDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let request = build_request(params, &messages);
        let url = self.stream_url(&params.model_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("vertex gemini request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited(
                "vertex gemini rate limited".to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "vertex gemini returned {status}: {body}"
            )));
        }

        let prompt_text = prompt_text_for(params, &messages);
        let output = Arc::new(Mutex::new(String::new()));

        let event_stream = response.bytes_stream().eventsource();
        let mapped = event_stream.map(|item| match item {
            Ok(event) => map_chunk(&event.data),
            Err(e) => {
                ConverseResponse::failed(ErrorKind::ProviderTransport, format!("stream error: {e}"))
            }
        });

        Ok(guard_terminal_done(mapped, cancel, prompt_text, output))
    }
}

/// Anthropic fronted by Vertex AI's `rawPredict` publisher endpoint,
/// authenticated the same bearer-token way as `VertexGeminiDriver`.
#[derive(Clone)]
pub struct VertexAnthropicDriver {
    client: Client,
    project_id: String,
    region: String,
    access_token: String,
}

impl VertexAnthropicDriver {
    pub fn new(project_id: impl Into<String>, region: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            region: region.into(),
            access_token: access_token.into(),
        }
    }

    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:streamRawPredict",
            self.region, self.project_id, self.region, model_id
        )
    }
}

#[async_trait]
impl Driver for VertexAnthropicDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        use anthropic_wire::{AnthropicContentBlock, AnthropicMessage, AnthropicRequest};

        let mut system_prompt = params.system_prompt.clone();
        let mut turns = Vec::new();
        for msg in params.prior_messages.iter().chain(messages.iter()) {
            match msg.role {
                Role::System => system_prompt = Some(msg.as_text()),
                Role::User => turns.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: vec![AnthropicContentBlock::Text { text: msg.as_text() }],
                }),
                Role::Assistant => turns.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: vec![AnthropicContentBlock::Text { text: msg.as_text() }],
                }),
            }
        }

        let request = AnthropicRequest {
            anthropic_version: "vertex-2023-10-16".to_string(),
            messages: turns,
            max_tokens: params.max_new_tokens,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            system: system_prompt,
            stream: true,
        };

        let url = self.stream_url(&params.model_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("vertex anthropic request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited(
                "vertex anthropic rate limited".to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "vertex anthropic returned {status}: {body}"
            )));
        }

        let prompt_text = prompt_text_for(params, &messages);
        let output = Arc::new(Mutex::new(String::new()));

        let event_stream = response.bytes_stream().eventsource();
        let mapped = event_stream.map(|item| match item {
            Ok(event) => match event.event.as_str() {
                "content_block_delta" => {
                    match serde_json::from_str::<anthropic_wire::ContentBlockDeltaEvent>(&event.data) {
                        Ok(data) => ConverseResponse::Text { text: data.delta.text },
                        Err(e) => ConverseResponse::failed(
                            ErrorKind::MalformedModelOutput,
                            format!("failed to parse content_block_delta: {e}"),
                        ),
                    }
                }
                "message_stop" => ConverseResponse::done(),
                "error" => ConverseResponse::failed(
                    ErrorKind::ProviderTransport,
                    format!("vertex anthropic stream error: {}", event.data),
                ),
                _ => ConverseResponse::Text {
                    text: String::new(),
                },
            },
            Err(e) => {
                ConverseResponse::failed(ErrorKind::ProviderTransport, format!("stream error: {e}"))
            }
        });

        Ok(guard_terminal_done(mapped, cancel, prompt_text, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn googleai_driver_streams_text_deltas_then_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path_regex(r"/models/.*:streamGenerateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let driver = GoogleAiDriver {
            client: Client::new(),
            api_key: "test-key".to_string(),
            base_url: server.uri(),
        };

        let params = ConverseParams::new("gemini-1.5-pro");
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

        assert_eq!(text, "Hi");
        assert!(saw_done);
    }
}
