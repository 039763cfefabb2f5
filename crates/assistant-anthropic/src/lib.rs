// Driver for Anthropic's Messages API, both called directly and fronted by
// AWS Bedrock. The wire shape is the same Anthropic Messages body in both
// cases; only transport, auth, and the streaming-vs-non-streaming path
// differ, so the request/response types in `wire` are shared.

mod bedrock_sign;
mod wire;

use assistant_contracts::{ConverseResponse, ErrorKind, Message, Role, UsageCost};
use assistant_core::driver::{ConverseParams, ConverseStream, Driver};
use assistant_core::error::{CoreError, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use wire::{
    AnthropicContentBlock, AnthropicContentBlockDeltaEvent, AnthropicDelta, AnthropicMessage,
    AnthropicMessageDelta, AnthropicMessageStart, AnthropicMessagesResponse, AnthropicRequest,
    AnthropicThinking,
};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

fn thinking_budget_for(reasoning: bool) -> Option<AnthropicThinking> {
    reasoning.then(|| AnthropicThinking::enabled(16_384))
}

/// Drives the stream-to-terminal-`Done` state machine shared by both
/// Anthropic drivers, inserting exactly one `CostEvent` carrying the
/// accumulated token usage right before the real terminal event — unless
/// the call is cancelled out from under it, in which case usage is
/// incomplete and not worth reporting.
enum DoneState {
    Running,
    PendingDone(ConverseResponse),
    Finished,
}

fn guard_with_cost(
    mapped: impl futures::Stream<Item = ConverseResponse> + Send + 'static,
    cancel: CancellationToken,
    usage: Arc<Mutex<UsageCost>>,
) -> ConverseStream {
    let guarded = futures::stream::unfold(
        (Box::pin(mapped), cancel, DoneState::Running, usage),
        |(mut inner, cancel, state, usage)| async move {
            match state {
                DoneState::Finished => None,
                DoneState::PendingDone(done_event) => {
                    Some((done_event, (inner, cancel, DoneState::Finished, usage)))
                }
                DoneState::Running => {
                    if cancel.is_cancelled() {
                        return Some((ConverseResponse::done(), (inner, cancel, DoneState::Finished, usage)));
                    }
                    match inner.next().await {
                        Some(event) if matches!(&event, ConverseResponse::Done { error: None, .. }) => {
                            let cost = usage.lock().unwrap().clone();
                            Some((
                                ConverseResponse::CostEvent { cost },
                                (inner, cancel, DoneState::PendingDone(event), usage),
                            ))
                        }
                        Some(event) => {
                            let is_done = event.is_done();
                            let next_state = if is_done { DoneState::Finished } else { DoneState::Running };
                            Some((event, (inner, cancel, next_state, usage)))
                        }
                        None => {
                            let cost = usage.lock().unwrap().clone();
                            Some((
                                ConverseResponse::CostEvent { cost },
                                (inner, cancel, DoneState::PendingDone(ConverseResponse::done()), usage),
                            ))
                        }
                    }
                }
            }
        },
    );
    Box::pin(guarded)
}

fn split_system_and_turns(params: &ConverseParams, messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_prompt = params.system_prompt.clone();
    let mut turns = Vec::new();

    for msg in params.prior_messages.iter().chain(messages.iter()) {
        match msg.role {
            Role::System => {
                system_prompt = Some(msg.as_text());
            }
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

    (system_prompt, turns)
}

/// Direct Anthropic Messages API driver.
#[derive(Clone)]
pub struct AnthropicDriver {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl Driver for AnthropicDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let (system, turns) = split_system_and_turns(params, &messages);

        let request = AnthropicRequest {
            model: Some(params.model_id.clone()),
            anthropic_version: None,
            messages: turns,
            max_tokens: params.max_new_tokens,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            system,
            stream: true,
            thinking: thinking_budget_for(params.reasoning),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("anthropic request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited("anthropic rate limited".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "anthropic returned {status}: {body}"
            )));
        }

        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();

        let usage = Arc::new(Mutex::new(UsageCost::default()));
        let usage_for_map = usage.clone();

        let mapped = event_stream.map(move |item| match item {
            Ok(event) => match event.event.as_str() {
                "message_start" => {
                    if let Ok(data) = serde_json::from_str::<AnthropicMessageStart>(&event.data) {
                        if let Some(u) = data.message.usage {
                            usage_for_map.lock().unwrap().input_tokens = u.input_tokens as u64;
                        }
                    }
                    ConverseResponse::Text {
                        text: String::new(),
                    }
                }
                "content_block_delta" => {
                    match serde_json::from_str::<AnthropicContentBlockDeltaEvent>(&event.data) {
                        Ok(data) => match data.delta {
                            AnthropicDelta::TextDelta { text } => ConverseResponse::Text { text },
                            AnthropicDelta::InputJsonDelta { .. } => ConverseResponse::Text {
                                text: String::new(),
                            },
                        },
                        Err(e) => ConverseResponse::failed(
                            ErrorKind::MalformedModelOutput,
                            format!("failed to parse content_block_delta: {e}"),
                        ),
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<AnthropicMessageDelta>(&event.data) {
                        if let Some(u) = data.usage {
                            usage_for_map.lock().unwrap().output_tokens = u.output_tokens as u64;
                        }
                        if data.delta.stop_reason.is_some() {
                            return ConverseResponse::done();
                        }
                    }
                    ConverseResponse::Text {
                        text: String::new(),
                    }
                }
                "message_stop" => ConverseResponse::done(),
                "error" => ConverseResponse::failed(
                    ErrorKind::ProviderTransport,
                    format!("anthropic stream error: {}", event.data),
                ),
                _ => ConverseResponse::Text {
                    text: String::new(),
                },
            },
            Err(e) => {
                ConverseResponse::failed(ErrorKind::ProviderTransport, format!("stream error: {e}"))
            }
        });

        Ok(guard_with_cost(mapped, cancel, usage))
    }
}

/// Anthropic-on-Bedrock driver. Bedrock's InvokeModel endpoint for
/// Anthropic models speaks the same Messages body (with `anthropic_version`
/// instead of `model`) but is authenticated via SigV4 rather than a bearer
/// token, and this driver calls the non-streaming variant: one `Text` event
/// carrying the full answer, then `Done`. That still satisfies the
/// monotonic-concatenation guarantee since a single delta trivially
/// concatenates to the full answer.
#[derive(Clone)]
pub struct BedrockAnthropicDriver {
    client: Client,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl BedrockAnthropicDriver {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}/invoke",
            self.region, model_id
        )
    }
}

#[async_trait]
impl Driver for BedrockAnthropicDriver {
    async fn converse_stream(
        &self,
        messages: Vec<Message>,
        params: &ConverseParams,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let (system, turns) = split_system_and_turns(params, &messages);

        let request = AnthropicRequest {
            model: None,
            anthropic_version: Some(BEDROCK_ANTHROPIC_VERSION.to_string()),
            messages: turns,
            max_tokens: params.max_new_tokens,
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            system,
            stream: false,
            thinking: thinking_budget_for(params.reasoning),
        };

        let body = serde_json::to_vec(&request)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("failed to encode bedrock request: {e}")))?;
        let url = self.endpoint(&params.model_id);

        let signed = bedrock_sign::sign_request(
            &self.region,
            &self.access_key_id,
            &self.secret_access_key,
            self.session_token.as_deref(),
            &url,
            &body,
        )?;

        let mut req = self.client.post(&url).body(body);
        for (name, value) in signed.headers {
            req = req.header(name, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("bedrock request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::ProviderRateLimited("bedrock rate limited".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderTransport(format!(
                "bedrock returned {status}: {text}"
            )));
        }

        let parsed: AnthropicMessagesResponse = response
            .json()
            .await
            .map_err(|e| CoreError::ProviderTransport(format!("failed to parse bedrock response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .map(|block| match block {
                AnthropicContentBlock::Text { text } => text,
            })
            .collect::<Vec<_>>()
            .join("");

        let events = if cancel.is_cancelled() {
            vec![ConverseResponse::done()]
        } else {
            let cost = parsed.usage.map(|u| UsageCost {
                input_tokens: u.input_tokens as u64,
                output_tokens: u.output_tokens as u64,
                usd: 0.0,
            });
            let mut events = vec![ConverseResponse::Text { text }];
            if let Some(cost) = cost {
                events.push(ConverseResponse::CostEvent { cost });
            }
            events.push(ConverseResponse::done());
            events
        };

        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn direct_driver_streams_text_deltas_then_done() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_stop\n",
            "data: {}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let driver = AnthropicDriver::with_base_url(
            "test-key",
            format!("{}/v1/messages", server.uri()),
        );
        let params = ConverseParams::new("claude-3-5-sonnet");
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
