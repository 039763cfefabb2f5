// The `POST /chat/*` family (spec.md §6): JSON request bodies, responses are
// Server-Sent-Events carrying `ConverseResponse` records. Grounded on the
// teacher's `events.rs` SSE idiom (`Sse::new(stream).keep_alive(...)`), but
// the event source here is `answerOrSearch`'s pull-driven `ConverseStream`
// rather than a database poll loop.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use assistant_agentic::agent_prompt::parse_agent_prompt;
use assistant_agentic::pipeline::AgenticPipeline;
use assistant_contracts::{ConverseResponse, Message, Role};
use assistant_core::Driver;

use crate::error::{ApiError, ApiResult};

/// Tracks in-flight streaming requests by caller-chosen id, purely so
/// `POST /chat/:request_id/cancel` has something to flip — mirrors
/// `assistant_ingestion::IngestionOrchestrator`'s `active_jobs` map, the
/// same tracking-map idiom applied to request-scoped rather than
/// background-job-scoped cancellation.
#[derive(Clone)]
pub struct ChatState {
    pipeline: Arc<AgenticPipeline<Box<dyn Driver>>>,
    inflight: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl ChatState {
    pub fn new(pipeline: AgenticPipeline<Box<dyn Driver>>) -> Self {
        Self { pipeline: Arc::new(pipeline), inflight: Arc::new(Mutex::new(HashMap::new())) }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl From<ChatRole> for Role {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Role::User,
            ChatRole::Assistant => Role::Assistant,
            ChatRole::System => Role::System,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerOrSearchRequest {
    /// Caller-chosen id; `POST /chat/{request_id}/cancel` refers back to it.
    pub request_id: Uuid,
    pub optimized_prompt: String,
    #[serde(default)]
    pub retrieved_ctx: String,
    #[serde(default)]
    pub date_string: Option<String>,
    /// Opaque blob, tried against the three agent-prompt shapes.
    #[serde(default)]
    pub agent_prompt: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

fn today_string() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// `POST /chat/answer` — `answerOrSearch`, streamed as SSE lines of
/// `ConverseResponse`. Registers `request_id` in `ChatState::inflight` for
/// the duration of the stream so a concurrent cancel request can reach it.
#[utoipa::path(
    post,
    path = "/chat/answer",
    request_body = AnswerOrSearchRequest,
    responses((status = 200, description = "text/event-stream of ConverseResponse records")),
    tag = "chat"
)]
pub async fn answer(
    State(state): State<ChatState>,
    Json(request): Json<AnswerOrSearchRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let agent_prompt = parse_agent_prompt(request.agent_prompt.as_deref());
    let date_string = request.date_string.unwrap_or_else(today_string);
    let messages: Vec<Message> =
        request.messages.into_iter().map(|m| Message::text(m.role.into(), m.text)).collect();

    let cancel = CancellationToken::new();
    state.inflight.lock().unwrap().insert(request.request_id, cancel.clone());

    let converse_stream = state
        .pipeline
        .answer_or_search(&request.optimized_prompt, &request.retrieved_ctx, &date_string, &agent_prompt, messages, cancel)
        .await
        .map_err(ApiError::Core)?;

    let inflight = state.inflight.clone();
    let request_id = request.request_id;
    let sse_stream = converse_stream.map(move |event| {
        if event.is_done() {
            inflight.lock().unwrap().remove(&request_id);
        }
        Ok(to_sse_event(&event))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &ConverseResponse) -> SseEvent {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().data(json)
}

/// `POST /chat/{request_id}/cancel` — cancels an in-flight `answerOrSearch`
/// call (spec.md §8 S6). A no-op if the request already finished.
#[utoipa::path(post, path = "/chat/{request_id}/cancel", responses((status = 204)), tag = "chat")]
pub async fn cancel(State(state): State<ChatState>, Path(request_id): Path<Uuid>) -> ApiResult<axum::http::StatusCode> {
    if let Some(token) = state.inflight.lock().unwrap().get(&request_id) {
        token.cancel();
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub fn routes(state: ChatState) -> Router {
    Router::new()
        .route("/chat/answer", post(answer))
        .route("/chat/:request_id/cancel", post(cancel))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_role_maps_onto_message_role() {
        assert_eq!(Role::from(ChatRole::User), Role::User);
        assert_eq!(Role::from(ChatRole::Assistant), Role::Assistant);
        assert_eq!(Role::from(ChatRole::System), Role::System);
    }

    #[test]
    fn done_event_serializes_to_an_sse_data_line() {
        let event = ConverseResponse::done();
        let sse = to_sse_event(&event);
        // `Event`'s Debug impl includes the `data` field we built the line from.
        assert!(format!("{sse:?}").contains("done"));
    }

    #[tokio::test]
    async fn cancelling_an_unknown_request_id_is_a_no_op() {
        let pipeline = AgenticPipeline::new(Box::new(crate::stubs::NoopDriver) as Box<dyn Driver>, "unconfigured".to_string());
        let state = ChatState::new(pipeline);
        let status = cancel(State(state), Path(Uuid::new_v4())).await.unwrap();
        assert_eq!(status, axum::http::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn cancel_flips_the_registered_token() {
        let pipeline = AgenticPipeline::new(Box::new(crate::stubs::NoopDriver) as Box<dyn Driver>, "unconfigured".to_string());
        let state = ChatState::new(pipeline);
        let request_id = Uuid::new_v4();
        let token = CancellationToken::new();
        state.inflight.lock().unwrap().insert(request_id, token.clone());

        cancel(State(state), Path(request_id)).await.unwrap();

        assert!(token.is_cancelled());
    }
}
