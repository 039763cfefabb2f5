// ConverseResponse: the wire-level streaming record emitted by a chat driver call.
// Serializes to the line-delimited JSON shapes documented in spec.md §6.

use serde::{Deserialize, Serialize};

/// Error kinds surfaced across the wire on a failed terminal event.
/// Mirrors the taxonomy in spec.md §7 — not Rust exception types, just tags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoProviderConfigured,
    InvalidModel,
    ProviderTransport,
    ProviderRateLimited,
    MalformedModelOutput,
    AuthInvalid,
    IngestionAlreadyRunning,
    ConnectorNotFound,
    ToolNotFound,
    UnauthorizedOperation,
    PartialToolUpdate,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub index: u32,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneError {
    pub kind: ErrorKind,
    pub message: String,
}

/// One record of a `converseStream` response. Ordering guarantee: text deltas
/// for a single call are monotonic and concatenate to the full answer; a
/// `Cost` event is emitted at most once and only before `Done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConverseResponse {
    Text {
        text: String,
    },
    Reasoning {
        reasoning: String,
    },
    CitationEvent {
        citation: Citation,
    },
    CostEvent {
        cost: UsageCost,
    },
    Done {
        done: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<DoneError>,
    },
}

impl ConverseResponse {
    pub fn done() -> Self {
        ConverseResponse::Done {
            done: true,
            error: None,
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        ConverseResponse::Done {
            done: true,
            error: Some(DoneError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ConverseResponse::Done { .. })
    }
}

/// Non-streaming aggregate response: `(text, cost)` as in spec.md §4.2.
#[derive(Debug, Clone, Default)]
pub struct ConverseOutcome {
    pub text: String,
    pub reasoning: Option<String>,
    pub citations: Vec<Citation>,
    pub cost: Option<UsageCost>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_serializes_flat() {
        let event = ConverseResponse::Text {
            text: "partial".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"text":"partial"}"#);
    }

    #[test]
    fn done_without_error_omits_error_field() {
        let event = ConverseResponse::done();
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"done":true}"#);
    }

    #[test]
    fn done_with_error_includes_kind_and_message() {
        let event = ConverseResponse::failed(ErrorKind::Cancelled, "cancelled by caller");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["done"], true);
        assert_eq!(json["error"]["kind"], "cancelled");
    }
}
