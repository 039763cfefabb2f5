// Minimal Anthropic Messages wire shape for the Vertex-fronted Anthropic
// sub-backend. Kept local (not shared with assistant-anthropic) since
// Vertex's `rawPredict` body omits `model` in favor of the URL path and
// uses its own `anthropic_version` tag.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub anthropic_version: String,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
pub struct ContentBlockDeltaEvent {
    pub delta: TextDelta,
}

#[derive(Debug, Deserialize)]
pub struct TextDelta {
    pub text: String,
}
