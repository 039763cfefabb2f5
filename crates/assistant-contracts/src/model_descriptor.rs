// ModelDescriptor: immutable mapping from a logical model id to a backend + wire name.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackendTag {
    AwsBedrock,
    OpenAI,
    Ollama,
    Together,
    Fireworks,
    GoogleAI,
    VertexAI,
}

impl BackendTag {
    /// Deterministic selection priority from highest to lowest, per §4.1.
    pub const PRIORITY: [BackendTag; 7] = [
        BackendTag::AwsBedrock,
        BackendTag::OpenAI,
        BackendTag::Ollama,
        BackendTag::Together,
        BackendTag::Fireworks,
        BackendTag::GoogleAI,
        BackendTag::VertexAI,
    ];
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub reasoning: bool,
    pub websearch: bool,
    pub deep_research: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub model_id: String,
    pub backend: BackendTag,
    /// The name sent over the wire to the backend's API.
    pub wire_name: String,
    pub capabilities: ModelCapabilities,
    pub label: String,
    pub description: String,
}

/// Vertex fronts two model families; the wire name decides the sub-backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSubBackend {
    Google,
    Anthropic,
}

impl ModelDescriptor {
    /// Model names containing "gemini" route to the Google sub-backend; anything
    /// else routes to Anthropic-on-Vertex.
    pub fn vertex_sub_backend(&self) -> VertexSubBackend {
        if self.wire_name.to_lowercase().contains("gemini") {
            VertexSubBackend::Google
        } else {
            VertexSubBackend::Anthropic
        }
    }
}
