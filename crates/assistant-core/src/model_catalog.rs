// Static ModelDescriptor tables for backends that expose a fixed model
// lineup. Dynamic backends (Ollama, Together, Fireworks, GoogleAI, Vertex)
// have no static table here — their single configured model is surfaced
// directly by the registry instead.

use assistant_contracts::{BackendTag, ModelCapabilities, ModelDescriptor};

fn descriptor(
    model_id: &str,
    backend: BackendTag,
    wire_name: &str,
    capabilities: ModelCapabilities,
    label: &str,
    description: &str,
) -> ModelDescriptor {
    ModelDescriptor {
        model_id: model_id.to_string(),
        backend,
        wire_name: wire_name.to_string(),
        capabilities,
        label: label.to_string(),
        description: description.to_string(),
    }
}

pub fn openai_descriptors() -> Vec<ModelDescriptor> {
    vec![
        descriptor(
            "gpt-4o",
            BackendTag::OpenAI,
            "gpt-4o",
            ModelCapabilities {
                reasoning: false,
                websearch: true,
                deep_research: false,
            },
            "GPT-4o",
            "OpenAI's flagship multimodal chat model.",
        ),
        descriptor(
            "gpt-4o-mini",
            BackendTag::OpenAI,
            "gpt-4o-mini",
            ModelCapabilities::default(),
            "GPT-4o mini",
            "Smaller, faster GPT-4o variant.",
        ),
        descriptor(
            "o1",
            BackendTag::OpenAI,
            "o1",
            ModelCapabilities {
                reasoning: true,
                websearch: false,
                deep_research: true,
            },
            "o1",
            "Reasoning-first OpenAI model.",
        ),
    ]
}

pub fn bedrock_descriptors() -> Vec<ModelDescriptor> {
    vec![
        descriptor(
            "claude-3-5-sonnet",
            BackendTag::AwsBedrock,
            "anthropic.claude-3-5-sonnet-20241022-v2:0",
            ModelCapabilities {
                reasoning: true,
                websearch: false,
                deep_research: false,
            },
            "Claude 3.5 Sonnet (Bedrock)",
            "Anthropic's Claude 3.5 Sonnet, served through AWS Bedrock.",
        ),
        descriptor(
            "claude-3-5-haiku",
            BackendTag::AwsBedrock,
            "anthropic.claude-3-5-haiku-20241022-v1:0",
            ModelCapabilities::default(),
            "Claude 3.5 Haiku (Bedrock)",
            "Fast, low-cost Claude variant, served through AWS Bedrock.",
        ),
    ]
}

pub fn static_descriptors_for(backend: BackendTag) -> Vec<ModelDescriptor> {
    match backend {
        BackendTag::OpenAI => openai_descriptors(),
        BackendTag::AwsBedrock => bedrock_descriptors(),
        // Dynamic backends have no static table; the registry surfaces the
        // single configured model name instead.
        BackendTag::Ollama
        | BackendTag::Together
        | BackendTag::Fireworks
        | BackendTag::GoogleAI
        | BackendTag::VertexAI => Vec::new(),
    }
}
