// Configuration & Provider Registry (spec.md §4.1).
//
// Resolves which LLM backend is active from environment variables and maps
// logical model identifiers to `ModelDescriptor`s. At most one backend is
// active per process; initialization is lazy and idempotent (see
// assistant-agentic::provider_factory, which owns the actual driver clients
// built from this registry's `active_provider()`).

use assistant_contracts::{BackendTag, ModelDescriptor, VertexSubBackend};

use crate::error::{CoreError, Result};
use crate::model_catalog::static_descriptors_for;

/// Raw environment configuration, read once at registry construction.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,

    pub ollama_model: Option<String>,
    pub ollama_host: Option<String>,

    pub together_api_key: Option<String>,
    pub together_model: Option<String>,

    pub fireworks_api_key: Option<String>,
    pub fireworks_model: Option<String>,

    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,

    pub vertex_project_id: Option<String>,
    pub vertex_region: Option<String>,
    pub vertex_provider: Option<String>,
    /// Pre-minted bearer access token for Vertex calls (e.g. from
    /// `gcloud auth print-access-token` or workload identity). Not one of
    /// the sixteen backend-selection env vars in spec.md §6 — Vertex's
    /// own OAuth2 token exchange is out of scope for this driver (see
    /// DESIGN.md), so the token has to come from somewhere.
    pub vertex_access_token: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            aws_region: std::env::var("AWS_REGION").ok(),
            aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            aws_session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            ollama_model: std::env::var("OLLAMA_MODEL").ok(),
            ollama_host: std::env::var("OLLAMA_HOST").ok(),
            together_api_key: std::env::var("TOGETHER_API_KEY").ok(),
            together_model: std::env::var("TOGETHER_MODEL").ok(),
            fireworks_api_key: std::env::var("FIREWORKS_API_KEY").ok(),
            fireworks_model: std::env::var("FIREWORKS_MODEL").ok(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gemini_model: std::env::var("GEMINI_MODEL").ok(),
            vertex_project_id: std::env::var("VERTEX_PROJECT_ID").ok(),
            vertex_region: std::env::var("VERTEX_REGION").ok(),
            vertex_provider: std::env::var("VERTEX_PROVIDER").ok(),
            vertex_access_token: std::env::var("VERTEX_ACCESS_TOKEN").ok(),
        }
    }

    fn has_backend(&self, backend: BackendTag) -> bool {
        match backend {
            BackendTag::AwsBedrock => {
                self.aws_region.is_some()
                    && self.aws_access_key_id.is_some()
                    && self.aws_secret_access_key.is_some()
            }
            BackendTag::OpenAI => self.openai_api_key.is_some(),
            BackendTag::Ollama => self.ollama_model.is_some(),
            BackendTag::Together => {
                self.together_api_key.is_some() && self.together_model.is_some()
            }
            BackendTag::Fireworks => {
                self.fireworks_api_key.is_some() && self.fireworks_model.is_some()
            }
            BackendTag::GoogleAI => self.gemini_api_key.is_some(),
            BackendTag::VertexAI => {
                self.vertex_project_id.is_some() && self.vertex_region.is_some()
            }
        }
    }

    /// The single configured model name for a dynamic backend, if any.
    fn dynamic_model_name(&self, backend: BackendTag) -> Option<String> {
        match backend {
            BackendTag::Ollama => self.ollama_model.clone(),
            BackendTag::Together => self.together_model.clone(),
            BackendTag::Fireworks => self.fireworks_model.clone(),
            BackendTag::GoogleAI => self.gemini_model.clone(),
            // Vertex has no dedicated model-name env var (spec.md §6's list
            // stops at `VERTEX_PROVIDER`), and `vertex_project_id`/`region`
            // only address the endpoint, not the model — so the configured
            // Gemini model name is the closest stand-in for "the model this
            // process is dynamically configured for" on Vertex too, same as
            // it is for GoogleAI.
            BackendTag::VertexAI => self.gemini_model.clone(),
            BackendTag::AwsBedrock | BackendTag::OpenAI => None,
        }
    }
}

/// Process-wide registry value. Lazy, idempotent, constructed once at boot
/// and shared via `Arc` (see the "process-wide Registry value" design note
/// in spec.md §9).
#[derive(Debug, Clone)]
pub struct Registry {
    config: EnvConfig,
}

impl Registry {
    pub fn new(config: EnvConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(EnvConfig::from_env())
    }

    /// Deterministic priority: AwsBedrock ▸ OpenAI ▸ Ollama ▸ Together ▸
    /// Fireworks ▸ GoogleAI ▸ VertexAI. At most one is active per process.
    pub fn active_provider(&self) -> Option<BackendTag> {
        BackendTag::PRIORITY
            .into_iter()
            .find(|backend| self.config.has_backend(*backend))
    }

    /// Resolves a logical model id to its descriptor, scoped to the active
    /// backend only.
    pub fn descriptor_for_model(&self, model_id: &str) -> Result<ModelDescriptor> {
        let active = self.active_provider().ok_or(CoreError::NoProviderConfigured)?;

        if let Some(found) = static_descriptors_for(active)
            .into_iter()
            .find(|d| d.model_id == model_id)
        {
            return Ok(found);
        }

        // Dynamic backends: the configured model name can be addressed directly.
        if let Some(dynamic_name) = self.config.dynamic_model_name(active) {
            if dynamic_name == model_id {
                return Ok(ModelDescriptor {
                    model_id: dynamic_name.clone(),
                    backend: active,
                    wire_name: dynamic_name.clone(),
                    capabilities: Default::default(),
                    label: dynamic_name.clone(),
                    description: format!("Dynamically configured {:?} model.", active),
                });
            }
        }

        Err(CoreError::InvalidModel(model_id.to_string()))
    }

    /// Only returns descriptors for the active backend, per spec.md §4.1.
    pub fn available_models(&self) -> Vec<ModelDescriptor> {
        let Some(active) = self.active_provider() else {
            return Vec::new();
        };

        let mut descriptors = static_descriptors_for(active);
        if descriptors.is_empty() {
            if let Some(dynamic_name) = self.config.dynamic_model_name(active) {
                descriptors.push(ModelDescriptor {
                    model_id: dynamic_name.clone(),
                    backend: active,
                    wire_name: dynamic_name.clone(),
                    capabilities: Default::default(),
                    label: dynamic_name.clone(),
                    description: format!("Dynamically configured {:?} model.", active),
                });
            }
        }
        descriptors
    }

    /// Reverse lookup by human label, scoped to the active backend; falls
    /// back to direct equality with a dynamic model name.
    pub fn resolve_by_label(&self, human_label: &str) -> Option<String> {
        self.available_models()
            .into_iter()
            .find(|d| d.label == human_label || d.model_id == human_label)
            .map(|d| d.model_id)
    }

    /// For Vertex-backed descriptors, decides the Google vs Anthropic
    /// sub-backend from the wire name.
    pub fn vertex_sub_backend(&self, descriptor: &ModelDescriptor) -> Option<VertexSubBackend> {
        if descriptor.backend == BackendTag::VertexAI {
            Some(descriptor.vertex_sub_backend())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_openai() -> EnvConfig {
        EnvConfig {
            openai_api_key: Some("k".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn openai_only_selects_openai_as_active() {
        let registry = Registry::new(config_with_openai());
        assert_eq!(registry.active_provider(), Some(BackendTag::OpenAI));
    }

    #[test]
    fn available_models_only_lists_active_backend_descriptors() {
        let registry = Registry::new(config_with_openai());
        let models = registry.available_models();
        assert!(!models.is_empty());
        assert!(models.iter().all(|m| m.backend == BackendTag::OpenAI));
    }

    #[test]
    fn no_backend_configured_yields_none_and_errors_on_lookup() {
        let registry = Registry::new(EnvConfig::default());
        assert_eq!(registry.active_provider(), None);
        assert!(matches!(
            registry.descriptor_for_model("gpt-4o"),
            Err(CoreError::NoProviderConfigured)
        ));
    }

    #[test]
    fn resolve_by_label_round_trips_every_active_descriptor() {
        let registry = Registry::new(config_with_openai());
        for descriptor in registry.available_models() {
            assert_eq!(
                registry.resolve_by_label(&descriptor.label),
                Some(descriptor.model_id.clone())
            );
        }
    }

    #[test]
    fn aws_bedrock_outranks_openai_when_both_configured() {
        let config = EnvConfig {
            aws_region: Some("us-east-1".to_string()),
            aws_access_key_id: Some("id".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            openai_api_key: Some("k".to_string()),
            ..Default::default()
        };
        let registry = Registry::new(config);
        assert_eq!(registry.active_provider(), Some(BackendTag::AwsBedrock));
    }
}
