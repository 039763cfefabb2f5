// Builds the boxed `Driver` for whichever backend the registry selected.
//
// This is where the workspace's only three-way dependency on the driver
// crates lives, by design: `assistant-core::registry` resolves *which*
// backend is active but can't construct a client for it without depending
// on `assistant-openai`/`assistant-anthropic`/`assistant-google`, which
// would create a cycle (those crates depend on `assistant-core` for the
// `Driver` trait). Resolving env vars into live clients belongs one layer
// up, here.

use assistant_anthropic::BedrockAnthropicDriver;
use assistant_contracts::{BackendTag, ModelDescriptor, VertexSubBackend};
use assistant_core::{CoreError, Driver, EnvConfig, Result};
use assistant_google::{GoogleAiDriver, VertexAnthropicDriver, VertexGeminiDriver};
use assistant_openai::OpenAiCompatDriver;

/// Constructs the driver for the active backend, or `NoProviderConfigured`
/// if the environment doesn't satisfy any backend's requirements.
///
/// Vertex is special-cased: it fronts two model families (Gemini vs
/// Anthropic) behind the same project/region, so which concrete driver
/// gets built depends on the caller's chosen `ModelDescriptor`, not only on
/// `BackendTag`. For Vertex, pass the descriptor the caller intends to use.
pub fn build_driver(
    config: &EnvConfig,
    backend: BackendTag,
    descriptor_for_vertex: Option<&ModelDescriptor>,
) -> Result<Box<dyn Driver>> {
    match backend {
        BackendTag::AwsBedrock => {
            let region = config
                .aws_region
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            let access_key_id = config
                .aws_access_key_id
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            let secret_access_key = config
                .aws_secret_access_key
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            Ok(Box::new(BedrockAnthropicDriver::new(
                region,
                access_key_id,
                secret_access_key,
                config.aws_session_token.clone(),
            )))
        }
        BackendTag::OpenAI => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            Ok(Box::new(OpenAiCompatDriver::openai(
                api_key,
                config.openai_base_url.clone(),
            )))
        }
        BackendTag::Ollama => {
            let host = config
                .ollama_host
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok(Box::new(OpenAiCompatDriver::ollama(host)))
        }
        BackendTag::Together => {
            let api_key = config
                .together_api_key
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            Ok(Box::new(OpenAiCompatDriver::together(api_key)))
        }
        BackendTag::Fireworks => {
            let api_key = config
                .fireworks_api_key
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            Ok(Box::new(OpenAiCompatDriver::fireworks(api_key)))
        }
        BackendTag::GoogleAI => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            Ok(Box::new(GoogleAiDriver::new(api_key)))
        }
        BackendTag::VertexAI => {
            let project_id = config
                .vertex_project_id
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            let region = config
                .vertex_region
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            let access_token = config
                .vertex_access_token
                .clone()
                .ok_or(CoreError::NoProviderConfigured)?;
            let sub_backend = descriptor_for_vertex
                .map(|d| d.vertex_sub_backend())
                .or_else(|| match config.vertex_provider.as_deref() {
                    Some(s) if s.eq_ignore_ascii_case("anthropic") => {
                        Some(VertexSubBackend::Anthropic)
                    }
                    Some(s) if s.eq_ignore_ascii_case("google") => Some(VertexSubBackend::Google),
                    _ => None,
                })
                .unwrap_or(VertexSubBackend::Google);
            match sub_backend {
                VertexSubBackend::Google => Ok(Box::new(VertexGeminiDriver::new(
                    project_id,
                    region,
                    access_token,
                ))),
                VertexSubBackend::Anthropic => Ok(Box::new(VertexAnthropicDriver::new(
                    project_id,
                    region,
                    access_token,
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_backend_env_yields_no_provider_configured() {
        let config = EnvConfig::default();
        let err = build_driver(&config, BackendTag::OpenAI, None).unwrap_err();
        assert!(matches!(err, CoreError::NoProviderConfigured));
    }

    #[test]
    fn openai_builds_with_api_key_only() {
        let config = EnvConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert!(build_driver(&config, BackendTag::OpenAI, None).is_ok());
    }

    #[test]
    fn vertex_routes_to_google_sub_backend_by_default() {
        let config = EnvConfig {
            vertex_project_id: Some("proj".to_string()),
            vertex_region: Some("us-central1".to_string()),
            vertex_access_token: Some("token".to_string()),
            ..Default::default()
        };
        assert!(build_driver(&config, BackendTag::VertexAI, None).is_ok());
    }
}
