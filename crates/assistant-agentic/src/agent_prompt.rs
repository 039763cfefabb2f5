// Tolerant three-shape parser for the `agentPrompt` blob (spec.md §4.3).
//
// `agentPrompt` is an opaque string the caller may set when an agent
// persona should flavor the assembled system prompt. It is JSON-parsed
// tolerantly against three shapes, tried in order; the first that matches
// structurally wins. Parse failures — and a blob that parses but matches
// none of the three shapes — fall back to the empty prompt. This never
// fails the caller: an agent prompt is a courtesy, not a requirement.

use serde::Deserialize;
use serde_json::Value;

/// The parsed result of an `agentPrompt` blob, normalized to the two
/// fields every prompt-assembly variant actually needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPrompt {
    pub prompt: String,
    pub sources: Vec<String>,
}

impl AgentPrompt {
    /// An agent prompt with no persona text and no bound sources — the
    /// non-agent prompt variant should be used when this holds.
    pub fn is_empty(&self) -> bool {
        self.prompt.is_empty() && self.sources.is_empty()
    }
}

#[derive(Deserialize)]
struct StructuredForm {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    description: String,
    prompt: String,
    #[serde(default, rename = "appIntegrations")]
    app_integrations: Vec<String>,
}

#[derive(Deserialize)]
struct PromptSourcesForm {
    prompt: String,
    #[serde(default)]
    sources: Vec<String>,
}

/// Parses the blob against, in order: the structured `{name, description,
/// prompt, appIntegrations}` shape, the `{prompt, sources}` shape, and
/// finally a plain non-empty string treated as a literal prompt body.
/// Never panics; a blob that matches nothing (or is `None`) yields the
/// empty `AgentPrompt`.
pub fn parse_agent_prompt(blob: Option<&str>) -> AgentPrompt {
    let Some(blob) = blob else {
        return AgentPrompt::default();
    };
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return AgentPrompt::default();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(structured) = serde_json::from_value::<StructuredForm>(value.clone()) {
            return AgentPrompt {
                prompt: structured.prompt,
                sources: structured.app_integrations,
            };
        }
        if let Ok(prompt_sources) = serde_json::from_value::<PromptSourcesForm>(value) {
            return AgentPrompt {
                prompt: prompt_sources.prompt,
                sources: prompt_sources.sources,
            };
        }
        // Parsed as JSON but matched neither known shape — not a literal
        // string either, so this falls back to empty rather than stuffing
        // a JSON blob into a prompt.
        return AgentPrompt::default();
    }

    // Not valid JSON at all: treat the whole blob as a literal prompt body.
    AgentPrompt {
        prompt: trimmed.to_string(),
        sources: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_form_parses_prompt_and_integrations() {
        let blob = r#"{"name":"Helper","description":"d","prompt":"Be terse.","appIntegrations":["slack"]}"#;
        let parsed = parse_agent_prompt(Some(blob));
        assert_eq!(parsed.prompt, "Be terse.");
        assert_eq!(parsed.sources, vec!["slack".to_string()]);
    }

    #[test]
    fn prompt_sources_form_parses() {
        let blob = r#"{"prompt":"Stay on topic.","sources":["kb-1"]}"#;
        let parsed = parse_agent_prompt(Some(blob));
        assert_eq!(parsed.prompt, "Stay on topic.");
        assert_eq!(parsed.sources, vec!["kb-1".to_string()]);
    }

    #[test]
    fn plain_string_is_treated_as_literal_prompt() {
        let parsed = parse_agent_prompt(Some("You are a helpful assistant."));
        assert_eq!(parsed.prompt, "You are a helpful assistant.");
        assert!(parsed.sources.is_empty());
    }

    #[test]
    fn none_and_empty_string_yield_empty_prompt() {
        assert!(parse_agent_prompt(None).is_empty());
        assert!(parse_agent_prompt(Some("")).is_empty());
        assert!(parse_agent_prompt(Some("   ")).is_empty());
    }

    #[test]
    fn malformed_json_never_panics_and_falls_back_to_empty() {
        // Looks like it wants to be JSON but isn't valid — since it's also
        // not parseable as a bare literal with meaningful content after
        // trimming brace noise, this still must not panic.
        let parsed = parse_agent_prompt(Some("{not valid json"));
        // Not valid JSON, so it's treated as a literal string instead.
        assert_eq!(parsed.prompt, "{not valid json");
    }

    #[test]
    fn json_object_matching_neither_shape_falls_back_to_empty() {
        let parsed = parse_agent_prompt(Some(r#"{"unrelated":"field"}"#));
        assert!(parsed.is_empty());
    }
}
