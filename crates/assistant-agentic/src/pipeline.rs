// Agentic Query Pipeline (spec.md §4.5): higher-level operations built on
// top of a single `Driver` and the tolerant JSON parser in
// `assistant-core::json_extract`. Each method assembles a prompt with
// `crate::prompts`, calls the driver, and shapes the result into the type
// the operation's name promises — never panicking on malformed model
// output, per C4's "total parser" guarantee.

use std::pin::Pin;

use assistant_contracts::{Citation, ConverseResponse, Message, Role, Tool};
use assistant_core::{json_extract, ConverseParams, ConverseStream, Driver, Result};
use futures::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::agent_prompt::AgentPrompt;
use crate::prompts::{self, PromptVariant};

/// The sentinel the model emits between its reasoning and its answer, per
/// spec.md §4.5's tie-break: text before this token is reasoning, text
/// after it is the answer.
pub const END_OF_THINKING_TOKEN: &str = "</think>";

/// Splits model text on `END_OF_THINKING_TOKEN`. Text with no sentinel is
/// treated entirely as the answer (no reasoning channel).
pub fn split_reasoning_and_answer(text: &str) -> (Option<String>, String) {
    match text.find(END_OF_THINKING_TOKEN) {
        Some(pos) => {
            let reasoning = text[..pos].trim().to_string();
            let answer = text[pos + END_OF_THINKING_TOKEN.len()..].trim().to_string();
            (Some(reasoning), answer)
        }
        None => (None, text.trim().to_string()),
    }
}

/// `{tool, arguments, queryRewrite, reasoning?}`, per `generateToolSelectionOutput`.
#[derive(Debug, Clone, Default)]
pub struct ToolSelectionOutput {
    pub tool: Option<String>,
    pub arguments: Value,
    pub query_rewrite: Option<String>,
    pub reasoning: Option<String>,
}

impl ToolSelectionOutput {
    fn from_value(value: &Value) -> Self {
        Self {
            tool: value.get("tool").and_then(Value::as_str).map(str::to_string),
            arguments: value.get("arguments").cloned().unwrap_or(Value::Null),
            query_rewrite: value
                .get("queryRewrite")
                .and_then(Value::as_str)
                .map(str::to_string),
            reasoning: value
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Result of `analyzeInitialResultsOrRewrite[V2]`.
#[derive(Debug, Clone)]
pub enum RetrievalDecision {
    Sufficient,
    Rewrite(String),
}

/// A RAG answer plus its citations, the shared shape returned by
/// `baselineRAGJson`, `generateAnswerBasedOnToolOutput`'s non-streaming
/// sibling, and `generateSynthesisBasedOnToolOutput`.
#[derive(Debug, Clone, Default)]
pub struct RagAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl RagAnswer {
    fn from_value(value: &Value) -> Self {
        let answer = value
            .get("answer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let citations = value
            .get("citations")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| {
                        let index = c.get("index")?.as_u64()? as u32;
                        let url = c.get("url")?.as_str()?.to_string();
                        Some(Citation { index, url })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { answer, citations }
    }
}

/// Inputs shared by `baselineRAG`/`baselineRAGJson`/`baselineRAGJsonStream`
/// — the three entry points select the same prompt variant, per spec.md
/// §4.5's selection rules, and differ only in invocation mode and return
/// shape.
pub struct BaselineRagRequest<'a> {
    pub user_query: &'a str,
    pub user_ctx: &'a str,
    pub retrieved_ctx: &'a str,
    pub date_string: &'a str,
    pub agent_prompt: &'a AgentPrompt,
    /// Caller indicated the retrieved bundle is a specific-files selection.
    pub specific_files: bool,
    /// The specific-files bundle is a knowledge-base row set (rather than
    /// whole documents) — only meaningful when `specific_files` is set.
    pub kb_item_bundle: bool,
    pub reasoning: bool,
}

fn select_baseline_variant(req: &BaselineRagRequest) -> PromptVariant {
    if req.specific_files && req.kb_item_bundle {
        PromptVariant::KbItemsJson
    } else if req.specific_files {
        PromptVariant::FilesContextJson
    } else if req.reasoning {
        PromptVariant::BaselineReasoningJson
    } else {
        PromptVariant::BaselineJson
    }
}

/// Orchestrates C5's higher-level operations over a single model-agnostic
/// `Driver`. Generic over the driver implementation so callers can plug in
/// whichever backend `assistant-agentic::provider_factory` built.
pub struct AgenticPipeline<D: Driver> {
    driver: D,
    model_id: String,
}

impl<D: Driver> AgenticPipeline<D> {
    pub fn new(driver: D, model_id: impl Into<String>) -> Self {
        Self {
            driver,
            model_id: model_id.into(),
        }
    }

    fn base_params(&self, system_prompt: String, json: bool, reasoning: bool) -> ConverseParams {
        ConverseParams::new(self.model_id.clone())
            .with_system_prompt(system_prompt)
            .with_json(json)
            .with_reasoning(reasoning)
    }

    async fn converse_text(&self, params: &ConverseParams, messages: Vec<Message>) -> Result<String> {
        let outcome = self.driver.converse(messages, params).await?;
        Ok(outcome.text)
    }

    /// Single call returning a stream; the prompt is the caller-supplied
    /// `optimized_prompt` (or its agent variant) composed with retrieved
    /// context, not one of the enumerated `PromptVariant`s.
    pub async fn answer_or_search(
        &self,
        optimized_prompt: &str,
        retrieved_ctx: &str,
        date_string: &str,
        agent_prompt: &AgentPrompt,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let system_prompt = prompts::assemble_with_instructions(
            optimized_prompt,
            "",
            retrieved_ctx,
            date_string,
            agent_prompt,
        );
        let params = self.base_params(system_prompt, false, false);
        self.driver.converse_stream(messages, &params, cancel).await
    }

    /// Sync, plain-text entry point: shares prompt selection with
    /// `baseline_rag_json`/`baseline_rag_json_stream`, but extracts the
    /// `answer` field into plain text for callers that don't want JSON.
    pub async fn baseline_rag(&self, req: &BaselineRagRequest<'_>) -> Result<String> {
        let answer = self.baseline_rag_json(req).await?;
        Ok(answer.answer)
    }

    /// Sync JSON entry point: returns the full parsed `{answer, citations}`.
    pub async fn baseline_rag_json(&self, req: &BaselineRagRequest<'_>) -> Result<RagAnswer> {
        let variant = select_baseline_variant(req);
        let system_prompt = prompts::assemble(
            variant,
            req.user_ctx,
            req.retrieved_ctx,
            req.date_string,
            req.agent_prompt,
        );
        let params = self.base_params(system_prompt, true, req.reasoning);
        let messages = vec![Message::text(Role::User, req.user_query)];
        let text = self.converse_text(&params, messages).await?;
        let (_, answer_text) = split_reasoning_and_answer(&text);
        let value = json_extract::parse(&answer_text, Some("\"answer\":"));
        Ok(RagAnswer::from_value(&value))
    }

    /// Streaming JSON entry point: returns the raw stream so the caller can
    /// progressively re-parse accumulated text with `json_extract::parse`
    /// as it grows, per C4's streaming contract.
    pub async fn baseline_rag_json_stream(
        &self,
        req: &BaselineRagRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let variant = select_baseline_variant(req);
        let system_prompt = prompts::assemble(
            variant,
            req.user_ctx,
            req.retrieved_ctx,
            req.date_string,
            req.agent_prompt,
        );
        let params = self.base_params(system_prompt, true, req.reasoning);
        let messages = vec![Message::text(Role::User, req.user_query)];
        self.driver.converse_stream(messages, &params, cancel).await
    }

    /// Fans a user query into N rewrite candidates; returns the trimmed
    /// list (empty entries dropped).
    pub async fn rewrite_query(&self, user_query: &str, date_string: &str) -> Result<Vec<String>> {
        let system_prompt = prompts::assemble(
            PromptVariant::QueryRewriteJson,
            "",
            "",
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"rewrites\":"));
        Ok(string_array_field(&value, "rewrites"))
    }

    /// Decides whether `retrieved_ctx` is sufficient to answer `user_query`,
    /// or whether a rewritten query should drive a second retrieval round.
    pub async fn analyze_initial_results_or_rewrite(
        &self,
        user_query: &str,
        retrieved_ctx: &str,
        date_string: &str,
    ) -> Result<RetrievalDecision> {
        self.analyze_initial_results_inner(user_query, retrieved_ctx, date_string, &[])
            .await
    }

    /// V2: same decision, additionally aware of rewrites already tried in
    /// this turn so it doesn't suggest repeating one.
    pub async fn analyze_initial_results_or_rewrite_v2(
        &self,
        user_query: &str,
        retrieved_ctx: &str,
        date_string: &str,
        previous_rewrites: &[String],
    ) -> Result<RetrievalDecision> {
        self.analyze_initial_results_inner(user_query, retrieved_ctx, date_string, previous_rewrites)
            .await
    }

    async fn analyze_initial_results_inner(
        &self,
        user_query: &str,
        retrieved_ctx: &str,
        date_string: &str,
        previous_rewrites: &[String],
    ) -> Result<RetrievalDecision> {
        let mut user_ctx = String::new();
        if !previous_rewrites.is_empty() {
            user_ctx.push_str("Previously tried rewrites (do not repeat): ");
            user_ctx.push_str(&previous_rewrites.join(" | "));
        }
        let system_prompt = prompts::assemble_with_instructions(
            "Decide whether the retrieved context below is sufficient to answer \
             the user's question. Respond with a single JSON object: \
             {\"sufficient\": boolean, \"rewrittenQuery\": string | null}.",
            &user_ctx,
            retrieved_ctx,
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"sufficient\":"));
        let sufficient = value.get("sufficient").and_then(Value::as_bool).unwrap_or(true);
        if sufficient {
            Ok(RetrievalDecision::Sufficient)
        } else {
            let rewrite = value
                .get("rewrittenQuery")
                .and_then(Value::as_str)
                .unwrap_or(user_query)
                .to_string();
            Ok(RetrievalDecision::Rewrite(rewrite))
        }
    }

    /// Given the user query, the enabled tool catalog, and past actions,
    /// decides whether a tool call would help and which one.
    pub async fn generate_tool_selection_output(
        &self,
        user_query: &str,
        tool_catalog: &[Tool],
        past_actions: &[String],
        date_string: &str,
    ) -> Result<ToolSelectionOutput> {
        let catalog_listing = tool_catalog
            .iter()
            .filter(|t| t.enabled)
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let mut user_ctx = format!("Available tools:\n{catalog_listing}");
        if !past_actions.is_empty() {
            user_ctx.push_str("\n\nPast actions this turn:\n");
            user_ctx.push_str(&past_actions.join("\n"));
        }
        let system_prompt = prompts::assemble(
            PromptVariant::ToolSelection,
            &user_ctx,
            "",
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"tool\":"));
        Ok(ToolSelectionOutput::from_value(&value))
    }

    /// Given tool output and the original query, streams the final answer.
    pub async fn generate_answer_based_on_tool_output(
        &self,
        user_query: &str,
        tool_output: &str,
        date_string: &str,
        agent_prompt: &AgentPrompt,
        cancel: CancellationToken,
    ) -> Result<ConverseStream> {
        let system_prompt = prompts::assemble(
            PromptVariant::Baseline,
            "",
            tool_output,
            date_string,
            agent_prompt,
        );
        let params = self.base_params(system_prompt, false, false);
        let messages = vec![Message::text(Role::User, user_query)];
        self.driver.converse_stream(messages, &params, cancel).await
    }

    /// Collapses gathered fragments into a final answer.
    pub async fn generate_synthesis_based_on_tool_output(
        &self,
        fragments: &[String],
        date_string: &str,
    ) -> Result<RagAnswer> {
        let retrieved_ctx = fragments.join("\n\n");
        let system_prompt = prompts::assemble(
            PromptVariant::Synthesis,
            "",
            &retrieved_ctx,
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, "Synthesize the fragments above.")];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"answer\":"));
        Ok(RagAnswer::from_value(&value))
    }

    /// When search yields no usable context, emits a structured reasoning
    /// explanation rather than a bare empty answer.
    pub async fn generate_fallback(&self, user_query: &str, date_string: &str) -> Result<String> {
        let system_prompt = prompts::assemble(
            PromptVariant::BaselineReasoningJson,
            "",
            "",
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, true);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = match self.converse_text(&params, messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "driver call failed generating fallback reasoning");
                return Ok("No reasoning provided".to_string());
            }
        };
        let value = json_extract::parse(&text, Some("\"reasoning\":"));
        Ok(value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Resolves human names mentioned in `user_query` to email addresses
    /// using `retrieved_ctx`.
    pub async fn extract_emails_from_context(
        &self,
        user_query: &str,
        retrieved_ctx: &str,
        date_string: &str,
    ) -> Result<Vec<String>> {
        let system_prompt = prompts::assemble(
            PromptVariant::EmailJson,
            "",
            retrieved_ctx,
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"emails\":"));
        Ok(string_array_field(&value, "emails"))
    }

    /// Asks the model to rank retrieved passages, returning the integer
    /// index list parsed from a `<indexes>…</indexes>` tag — not JSON, so
    /// this bypasses `json_extract` entirely.
    pub async fn extract_best_document_indexes(
        &self,
        user_query: &str,
        retrieved_ctx: &str,
        date_string: &str,
    ) -> Result<Vec<u32>> {
        let system_prompt = prompts::assemble(
            PromptVariant::Baseline,
            "Rank the retrieved passages by relevance and return only the best ones, \
             wrapped as <indexes>1,2,3</indexes>.",
            retrieved_ctx,
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, false, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        Ok(parse_indexes_tag(&text))
    }

    /// Generates a short conversation title; defaults to `"Untitled"` on
    /// parse failure rather than propagating an error.
    pub async fn generate_title_using_query(&self, user_query: &str) -> Result<String> {
        let system_prompt = prompts::assemble(
            PromptVariant::TitleGeneration,
            "",
            "",
            "",
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, user_query)];
        let text = self.converse_text(&params, messages).await?;
        let value = json_extract::parse(&text, Some("\"title\":"));
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if title.is_none() {
            warn!("title generation produced no usable title, defaulting to Untitled");
        }
        Ok(title.unwrap_or_else(|| "Untitled".to_string()))
    }

    /// Invalid (empty, or non-string) entries are filtered out rather than
    /// rejecting the whole batch.
    pub async fn generate_follow_up_questions(
        &self,
        conversation: &str,
        date_string: &str,
    ) -> Result<Vec<String>> {
        let system_prompt = prompts::assemble(
            PromptVariant::FollowUp,
            conversation,
            "",
            date_string,
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, true, false);
        let messages = vec![Message::text(Role::User, conversation)];
        let text = match self.converse_text(&params, messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "driver call failed generating follow-up questions");
                return Ok(Vec::new());
            }
        };
        let value = json_extract::parse(&text, Some("\"questions\":"));
        Ok(string_array_field(&value, "questions"))
    }

    /// Turns a free-text requirements description into an agent persona
    /// prompt body (plain text, not JSON — this feeds `agentPrompt`, which
    /// is itself parsed tolerantly rather than as a fixed schema).
    pub async fn generate_prompt_from_requirements(&self, requirements: &str) -> Result<String> {
        let system_prompt = prompts::assemble_with_instructions(
            "Write a concise system-prompt persona description satisfying the \
             requirements below. Respond in plain prose, not JSON.",
            requirements,
            "",
            "",
            &AgentPrompt::default(),
        );
        let params = self.base_params(system_prompt, false, false);
        let messages = vec![Message::text(Role::User, requirements)];
        self.converse_text(&params, messages).await
    }
}

/// Extracts a `Vec<String>` from `value[field]`, dropping non-string and
/// empty entries rather than failing the whole extraction.
fn string_array_field(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `<indexes>1,2,3</indexes>` into `[1, 2, 3]`; non-numeric entries
/// are skipped, never failing the whole parse.
fn parse_indexes_tag(text: &str) -> Vec<u32> {
    let Some(start) = text.find("<indexes>") else {
        return Vec::new();
    };
    let rest = &text[start + "<indexes>".len()..];
    let Some(end) = rest.find("</indexes>") else {
        return Vec::new();
    };
    rest[..end]
        .split(',')
        .filter_map(|s| s.trim().parse::<u32>().ok())
        .collect()
}

/// Adapter stream type used by callers that need `Pin<Box<dyn Stream<...>>>`
/// without importing `futures` directly.
pub type BoxedResponseStream = Pin<Box<dyn Stream<Item = ConverseResponse> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_reasoning_and_answer_splits_on_sentinel() {
        let text = "I should check the dates first.</think>The answer is 42.";
        let (reasoning, answer) = split_reasoning_and_answer(text);
        assert_eq!(reasoning.unwrap(), "I should check the dates first.");
        assert_eq!(answer, "The answer is 42.");
    }

    #[test]
    fn split_reasoning_and_answer_without_sentinel_is_all_answer() {
        let (reasoning, answer) = split_reasoning_and_answer("Just the answer.");
        assert!(reasoning.is_none());
        assert_eq!(answer, "Just the answer.");
    }

    #[test]
    fn parse_indexes_tag_extracts_ints_and_skips_garbage() {
        let text = "Here you go: <indexes>1, 2, foo, 4</indexes>";
        assert_eq!(parse_indexes_tag(text), vec![1, 2, 4]);
    }

    #[test]
    fn parse_indexes_tag_missing_returns_empty() {
        assert!(parse_indexes_tag("no tag here").is_empty());
    }

    #[test]
    fn string_array_field_filters_blank_entries() {
        let value = serde_json::json!({"questions": ["valid?", "", "  ", "also valid?"]});
        let out = string_array_field(&value, "questions");
        assert_eq!(out, vec!["valid?".to_string(), "also valid?".to_string()]);
    }

    #[test]
    fn rag_answer_from_value_defaults_on_missing_fields() {
        let value = serde_json::json!({});
        let answer = RagAnswer::from_value(&value);
        assert_eq!(answer.answer, "");
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn tool_selection_output_from_value_handles_null_tool() {
        let value = serde_json::json!({"tool": null, "arguments": {}, "queryRewrite": null});
        let parsed = ToolSelectionOutput::from_value(&value);
        assert!(parsed.tool.is_none());
        assert!(parsed.reasoning.is_none());
    }
}
