// Prompt assembly (spec.md §4.3): pure functions from
// `(userCtx, retrievedCtx, dateString, agentPrompt?)` to a system-prompt
// string. No I/O anywhere in this module — every function here is a total,
// deterministic transform over owned/borrowed strings, so the whole thing
// is unit-testable without a driver or a network.

use crate::agent_prompt::AgentPrompt;

/// One of the prompt shapes enumerated in spec.md §4.3. Each variant is
/// rendered in two flavors depending on whether an agent persona is
/// present — see `assemble`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    Baseline,
    BaselineJson,
    BaselineReasoningJson,
    FilesContextJson,
    KbItemsJson,
    EmailJson,
    MeetingJson,
    TemporalDirectionJson,
    QueryRewriteJson,
    ToolSelection,
    Synthesis,
    WebSearch,
    DeepResearch,
    FollowUp,
    TitleGeneration,
}

impl PromptVariant {
    /// The variant-specific instruction block, written as if to the model.
    fn instructions(self) -> &'static str {
        match self {
            PromptVariant::Baseline => {
                "Answer the user's question using only the context provided below. \
                 Respond in plain prose; do not wrap the answer in JSON."
            }
            PromptVariant::BaselineJson => {
                "Answer the user's question using only the context provided below. \
                 Respond with a single JSON object: {\"answer\": string, \"citations\": \
                 [{\"index\": number, \"url\": string}]}. Cite every fact using the \
                 bracketed citation tokens already present in the context."
            }
            PromptVariant::BaselineReasoningJson => {
                "Answer the user's question using only the context provided below. \
                 First think through the evidence, then respond with a single JSON \
                 object: {\"reasoning\": string, \"answer\": string, \"citations\": \
                 [{\"index\": number, \"url\": string}]}."
            }
            PromptVariant::FilesContextJson => {
                "The context below consists of whole source documents rather than \
                 short retrieved passages. Answer the user's question using only \
                 this context and respond with a single JSON object: {\"answer\": \
                 string, \"citations\": [{\"index\": number, \"url\": string}]}."
            }
            PromptVariant::KbItemsJson => {
                "The context below consists of knowledge-base rows. Answer the \
                 user's question using only this context and respond with a single \
                 JSON object: {\"answer\": string, \"citations\": [{\"index\": \
                 number, \"url\": string}]}."
            }
            PromptVariant::EmailJson => {
                "The context below is drawn from email messages. Answer the user's \
                 question, citing the specific messages relied upon, and respond \
                 with a single JSON object: {\"answer\": string, \"citations\": \
                 [{\"index\": number, \"url\": string}]}."
            }
            PromptVariant::MeetingJson => {
                "The context below is drawn from meeting transcripts or notes. \
                 Answer the user's question, citing the specific meetings relied \
                 upon, and respond with a single JSON object: {\"answer\": string, \
                 \"citations\": [{\"index\": number, \"url\": string}]}."
            }
            PromptVariant::TemporalDirectionJson => {
                "Classify the time-direction of the user's query relative to the \
                 current date below. Respond with a single JSON object: \
                 {\"direction\": \"past\" | \"present\" | \"future\" | \"none\"}."
            }
            PromptVariant::QueryRewriteJson => {
                "Rewrite the user's query into alternative phrasings that would \
                 retrieve complementary evidence. Respond with a single JSON \
                 object: {\"rewrites\": [string]}."
            }
            PromptVariant::ToolSelection => {
                "Given the user's query, the tool catalog, and any past actions \
                 below, decide whether a tool call would help and which one. \
                 Respond with a single JSON object: {\"tool\": string | null, \
                 \"arguments\": object, \"queryRewrite\": string | null, \
                 \"reasoning\": string | null}."
            }
            PromptVariant::Synthesis => {
                "Collapse the gathered fragments below into one coherent final \
                 answer to the user's question. Respond with a single JSON \
                 object: {\"answer\": string, \"citations\": [{\"index\": number, \
                 \"url\": string}]}."
            }
            PromptVariant::WebSearch => {
                "Answer the user's question, routing citations through the web \
                 index results provided below rather than internal documents. \
                 Respond with a single JSON object: {\"answer\": string, \
                 \"citations\": [{\"index\": number, \"url\": string}]}."
            }
            PromptVariant::DeepResearch => {
                "Perform a deeper synthesis across the web index results below, \
                 favoring completeness over brevity. Respond with a single JSON \
                 object: {\"answer\": string, \"citations\": [{\"index\": number, \
                 \"url\": string}]}."
            }
            PromptVariant::FollowUp => {
                "Suggest follow-up questions the user might ask next, grounded in \
                 the conversation below. Respond with a single JSON object: \
                 {\"questions\": [string]}."
            }
            PromptVariant::TitleGeneration => {
                "Generate a short title (under eight words) summarizing the \
                 conversation below. Respond with a single JSON object: \
                 {\"title\": string}."
            }
        }
    }

    /// Whether this variant's instructions already ask for a JSON envelope
    /// (used only for documentation/debugging — assembly itself doesn't
    /// branch on this).
    pub fn is_json(self) -> bool {
        !matches!(self, PromptVariant::Baseline)
    }
}

/// Rewrites `"Index N"` occurrences in retrieved context to `"[N]"`,
/// giving the model a stable, short citation token to echo back.
pub fn index_to_citation(retrieved_ctx: &str) -> String {
    let mut out = String::with_capacity(retrieved_ctx.len());
    let bytes = retrieved_ctx.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if retrieved_ctx[i..].starts_with("Index ") {
            let rest = &retrieved_ctx[i + "Index ".len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() {
                out.push('[');
                out.push_str(&digits);
                out.push(']');
                i += "Index ".len() + digits.len();
                continue;
            }
        }
        let ch = retrieved_ctx[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Assembles a full system prompt for `variant` from the pure inputs. When
/// `agent_prompt` is non-empty its persona text is prepended and its bound
/// sources are listed; an empty `agent_prompt` yields the plain (non-agent)
/// flavor of the variant with no further difference in structure.
pub fn assemble(
    variant: PromptVariant,
    user_ctx: &str,
    retrieved_ctx: &str,
    date_string: &str,
    agent_prompt: &AgentPrompt,
) -> String {
    assemble_with_instructions(
        variant.instructions(),
        user_ctx,
        retrieved_ctx,
        date_string,
        agent_prompt,
    )
}

/// Same structure as `assemble`, but for callers that already hold a
/// ready-made instruction block (e.g. `answerOrSearch`'s `optimizedPrompt`)
/// rather than one of the enumerated `PromptVariant`s.
pub fn assemble_with_instructions(
    instructions: &str,
    user_ctx: &str,
    retrieved_ctx: &str,
    date_string: &str,
    agent_prompt: &AgentPrompt,
) -> String {
    let cited_ctx = index_to_citation(retrieved_ctx);
    let mut out = String::new();

    if !agent_prompt.is_empty() {
        out.push_str(agent_prompt.prompt.trim());
        out.push_str("\n\n");
        if !agent_prompt.sources.is_empty() {
            out.push_str("You have access to the following integrations: ");
            out.push_str(&agent_prompt.sources.join(", "));
            out.push_str(".\n\n");
        }
    }

    out.push_str(instructions);
    out.push_str("\n\nCurrent date: ");
    out.push_str(date_string);

    if !user_ctx.trim().is_empty() {
        out.push_str("\n\nUser context:\n");
        out.push_str(user_ctx.trim());
    }

    if !cited_ctx.trim().is_empty() {
        out.push_str("\n\nRetrieved context:\n");
        out.push_str(cited_ctx.trim());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_to_citation_rewrites_every_occurrence() {
        let input = "Index 1 says hello. Later, Index 42 adds detail.";
        assert_eq!(
            index_to_citation(input),
            "[1] says hello. Later, [42] adds detail."
        );
    }

    #[test]
    fn index_to_citation_leaves_unrelated_text_untouched() {
        assert_eq!(index_to_citation("no markers here"), "no markers here");
    }

    #[test]
    fn empty_agent_prompt_yields_non_agent_flavor() {
        let prompt = assemble(
            PromptVariant::Baseline,
            "",
            "",
            "2026-07-26",
            &AgentPrompt::default(),
        );
        assert!(!prompt.contains("You have access to the following integrations"));
        assert!(prompt.starts_with("Answer the user's question"));
    }

    #[test]
    fn non_empty_agent_prompt_is_prepended_with_sources_listed() {
        let agent = AgentPrompt {
            prompt: "You are Atlas, a support agent.".to_string(),
            sources: vec!["zendesk".to_string(), "slack".to_string()],
        };
        let prompt = assemble(PromptVariant::BaselineJson, "", "", "2026-07-26", &agent);
        assert!(prompt.starts_with("You are Atlas, a support agent."));
        assert!(prompt.contains("zendesk, slack"));
    }

    #[test]
    fn retrieved_context_citations_are_rewritten_before_insertion() {
        let prompt = assemble(
            PromptVariant::KbItemsJson,
            "",
            "Index 3 mentions the Q2 roadmap.",
            "2026-07-26",
            &AgentPrompt::default(),
        );
        assert!(prompt.contains("[3] mentions the Q2 roadmap."));
        assert!(!prompt.contains("Index 3"));
    }
}
