// Tolerant JSON extraction from model text (spec.md §4.4).
//
// A pipeline of total, side-effect-free transformations over the input byte
// slice, each attempting a strict parse before falling through to the next
// recovery step. The pipeline never raises: on total failure it returns an
// empty JSON object, and callers treat absent fields as "not emitted yet"
// during streaming.

use serde_json::{Map, Value};

/// Parses model output that may or may not be valid JSON, optionally aware of
/// a named key marker (e.g. `"answer":`) used by a couple of the recovery
/// steps. Always returns a value; never panics or returns `Err`.
pub fn parse(text: &str, json_key: Option<&str>) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return empty_object();
    }

    // Step 1: strip a surrounding ```json fenced block, if present.
    let mut working = strip_fence(trimmed);

    // Step 2: if the key marker is present but there's no leading `{`, prepend one.
    if let Some(key) = json_key {
        let t = working.trim_start();
        if t.contains(key) && !t.starts_with('{') {
            working = format!("{{{}", working);
        }
    }

    // Step 3: slice from the first `{` to the last `}` when both exist.
    working = slice_braces(&working);

    // Step 4: permissive parse attempt.
    if let Some(v) = try_parse(&working) {
        return v;
    }

    // Step 5: re-escape newlines/quotes inside string values, retry.
    let reescaped = reescape_string_values(&working);
    if let Some(v) = try_parse(&reescaped) {
        return v;
    }

    // Step 6: ad-hoc fixup for the `"answer null` sentinel.
    if let Some(key) = json_key {
        if working.contains("\"answer null") || reescaped.contains("\"answer null") {
            let fixed = format!("{{{} null}}", key);
            if let Some(v) = try_parse(&fixed) {
                return v;
            }
        }
    }

    // Step 7: strip line comments, stray fences, and control characters, retry.
    let scrubbed = scrub(&reescaped);
    if let Some(v) = try_parse(&scrubbed) {
        return v;
    }

    empty_object()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Attempts a strict parse, then — if that fails because the JSON was cut
/// off mid-stream — tries synthesizing the minimal closing punctuation.
fn try_parse(s: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return Some(v);
    }
    try_parse_synthesizing_close(s)
}

/// Handles a stream truncated mid-object/mid-string by appending the
/// missing closing quote/brace(s), respecting string literals so we don't
/// count braces that appear inside quoted text.
fn try_parse_synthesizing_close(s: &str) -> Option<Value> {
    let trimmed = s.trim_end();
    if trimmed.is_empty() || !trimmed.trim_start().starts_with('{') {
        return None;
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for ch in trimmed.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }

    if depth <= 0 && !in_string {
        return None;
    }

    let mut candidate = trimmed.to_string();
    if in_string {
        candidate.push('"');
    }
    for _ in 0..depth {
        candidate.push('}');
    }

    serde_json::from_str::<Value>(&candidate).ok()
}

/// Strips a leading/trailing ```json ... ``` (or bare ```) fence. Tolerates a
/// missing closing fence, which happens mid-stream.
fn strip_fence(s: &str) -> String {
    let mut rest = s;

    if let Some(pos) = rest.find("```json") {
        rest = &rest[pos + "```json".len()..];
    } else if let Some(pos) = rest.find("```") {
        rest = &rest[pos + "```".len()..];
    } else {
        return s.to_string();
    }

    if let Some(end) = rest.find("```") {
        rest[..end].trim().to_string()
    } else {
        rest.trim().to_string()
    }
}

fn slice_braces(s: &str) -> String {
    let start = match s.find('{') {
        Some(i) => i,
        None => return s.to_string(),
    };
    match s.rfind('}') {
        Some(end) if end >= start => s[start..=end].to_string(),
        _ => s[start..].to_string(),
    }
}

/// Re-escapes raw newlines and unescaped quote characters that appear
/// *inside* string values, which a model will sometimes emit verbatim.
fn reescape_string_values(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_string {
            if escaped {
                out.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => {
                    out.push(ch);
                    escaped = true;
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '"' => {
                    // A quote followed by a structural character closes the
                    // string; otherwise it's a stray quote to escape.
                    let closes = matches!(chars.peek(), Some(',') | Some('}') | Some(']') | Some(':') | None)
                        || chars.peek().map(|c| c.is_whitespace()).unwrap_or(false);
                    if closes {
                        out.push('"');
                        in_string = false;
                    } else {
                        out.push_str("\\\"");
                    }
                }
                _ => out.push(ch),
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }

    out
}

/// Strips `//` line comments, any remaining code-fence markers, and control
/// characters other than whitespace.
fn scrub(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for line in s.lines() {
        let line = if let Some(pos) = line.find("//") {
            &line[..pos]
        } else {
            line
        };
        for ch in line.chars() {
            if ch == '`' {
                continue;
            }
            if ch.is_control() && ch != '\t' {
                continue;
            }
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty_object() {
        assert_eq!(parse("", None), empty_object());
    }

    #[test]
    fn fenced_valid_json_parses_directly() {
        let v = parse("```json\n{\"a\":1}\n```", None);
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn truncated_fenced_object_synthesizes_closing_brace() {
        let input = "Here is the answer:\n```json\n{\"title\": \"Q2 review\"\n```";
        let v = parse(input, None);
        assert_eq!(v["title"], "Q2 review");
    }

    #[test]
    fn answer_null_sentinel_is_rewritten() {
        let v = parse("{\"answer null\n}", Some("\"answer\":"));
        assert_eq!(v["answer"], Value::Null);
    }

    #[test]
    fn never_panics_on_garbage() {
        let v = parse("not json at all {{{ \u{0}\u{1}", None);
        assert!(v.is_object());
    }

    #[test]
    fn missing_leading_brace_with_key_marker_is_prefixed() {
        let v = parse("\"answer\": 42}", Some("\"answer\":"));
        assert_eq!(v["answer"], 42);
    }

    #[test]
    fn line_comments_are_stripped_before_final_retry() {
        let input = "{\n  \"a\": 1, // trailing comment\n  \"b\": 2\n}";
        let v = parse(input, None);
        assert_eq!(v["a"], 1);
        assert_eq!(v["b"], 2);
    }
}
