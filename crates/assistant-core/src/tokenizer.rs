// Fallback cost estimator used when a backend doesn't report token counts.
//
// This is a small, deterministic byte-pair-style tokenizer — not a faithful
// reproduction of any specific vendor's BPE vocabulary, just a stable,
// dependency-free approximation good enough for cost estimates.

/// A handful of common multi-character merges, checked longest-first.
const MERGES: &[&str] = &[
    "ing", "tion", "the", "and", "ed", "er", "re", "in", "on", "at", "es",
];

/// Approximate token count for a piece of text.
pub fn count_tokens(text: &str) -> u64 {
    let mut count = 0u64;
    for word in text.split_whitespace() {
        count += count_word(word);
    }
    count
}

fn count_word(word: &str) -> u64 {
    let lower = word.to_lowercase();
    let mut remaining = lower.as_str();
    let mut tokens = 0u64;

    'outer: while !remaining.is_empty() {
        for merge in MERGES {
            if remaining.starts_with(merge) {
                remaining = &remaining[merge.len()..];
                tokens += 1;
                continue 'outer;
            }
        }
        // No merge matched: consume one char (by byte boundary for simplicity,
        // since this is an approximation, not a faithful vocabulary).
        let next = remaining.char_indices().nth(1).map(|(i, _)| i).unwrap_or(remaining.len());
        remaining = &remaining[next..];
        tokens += 1;
    }

    tokens.max(1)
}

/// Estimate usage for a call whose backend didn't report token counts.
pub fn estimate_usage(prompt_text: &str, output_text: &str) -> assistant_contracts::UsageCost {
    let input_tokens = count_tokens(prompt_text);
    let output_tokens = count_tokens(output_text);
    assistant_contracts::UsageCost {
        input_tokens,
        output_tokens,
        usd: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_at_least_one_token_per_word() {
        assert!(count_tokens("hello world") >= 2);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn estimate_usage_fills_both_sides() {
        let usage = estimate_usage("hello", "world");
        assert!(usage.input_tokens > 0);
        assert!(usage.output_tokens > 0);
    }
}
