// Header sanitization for user-supplied MCP transport headers (spec.md
// §4.8 step 2): hop-by-hop headers are stripped and keys are lower-cased
// before the header set is handed to the HTTP client.

const FORBIDDEN: &[&str] = &[
    "host",
    "connection",
    "transfer-encoding",
    "content-length",
    "keep-alive",
    "upgrade",
    "proxy-connection",
];

/// Lower-cases header names and drops any that would let a caller override
/// transport-level framing the client is responsible for.
pub fn sanitize_headers(headers: Vec<(String, String)>) -> Vec<(String, String)> {
    headers
        .into_iter()
        .map(|(name, value)| (name.to_lowercase(), value))
        .filter(|(name, _)| !FORBIDDEN.contains(&name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_every_forbidden_header_case_insensitively() {
        let input = vec![
            ("Host".to_string(), "evil.example".to_string()),
            ("Connection".to_string(), "close".to_string()),
            ("Transfer-Encoding".to_string(), "chunked".to_string()),
            ("Content-Length".to_string(), "0".to_string()),
            ("Keep-Alive".to_string(), "timeout=5".to_string()),
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Proxy-Connection".to_string(), "keep-alive".to_string()),
            ("Authorization".to_string(), "Bearer secret".to_string()),
        ];

        let sanitized = sanitize_headers(input);
        assert_eq!(sanitized, vec![("authorization".to_string(), "Bearer secret".to_string())]);
    }

    #[test]
    fn lower_cases_surviving_header_names() {
        let input = vec![("X-Api-Key".to_string(), "abc".to_string())];
        let sanitized = sanitize_headers(input);
        assert_eq!(sanitized, vec![("x-api-key".to_string(), "abc".to_string())]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(sanitize_headers(vec![]).is_empty());
    }
}
