//! Helpers for parsing oracle responses that are supposed to be JSON but may
//! arrive wrapped in a markdown fence.

/// Strip a leading/trailing ` ```json ... ``` ` (or bare ` ``` ... ``` `)
/// fence from an oracle response, if present, and return the inner text.
///
/// Oracles are prompted to return raw JSON but LLMs routinely wrap it in a
/// fenced code block anyway; this must be stripped before `serde_json`
/// ever sees the string.
pub fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a value out of a possibly-fenced JSON oracle response.
pub fn parse_fenced_json<T: serde::de::DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_json_fence(raw))
}
