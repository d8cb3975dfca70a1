use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::types::RawResponse;

/// A whole-response fenced code block with an optional language tag.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)\r?\n?```\z").unwrap()
});

/// Validate a raw model response as structured data (JSON object or array).
///
/// At most two parse attempts: the raw text, then the text with a fenced
/// code-block wrapper and surrounding whitespace removed. Never fails; the
/// flag tells the caller whether to fall back to unstructured display.
pub fn validate_response(raw: &str) -> RawResponse {
    if is_structured(raw) {
        return RawResponse {
            text: raw.to_string(),
            is_valid_structured: true,
        };
    }

    let cleaned = strip_code_fence(raw);
    let is_valid_structured = is_structured(&cleaned);
    if !is_valid_structured {
        tracing::debug!(len = raw.len(), "Model response is not structured data");
    }
    RawResponse {
        text: cleaned,
        is_valid_structured,
    }
}

/// Remove fenced wrappers (```json ... ```) and trim. Nested wrappers are
/// peeled together so the result never starts with a fence; text without a
/// wrapper is only trimmed.
pub fn strip_code_fence(raw: &str) -> String {
    let mut text = raw.trim();
    while let Some(inner) = FENCE.captures(text).and_then(|c| c.get(1)) {
        text = inner.as_str().trim();
    }
    text.to_string()
}

fn is_structured(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}

/// Pull the Markdown report out of a structured response, if it has one.
pub fn report_text(response: &RawResponse) -> Option<String> {
    if !response.is_valid_structured {
        return None;
    }
    let value: Value = serde_json::from_str(&response.text).ok()?;
    ["report", "relatorio", "analysis"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_passes_untouched() {
        let raw = " {\"a\": 1} ";
        let out = validate_response(raw);
        assert!(out.is_valid_structured);
        assert_eq!(out.text, raw);
    }

    #[test]
    fn fenced_json_is_cleaned() {
        let out = validate_response("```json\n{\"a\":1}\n```");
        assert!(out.is_valid_structured);
        assert_eq!(out.text, "{\"a\":1}");
    }

    #[test]
    fn fence_without_language_tag() {
        let out = validate_response("\n```\n[1, 2]\n```\n");
        assert!(out.is_valid_structured);
        assert_eq!(out.text, "[1, 2]");
    }

    #[test]
    fn prose_is_trimmed_and_flagged_invalid() {
        let out = validate_response("  **Impressão Diagnóstica** úlcera  ");
        assert!(!out.is_valid_structured);
        assert_eq!(out.text, "**Impressão Diagnóstica** úlcera");
    }

    #[test]
    fn fenced_garbage_is_invalid() {
        let out = validate_response("```json\n{not json}\n```");
        assert!(!out.is_valid_structured);
        assert_eq!(out.text, "{not json}");
    }

    #[test]
    fn bare_scalars_are_not_structured() {
        assert!(!validate_response("42").is_valid_structured);
        assert!(!validate_response("\"text\"").is_valid_structured);
    }

    #[test]
    fn nested_fences_are_peeled_in_one_pass() {
        let raw = "```\n```json\n{\"a\":1}\n```\n```";
        let first = validate_response(raw);
        assert!(first.is_valid_structured);
        assert_eq!(first.text, "{\"a\":1}");
        let second = validate_response(&first.text);
        assert_eq!(first, second);
    }

    #[test]
    fn validation_agrees_after_cleaning() {
        for raw in [
            "```json\n{\"a\":1}\n```",
            "{\"a\":1}",
            "texto livre",
            "```\nnope\n```",
            "",
        ] {
            let first = validate_response(raw);
            let second = validate_response(&first.text);
            assert_eq!(first.is_valid_structured, second.is_valid_structured, "raw: {raw:?}");
        }
    }

    #[test]
    fn report_text_reads_known_keys() {
        let out = validate_response("{\"report\": \"**Impressão Diagnóstica** x\"}");
        assert_eq!(report_text(&out).as_deref(), Some("**Impressão Diagnóstica** x"));

        let out = validate_response("{\"relatorio\": \"texto\"}");
        assert_eq!(report_text(&out).as_deref(), Some("texto"));
    }

    #[test]
    fn report_text_none_for_unstructured_or_missing_key() {
        assert_eq!(report_text(&validate_response("texto")), None);
        assert_eq!(report_text(&validate_response("{\"other\": 1}")), None);
        assert_eq!(report_text(&validate_response("{\"report\": 5}")), None);
    }
}
