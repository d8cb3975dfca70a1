use super::types::ModelId;

/// Built-in candidates in order of preference.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Namespace prefix the provider puts on model names in listings.
const NAMESPACE_PREFIX: &str = "models/";

/// Only tokens in this family are accepted.
const FAMILY_PREFIX: &str = "gemini";

/// Normalize one raw token: trim, strip the `models/` namespace, require the
/// model family prefix. Returns `None` for tokens to discard.
pub fn normalize_model_token(raw: &str) -> Option<ModelId> {
    let trimmed = raw.trim();
    let token = trimmed.strip_prefix(NAMESPACE_PREFIX).unwrap_or(trimmed).trim();
    if token.is_empty() || !token.starts_with(FAMILY_PREFIX) {
        return None;
    }
    Some(ModelId::new(token))
}

/// Merge the override list with the built-in defaults into one ordered,
/// de-duplicated candidate list.
///
/// Overrides come first in their given order, then defaults. The first
/// occurrence of a token wins. Never fails: an all-invalid input yields an
/// empty list and the engine reports `NoModelsConfigured`.
pub fn resolve_model_priority<O, D>(overrides: O, defaults: D) -> Vec<ModelId>
where
    O: IntoIterator,
    O::Item: AsRef<str>,
    D: IntoIterator,
    D::Item: AsRef<str>,
{
    let mut resolved: Vec<ModelId> = Vec::new();
    let candidates = overrides
        .into_iter()
        .map(|t| t.as_ref().to_string())
        .chain(defaults.into_iter().map(|t| t.as_ref().to_string()));

    for raw in candidates {
        let Some(model) = normalize_model_token(&raw) else {
            tracing::debug!(token = %raw.trim(), "Discarding model token");
            continue;
        };
        if !resolved.contains(&model) {
            resolved.push(model);
        }
    }

    resolved
}

/// Split a comma-separated override string (as found in the environment).
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
