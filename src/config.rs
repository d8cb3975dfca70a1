use std::path::PathBuf;

use crate::pipeline::analysis::{parse_model_list, resolve_model_priority, ModelId, DEFAULT_MODELS};

/// Application-level constants
pub const APP_NAME: &str = "Clinivision";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Gemini REST endpoint (v1beta carries image input and safety settings).
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Image analysis can take a while on the larger models.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Low temperature keeps reports consistent between runs.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinivision=info"
}

/// Runtime settings for the analysis pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Operator-supplied model order. Takes precedence over `builtin_models`.
    pub model_overrides: Vec<String>,
    pub builtin_models: Vec<String>,
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Enables the on-disk diagnostic dump when set.
    pub dump_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model_overrides: Vec::new(),
            builtin_models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            dump_dir: None,
        }
    }
}

impl AnalysisConfig {
    /// Load from `CLINIVISION_*` and `GEMINI_API_KEY` environment variables.
    ///
    /// Missing or unparseable values fall back to defaults. A missing API key
    /// is not an error here; the provider rejects the call and the pipeline
    /// reports it as a credential failure.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match non_blank("CLINIVISION_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid CLINIVISION_TIMEOUT_SECS, using default");
                DEFAULT_TIMEOUT_SECS
            }),
            None => defaults.timeout_secs,
        };

        Self {
            model_overrides: non_blank("CLINIVISION_MODELS")
                .map(|raw| parse_model_list(&raw))
                .unwrap_or_default(),
            api_key: non_blank("GEMINI_API_KEY"),
            api_base_url: non_blank("CLINIVISION_API_BASE").unwrap_or(defaults.api_base_url),
            timeout_secs,
            dump_dir: non_blank("CLINIVISION_DUMP_DIR").map(PathBuf::from),
            ..defaults
        }
    }

    /// Final priority list: overrides first, then built-ins, deduplicated.
    pub fn resolved_models(&self) -> Vec<ModelId> {
        resolve_model_priority(&self.model_overrides, &self.builtin_models)
    }
}
