pub mod aggregate;
pub mod classify;
pub mod confidence;
pub mod context;
pub mod engine;
pub mod gemini;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod sanitize;
pub mod sections;
pub mod types;

pub use aggregate::*;
pub use classify::*;
pub use confidence::*;
pub use engine::*;
pub use gemini::*;
pub use models::*;
pub use normalize::*;
pub use orchestrator::*;
pub use prompt::*;
pub use sections::*;
pub use types::*;

use thiserror::Error;

/// Provider-level failure of a single generation call.
///
/// Carries the raw signals a provider exposes; `classify_invocation_error`
/// turns them into an `ErrorKind`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct InvocationError {
    /// HTTP status, when the call reached the provider.
    pub status: Option<u16>,
    /// Provider status token, e.g. `RESOURCE_EXHAUSTED`.
    pub provider_status: Option<String>,
    /// Provider reason token, e.g. `API_KEY_INVALID`.
    pub reason: Option<String>,
    pub message: String,
}

impl InvocationError {
    /// Error with only a message (transport failures, empty responses).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            provider_status: None,
            reason: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider_status(mut self, provider_status: impl Into<String>) -> Self {
        self.provider_status = Some(provider_status.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Terminal failure of a pipeline run. Never retried by the pipeline itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No candidate models are configured")]
    NoModelsConfigured,

    #[error("Model credential rejected (model {model}): {detail}")]
    FatalCredential { model: ModelId, detail: String },

    #[error("Model quota exceeded (model {model}): {detail}")]
    FatalQuota { model: ModelId, detail: String },

    #[error("Permission denied (model {model}): {detail}")]
    FatalPermission { model: ModelId, detail: String },

    #[error("Invalid model request (model {model}): {detail}")]
    FatalConfiguration { model: ModelId, detail: String },

    #[error("All {attempts} candidate models failed; last error: {last_error}")]
    AllModelsExhausted { attempts: usize, last_error: String },
}

impl PipelineError {
    /// Build the terminal error for a fatal kind. Returns `None` for retryable kinds.
    pub fn fatal(kind: ErrorKind, model: &ModelId, detail: &str) -> Option<Self> {
        let model = model.clone();
        let detail = detail.to_string();
        match kind {
            ErrorKind::FatalCredential => Some(Self::FatalCredential { model, detail }),
            ErrorKind::FatalQuota => Some(Self::FatalQuota { model, detail }),
            ErrorKind::FatalPermission => Some(Self::FatalPermission { model, detail }),
            ErrorKind::FatalConfiguration => Some(Self::FatalConfiguration { model, detail }),
            ErrorKind::RetryableUnavailable | ErrorKind::RetryableUnknown => None,
        }
    }

    /// Stable machine-readable code for the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoModelsConfigured => "NO_MODELS_CONFIGURED",
            Self::FatalCredential { .. } => "AI_CREDENTIAL_INVALID",
            Self::FatalQuota { .. } => "AI_QUOTA_EXCEEDED",
            Self::FatalPermission { .. } => "AI_PERMISSION_DENIED",
            Self::FatalConfiguration { .. } => "AI_REQUEST_INVALID",
            Self::AllModelsExhausted { .. } => "AI_MODELS_EXHAUSTED",
        }
    }

    /// The classified kind behind a fatal abort.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::FatalCredential { .. } => Some(ErrorKind::FatalCredential),
            Self::FatalQuota { .. } => Some(ErrorKind::FatalQuota),
            Self::FatalPermission { .. } => Some(ErrorKind::FatalPermission),
            Self::FatalConfiguration { .. } => Some(ErrorKind::FatalConfiguration),
            Self::NoModelsConfigured | Self::AllModelsExhausted { .. } => None,
        }
    }

    /// Message safe to show to the person who uploaded the image.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoModelsConfigured => {
                "The AI analysis service is not configured. Contact the administrator.".into()
            }
            Self::FatalCredential { .. } => {
                "The AI service credential is invalid or has expired. Contact the administrator."
                    .into()
            }
            Self::FatalQuota { .. } => {
                "The AI service usage quota has been exceeded. Please try again later.".into()
            }
            Self::FatalPermission { .. } => {
                "The AI service denied access to the requested capability.".into()
            }
            Self::FatalConfiguration { detail, .. } => {
                format!("The AI service rejected the request: {detail}")
            }
            Self::AllModelsExhausted { .. } => {
                "No AI model is currently available to analyze this image. Please try again later."
                    .into()
            }
        }
    }
}
