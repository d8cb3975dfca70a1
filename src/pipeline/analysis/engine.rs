use super::classify::classify_invocation_error;
use super::types::{AttemptOutcome, InvocationAttempt, ModelId};
use super::{InvocationError, PipelineError};
use crate::config::AnalysisConfig;

/// Successful outcome of a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub text: String,
    pub model: ModelId,
    /// Every attempt in order, the successful one last.
    pub attempts: Vec<InvocationAttempt>,
}

/// Walks a priority list of models until one produces text.
///
/// Retryable failures advance to the next model. Fatal failures abort the
/// whole run immediately: the remaining models share the same credential and
/// quota, so trying them would only repeat the failure.
#[derive(Debug, Clone)]
pub struct InvocationEngine {
    models: Vec<ModelId>,
}

impl InvocationEngine {
    pub fn new(models: Vec<ModelId>) -> Self {
        Self { models }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.resolved_models())
    }

    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    pub fn run<F>(&self, invoke: F) -> Result<Invocation, PipelineError>
    where
        F: FnMut(&ModelId) -> Result<String, InvocationError>,
    {
        run_fallback_chain(&self.models, invoke)
    }
}

/// Try each model in order; at most one call per model.
///
/// Errors:
/// - empty list → `NoModelsConfigured`, without invoking anything
/// - fatal classification → the matching fatal error, naming the model
/// - every model failed retryably → `AllModelsExhausted` with the last message
pub fn run_fallback_chain<F>(models: &[ModelId], mut invoke: F) -> Result<Invocation, PipelineError>
where
    F: FnMut(&ModelId) -> Result<String, InvocationError>,
{
    if models.is_empty() {
        tracing::error!("No candidate models configured");
        return Err(PipelineError::NoModelsConfigured);
    }

    let mut attempts = Vec::with_capacity(models.len());
    let mut last_error = String::new();

    for (index, model) in models.iter().enumerate() {
        let err = match invoke(model) {
            Ok(text) => {
                attempts.push(InvocationAttempt {
                    model: model.clone(),
                    outcome: AttemptOutcome::Success,
                    error_kind: None,
                    error_detail: None,
                });
                tracing::info!(
                    model = %model,
                    attempt = index + 1,
                    response_len = text.len(),
                    "Model invocation succeeded"
                );
                return Ok(Invocation {
                    text,
                    model: model.clone(),
                    attempts,
                });
            }
            Err(e) => e,
        };

        let kind = classify_invocation_error(&err);
        let detail = err.to_string();

        if let Some(fatal) = PipelineError::fatal(kind, model, &detail) {
            attempts.push(InvocationAttempt {
                model: model.clone(),
                outcome: AttemptOutcome::FatalFailure,
                error_kind: Some(kind),
                error_detail: Some(detail),
            });
            tracing::warn!(
                model = %model,
                attempt = index + 1,
                kind = ?kind,
                status = ?err.status,
                "Fatal model error, aborting remaining models"
            );
            return Err(fatal);
        }

        tracing::warn!(
            model = %model,
            attempt = index + 1,
            kind = ?kind,
            status = ?err.status,
            "Model invocation failed, trying next model"
        );
        attempts.push(InvocationAttempt {
            model: model.clone(),
            outcome: AttemptOutcome::RetryableFailure,
            error_kind: Some(kind),
            error_detail: Some(detail.clone()),
        });
        last_error = detail;
    }

    tracing::error!(attempts = attempts.len(), "All candidate models failed");
    Err(PipelineError::AllModelsExhausted {
        attempts: attempts.len(),
        last_error,
    })
}
