use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::aggregate_sections;
use super::engine::{Invocation, InvocationEngine};
use super::gemini::GeminiClient;
use super::normalize::{report_text, validate_response};
use super::prompt::{build_analysis_prompt, build_prognosis_prompt, render_context_input};
use super::sections::extract_sections;
use super::types::{
    AnalysisAggregate, ContextInput, GenerationRequest, ImagePayload, InvocationAttempt, ModelId,
    ModelInvoker, RawResponse, SafetyPolicy,
};
use super::PipelineError;
use crate::config::AnalysisConfig;
use crate::pipeline::diagnostic;

/// Full record of one analysis run, for callers that keep provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    /// Model that produced the response.
    pub model: ModelId,
    pub analyzed_at: DateTime<Utc>,
    pub raw: RawResponse,
    pub attempts: Vec<InvocationAttempt>,
    pub aggregate: AnalysisAggregate,
}

/// Orchestrates one image analysis:
/// context → prompt → fallback chain → normalize → extract → aggregate
///
/// Holds only read-only state; concurrent runs share nothing mutable.
pub struct AnalysisPipeline {
    engine: InvocationEngine,
    invoker: Box<dyn ModelInvoker + Send + Sync>,
    safety: SafetyPolicy,
    dump_dir: Option<PathBuf>,
}

impl AnalysisPipeline {
    pub fn new(engine: InvocationEngine, invoker: Box<dyn ModelInvoker + Send + Sync>) -> Self {
        Self {
            engine,
            invoker,
            safety: SafetyPolicy::clinical(),
            dump_dir: None,
        }
    }

    /// Gemini-backed pipeline with the configured model order and dump dir.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, reqwest::Error> {
        let client = GeminiClient::new(config)?;
        let engine = InvocationEngine::from_config(config);
        tracing::info!(models = engine.models().len(), "Analysis pipeline configured");
        Ok(Self::new(engine, Box::new(client)).with_dump_dir(config.dump_dir.clone()))
    }

    pub fn with_safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_dump_dir(mut self, dump_dir: Option<PathBuf>) -> Self {
        self.dump_dir = dump_dir;
        self
    }

    pub fn engine(&self) -> &InvocationEngine {
        &self.engine
    }

    /// Analyze an image with its clinical context.
    pub fn run_pipeline(
        &self,
        image: &ImagePayload,
        context: &ContextInput,
    ) -> Result<AnalysisAggregate, PipelineError> {
        self.run_pipeline_detailed(image, context)
            .map(|run| run.aggregate)
    }

    /// Same as `run_pipeline`, keeping run id, model, attempts and raw text.
    pub fn run_pipeline_detailed(
        &self,
        image: &ImagePayload,
        context: &ContextInput,
    ) -> Result<AnalysisRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("analysis_run", run_id = %run_id).entered();
        let dump = diagnostic::dump_dir_for(self.dump_dir.as_deref(), &run_id);

        let prompt = build_analysis_prompt(&render_context_input(context));
        tracing::info!(
            prompt_len = prompt.len(),
            image_len = image.len(),
            mime_type = %image.mime_type,
            "Starting image analysis"
        );
        if let Some(dir) = &dump {
            diagnostic::dump_text(dir, "01-prompt.txt", &prompt);
        }

        let request = GenerationRequest {
            prompt: &prompt,
            image: Some(image),
            safety: &self.safety,
        };
        let invocation = self.invoke(&request)?;
        dump_invocation(dump.as_deref(), &invocation);

        let raw = validate_response(&invocation.text);
        let report = report_text(&raw).unwrap_or_else(|| raw.text.clone());
        let aggregate = aggregate_sections(extract_sections(&report));

        tracing::info!(
            model = %invocation.model,
            structured = raw.is_valid_structured,
            sections = aggregate.sections.len(),
            overall_confidence = aggregate.overall_confidence,
            overall_urgency = ?aggregate.overall_urgency,
            "Image analysis complete"
        );
        if let Some(dir) = &dump {
            diagnostic::dump_json(dir, "04-aggregate.json", &aggregate);
        }

        Ok(AnalysisRun {
            run_id,
            model: invocation.model,
            analyzed_at: Utc::now(),
            raw,
            attempts: invocation.attempts,
            aggregate,
        })
    }

    /// Estimate prognosis from an earlier report. No image is sent; the
    /// normalized response is returned for the caller to display or parse.
    pub fn run_prognosis_pipeline(
        &self,
        prior_report: &str,
        context: &ContextInput,
    ) -> Result<RawResponse, PipelineError> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("prognosis_run", run_id = %run_id).entered();
        let dump = diagnostic::dump_dir_for(self.dump_dir.as_deref(), &run_id);

        let prompt = build_prognosis_prompt(prior_report, &render_context_input(context));
        tracing::info!(
            prompt_len = prompt.len(),
            prior_report_len = prior_report.len(),
            "Starting prognosis"
        );
        if let Some(dir) = &dump {
            diagnostic::dump_text(dir, "01-prompt.txt", &prompt);
        }

        let request = GenerationRequest {
            prompt: &prompt,
            image: None,
            safety: &self.safety,
        };
        let invocation = self.invoke(&request)?;
        dump_invocation(dump.as_deref(), &invocation);

        let raw = validate_response(&invocation.text);
        tracing::info!(
            model = %invocation.model,
            structured = raw.is_valid_structured,
            "Prognosis complete"
        );
        if let Some(dir) = &dump {
            diagnostic::dump_json(dir, "04-prognosis.json", &raw);
        }
        Ok(raw)
    }

    fn invoke(&self, request: &GenerationRequest<'_>) -> Result<Invocation, PipelineError> {
        self.engine
            .run(|model| self.invoker.generate(model, request))
            .inspect_err(|e| {
                tracing::warn!(code = e.code(), error = %e, "Model invocation failed");
            })
    }
}

fn dump_invocation(dir: Option<&Path>, invocation: &Invocation) {
    if let Some(dir) = dir {
        diagnostic::dump_text(dir, "02-raw-response.txt", &invocation.text);
        diagnostic::dump_json(dir, "03-attempts.json", &invocation.attempts);
    }
}
