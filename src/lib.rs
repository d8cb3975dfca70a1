pub mod api;
pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::analysis::{
    AnalysisAggregate, AnalysisPipeline, AnalysisRun, ContextInput, ImagePayload, PipelineError,
};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`. Safe to
/// call more than once: later calls leave the first subscriber in place.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
