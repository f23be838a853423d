//! End-to-end run: preprocess, translate, postprocess.
//!
//! Each phase finishes every file before the next one starts. Configuration
//! problems are reported before anything is written.
use std::sync::Arc;

use log::{info, warn};

use crate::config::{MacroMapping, RunConfig};
use crate::error::PrepResult;
use crate::execution::TaskExecutor;
use crate::expansion::{MacroExpanderRouter, MacroValueGenerator, PlaceholderGenerator};
use crate::hooks::Hooks;
use crate::pipeline::{PhaseReport, Pipeline};
use crate::translate::{TranslationInvoker, TranslationOutcome, TranslationRequest};
use crate::warnings::{WarningKind, WarningLog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub preprocessed: PhaseReport,
    pub translation: TranslationOutcome,
    /// `None` when translation timed out.
    pub postprocessed: Option<PhaseReport>,
    pub warnings: Vec<String>,
}

impl WorkflowReport {
    pub fn completed(&self) -> bool {
        self.translation == TranslationOutcome::Completed
    }
}

/// Router for a loaded mapping. With `macro_pattern`, every glob gets a
/// pattern expander whose unmapped macros become `MACRO_<name>_MACRO`;
/// otherwise tokens are replaced literally.
pub fn build_router(
    mapping: &MacroMapping,
    macro_pattern: Option<&str>,
) -> PrepResult<MacroExpanderRouter> {
    match macro_pattern {
        Some(pattern) => {
            let generator: Arc<dyn MacroValueGenerator> = Arc::new(PlaceholderGenerator);
            MacroExpanderRouter::pattern(mapping, pattern, Some(generator), None)
        }
        None => MacroExpanderRouter::literal(mapping),
    }
}

/// Load the macro mapping named by `config` (if any) and wire a pipeline
/// with `hooks` around it.
pub fn pipeline_for(
    config: &RunConfig,
    hooks: Hooks,
    macro_pattern: Option<&str>,
) -> PrepResult<Pipeline> {
    let pipeline = Pipeline::new(hooks);
    match config.load_macro_mapping()? {
        Some(mapping) => {
            let router = build_router(&mapping, macro_pattern)?;
            Ok(pipeline.with_router(Arc::new(router)))
        }
        None => Ok(pipeline),
    }
}

pub fn execute(
    config: &RunConfig,
    pipeline: &Pipeline,
    invoker: &dyn TranslationInvoker,
    executor: &dyn TaskExecutor,
) -> PrepResult<WorkflowReport> {
    config.validate()?;
    info!(
        "workflow event=start input={} workers={}",
        config.input_path.display(),
        config.workers
    );

    let preprocessed =
        pipeline.preprocess(&config.input_path, &config.preprocessed_path, executor)?;

    let request = TranslationRequest {
        input_dir: config.preprocessed_path.clone(),
        output_dir: config.translated_path.clone(),
        timeout: config.translation_timeout,
    };
    let translation = invoker.execute(&request)?;
    let run_warnings = WarningLog::new();

    let postprocessed = match translation {
        TranslationOutcome::Completed => Some(pipeline.postprocess(
            &config.translated_path,
            &config.postprocessed_path,
            executor,
        )?),
        TranslationOutcome::TimedOut => {
            run_warnings.warn(
                WarningKind::RemoteTimeout,
                format!(
                    "Translation did not finish within {}s; postprocess {} once it completes.",
                    config.translation_timeout.as_secs(),
                    config.translated_path.display()
                ),
            );
            None
        }
    };

    let mut warnings = pipeline
        .router()
        .map(MacroExpanderRouter::all_messages)
        .unwrap_or_default();
    warnings.extend(run_warnings.messages());
    if !warnings.is_empty() {
        warn!("workflow event=warnings count={}", warnings.len());
    }
    info!("workflow event=done outcome={:?}", translation);
    Ok(WorkflowReport {
        preprocessed,
        translation,
        postprocessed,
        warnings,
    })
}
