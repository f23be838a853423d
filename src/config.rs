//! Run configuration: the four trees of a run, the worker and timeout
//! knobs, and the optional macro mapping file.
use std::path::{Path, PathBuf};
use std::time::Duration;

mod env;
mod macros;

pub use env::{apply_env_overrides, TIMEOUT_ENV, WORKERS_ENV};
pub use macros::{MacroFile, MacroMapping, TokenMap};

use crate::error::{PrepError, PrepResult};

/// How long translation may run before the workflow stops waiting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Directories and knobs for one preprocess/translate/postprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Source tree to translate.
    pub input_path: PathBuf,
    /// Preprocessed files handed to translation.
    pub preprocessed_path: PathBuf,
    /// Where translation leaves its output.
    pub translated_path: PathBuf,
    /// Final, postprocessed output.
    pub postprocessed_path: PathBuf,
    /// YAML `macros:` file; no expansion when unset.
    pub macro_mapping_path: Option<PathBuf>,
    /// `0` runs every file task inline on the calling thread.
    pub workers: usize,
    pub translation_timeout: Duration,
}

impl RunConfig {
    /// Inline execution and [`DEFAULT_TIMEOUT`], no macro mapping.
    pub fn new(
        input_path: impl Into<PathBuf>,
        preprocessed_path: impl Into<PathBuf>,
        translated_path: impl Into<PathBuf>,
        postprocessed_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            preprocessed_path: preprocessed_path.into(),
            translated_path: translated_path.into(),
            postprocessed_path: postprocessed_path.into(),
            macro_mapping_path: None,
            workers: 0,
            translation_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Check the trees before anything is written: the input must be a
    /// directory that no output tree aliases, and a named mapping must exist.
    pub fn validate(&self) -> PrepResult<()> {
        if !self.input_path.is_dir() {
            return Err(PrepError::config(format!(
                "input path must be a directory: {}",
                self.input_path.display()
            )));
        }
        for (name, path) in [
            ("preprocessed", &self.preprocessed_path),
            ("translated", &self.translated_path),
            ("postprocessed", &self.postprocessed_path),
        ] {
            if same_location(path, &self.input_path) {
                return Err(PrepError::config(format!(
                    "{name} path must differ from the input path: {}",
                    path.display()
                ))
                .with_context("Staging and output trees are written, never the input tree"));
            }
        }
        if let Some(path) = &self.macro_mapping_path {
            check_mapping_file(path)?;
        }
        Ok(())
    }

    /// Load the mapping file, if one is named. A missing file is a config
    /// error here too, so callers that load before [`validate`](Self::validate)
    /// still fail before writing.
    pub fn load_macro_mapping(&self) -> PrepResult<Option<MacroMapping>> {
        let Some(path) = self.macro_mapping_path.as_deref() else {
            return Ok(None);
        };
        check_mapping_file(path)?;
        MacroMapping::load(path).map(Some)
    }
}

fn check_mapping_file(path: &Path) -> PrepResult<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(PrepError::config(format!(
        "macro mapping path must be a file: {}",
        path.display()
    )))
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
