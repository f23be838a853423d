//! Directory-tree pre/post-processing.
//!
//! `preprocess` walks the input tree: each file is decoded, run through the
//! preprocess hook and macro expansion, and written as UTF-8 under the
//! staging tree. `postprocess` walks translated output the other way:
//! un-expansion, then the postprocess hook. Archive and data files
//! (`.zip`, `.json`, `.csv`) are copied byte-for-byte on the way in.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::encoding::EncodingDetector;
use crate::error::{PrepError, PrepResult};
use crate::execution::{first_failure, Task, TaskExecutor};
use crate::expansion::MacroExpanderRouter;
use crate::hooks::Hooks;

const VERBATIM_EXTENSIONS: [&str; 3] = ["zip", "json", "csv"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Files decoded, transformed, and rewritten.
    pub processed: usize,
    /// Files copied unchanged.
    pub copied: usize,
}

#[derive(Clone, Copy)]
enum Direction {
    Expand,
    UnExpand,
}

#[derive(Clone)]
pub struct Pipeline {
    hooks: Hooks,
    router: Option<Arc<MacroExpanderRouter>>,
    detector: EncodingDetector,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("router", &self.router.is_some())
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Hooks::default())
    }
}

impl Pipeline {
    pub fn new(hooks: Hooks) -> Self {
        Self {
            hooks,
            router: None,
            detector: EncodingDetector::default(),
        }
    }

    pub fn with_router(mut self, router: Arc<MacroExpanderRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_detector(mut self, detector: EncodingDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn router(&self) -> Option<&MacroExpanderRouter> {
        self.router.as_deref()
    }

    pub fn preprocess(
        &self,
        input_dir: &Path,
        staging_dir: &Path,
        executor: &dyn TaskExecutor,
    ) -> PrepResult<PhaseReport> {
        info!(
            "pipeline event=preprocess input={} staging={}",
            input_dir.display(),
            staging_dir.display()
        );
        self.run_phase("preprocess", input_dir, staging_dir, Direction::Expand, executor)
    }

    pub fn postprocess(
        &self,
        staged_dir: &Path,
        output_dir: &Path,
        executor: &dyn TaskExecutor,
    ) -> PrepResult<PhaseReport> {
        info!(
            "pipeline event=postprocess staged={} output={}",
            staged_dir.display(),
            output_dir.display()
        );
        self.run_phase("postprocess", staged_dir, output_dir, Direction::UnExpand, executor)
    }

    /// Preprocess one file's text as if read from `path` (relative,
    /// `/`-separated).
    pub fn preprocess_text(&self, path: &str, text: &str) -> PrepResult<String> {
        let text = (self.hooks.preprocess)(path, text)?;
        Ok(match &self.router {
            Some(router) => router.expand(path, &text),
            None => text,
        })
    }

    pub fn postprocess_text(&self, path: &str, text: &str) -> PrepResult<String> {
        let text = match &self.router {
            Some(router) => router.un_expand(path, text),
            None => text.to_string(),
        };
        (self.hooks.postprocess)(path, &text)
    }

    fn run_phase(
        &self,
        phase: &str,
        source_root: &Path,
        target_root: &Path,
        direction: Direction,
        executor: &dyn TaskExecutor,
    ) -> PrepResult<PhaseReport> {
        let files = collect_files(source_root)?;
        let mut report = PhaseReport::default();
        let mut tasks: Vec<Task<'_>> = Vec::with_capacity(files.len());
        for relative in files {
            let verbatim = matches!(direction, Direction::Expand) && is_verbatim(&relative);
            if verbatim {
                report.copied += 1;
            } else {
                report.processed += 1;
            }
            tasks.push(Box::new(move || {
                self.process_file(source_root, target_root, &relative, direction, verbatim)
            }));
        }
        first_failure(phase, executor.run_all(tasks))?;
        info!(
            "pipeline event={}-done processed={} copied={}",
            phase, report.processed, report.copied
        );
        Ok(report)
    }

    fn process_file(
        &self,
        source_root: &Path,
        target_root: &Path,
        relative: &Path,
        direction: Direction,
        verbatim: bool,
    ) -> PrepResult<()> {
        let source = source_root.join(relative);
        let target = target_root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| PrepError::io(parent, err))?;
        }
        if verbatim {
            debug!("pipeline event=copy path={}", relative.display());
            fs::copy(&source, &target).map_err(|err| PrepError::io(&source, err))?;
            return Ok(());
        }

        let key = path_key(relative);
        let bytes = fs::read(&source).map_err(|err| PrepError::io(&source, err))?;
        let text = self.detector.decode(&source, &bytes)?;
        let text = match direction {
            Direction::Expand => {
                debug!("pipeline event=preprocess-file path={}", key);
                self.preprocess_text(&key, &text)?
            }
            Direction::UnExpand => {
                debug!("pipeline event=postprocess-file path={}", key);
                self.postprocess_text(&key, &text)?
            }
        };
        fs::write(&target, text.as_bytes()).map_err(|err| PrepError::io(&target, err))
    }
}

/// Relative paths of every processable file under `root`, sorted.
///
/// Hidden entries (leading `.`) and anything that is neither a regular
/// file nor a real directory are skipped.
pub fn collect_files(root: &Path) -> PrepResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(root, Path::new(""), &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> PrepResult<()> {
    let dir = root.join(relative);
    let entries = fs::read_dir(&dir).map_err(|err| PrepError::io(&dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| PrepError::io(&dir, err))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let child = relative.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|err| PrepError::io(entry.path(), err))?;
        if file_type.is_dir() {
            walk(root, &child, out)?;
        } else if entry.path().is_file() {
            out.push(child);
        } else {
            debug!("pipeline event=skip path={}", child.display());
        }
    }
    Ok(())
}

fn is_verbatim(relative: &Path) -> bool {
    relative
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            VERBATIM_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// `a/b/c.sql`, independent of the platform separator.
pub fn path_key(relative: &Path) -> String {
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
