//! Translation invocation.
//!
//! Translation itself is external: an invoker receives the preprocessed
//! staging tree and must fill the translated tree before returning. A
//! timeout is not a failure; the run stops before postprocessing and the
//! user finishes by hand.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{PrepError, PrepResult};
use crate::pipeline::collect_files;

pub const TRANSLATE_INPUT_ENV: &str = "SQLPREP_TRANSLATE_INPUT";
pub const TRANSLATE_OUTPUT_ENV: &str = "SQLPREP_TRANSLATE_OUTPUT";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    Completed,
    /// The job was still running when the timeout elapsed.
    TimedOut,
}

pub trait TranslationInvoker: Send + Sync {
    /// Block until translation finishes, fails, or `request.timeout` elapses.
    fn execute(&self, request: &TranslationRequest) -> PrepResult<TranslationOutcome>;
}

/// Runs a shell command with the staging directories in
/// `SQLPREP_TRANSLATE_INPUT` and `SQLPREP_TRANSLATE_OUTPUT`.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    command: String,
    poll_interval: Duration,
}

impl CommandInvoker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn(&self, request: &TranslationRequest) -> PrepResult<Child> {
        Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(TRANSLATE_INPUT_ENV, &request.input_dir)
            .env(TRANSLATE_OUTPUT_ENV, &request.output_dir)
            .spawn()
            .map_err(|err| PrepError::Translation {
                message: format!("cannot start '{}': {}", self.command, err),
            })
    }
}

impl TranslationInvoker for CommandInvoker {
    fn execute(&self, request: &TranslationRequest) -> PrepResult<TranslationOutcome> {
        fs::create_dir_all(&request.output_dir)
            .map_err(|err| PrepError::io(&request.output_dir, err))?;
        let mut child = self.spawn(request)?;
        info!(
            "translate event=start pid={} command={:?} timeout_secs={}",
            child.id(),
            self.command,
            request.timeout.as_secs()
        );
        let started = Instant::now();
        loop {
            let status = child.try_wait().map_err(|err| PrepError::Translation {
                message: format!("cannot poll translation job: {err}"),
            })?;
            if let Some(status) = status {
                debug!(
                    "translate event=exit status={} elapsed_ms={}",
                    status,
                    started.elapsed().as_millis()
                );
                if status.success() {
                    info!("translate event=done");
                    return Ok(TranslationOutcome::Completed);
                }
                return Err(PrepError::Translation {
                    message: format!("'{}' exited with {}", self.command, status),
                });
            }
            if started.elapsed() >= request.timeout {
                warn!(
                    "translate event=timeout pid={} timeout_secs={}",
                    child.id(),
                    request.timeout.as_secs()
                );
                warn!(
                    "Translation is still running (pid {}). Wait for it to finish, then \
                     postprocess {} into the final output directory manually.",
                    child.id(),
                    request.output_dir.display()
                );
                return Ok(TranslationOutcome::TimedOut);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Copies the staged tree unchanged; useful as a dry run of the macro
/// round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyInvoker;

impl TranslationInvoker for CopyInvoker {
    fn execute(&self, request: &TranslationRequest) -> PrepResult<TranslationOutcome> {
        let files = collect_files(&request.input_dir)?;
        info!("translate event=copy files={}", files.len());
        for relative in files {
            copy_file(&request.input_dir, &request.output_dir, &relative)?;
        }
        Ok(TranslationOutcome::Completed)
    }
}

fn copy_file(from_root: &Path, to_root: &Path, relative: &Path) -> PrepResult<()> {
    let source = from_root.join(relative);
    let target = to_root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| PrepError::io(parent, err))?;
    }
    fs::copy(&source, &target).map_err(|err| PrepError::io(&source, err))?;
    Ok(())
}
