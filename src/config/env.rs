//! Environment overrides for the run knobs.
use std::env;
use std::time::Duration;

use crate::config::RunConfig;
use crate::error::{PrepError, PrepResult};

/// Worker thread count; `0` runs file tasks inline.
pub const WORKERS_ENV: &str = "SQLPREP_WORKERS";
/// Translation timeout in whole seconds.
pub const TIMEOUT_ENV: &str = "SQLPREP_TIMEOUT_SECS";

/// Apply `SQLPREP_WORKERS` and `SQLPREP_TIMEOUT_SECS` when they are set.
/// Blank values are ignored; anything else must be a non-negative integer.
pub fn apply_env_overrides(config: &mut RunConfig) -> PrepResult<()> {
    if let Some(workers) = read_number(WORKERS_ENV)? {
        config.workers = worker_count(workers)?;
    }
    if let Some(secs) = read_number(TIMEOUT_ENV)? {
        config.translation_timeout = Duration::from_secs(secs);
    }
    Ok(())
}

fn worker_count(raw: u64) -> PrepResult<usize> {
    usize::try_from(raw).map_err(|_| {
        PrepError::config(format!("invalid {WORKERS_ENV}: '{raw}'"))
            .with_context("Expected a non-negative integer")
    })
}

fn read_number(name: &str) -> PrepResult<Option<u64>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<u64>().map(Some).map_err(|_| {
        PrepError::config(format!("invalid {name}: '{trimmed}'"))
            .with_context("Expected a non-negative integer")
    })
}
