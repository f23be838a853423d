//! User-replaceable text hooks run around macro expansion.
//!
//! The default preprocess hook pulls the SQL out of `bteq` heredocs in KSH
//! scripts, so only the embedded SQL reaches translation.
use std::sync::Arc;

use glob::Pattern;
use log::info;

use crate::error::PrepResult;
use crate::heredoc::{filter_heredoc_texts, HeredocExtractor};

/// `(relative_path, text) -> text`
pub type ProcessingHook = Arc<dyn Fn(&str, &str) -> PrepResult<String> + Send + Sync>;

pub const NO_HEREDOC_PLACEHOLDER: &str = "-- No heredoc SQL fragments exist in input file.";

#[derive(Clone)]
pub struct Hooks {
    pub preprocess: ProcessingHook,
    pub postprocess: ProcessingHook,
}

impl Hooks {
    /// Both hooks pass text through unchanged.
    pub fn identity() -> Self {
        Self {
            preprocess: Arc::new(|_: &str, text: &str| Ok(text.to_string())),
            postprocess: Arc::new(|_: &str, text: &str| Ok(text.to_string())),
        }
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            preprocess: Arc::new(preprocess),
            postprocess: Arc::new(postprocess),
        }
    }
}

pub fn preprocess(path: &str, text: &str) -> PrepResult<String> {
    extract_ksh_heredoc_fragments(path, text)
}

pub fn postprocess(_path: &str, text: &str) -> PrepResult<String> {
    Ok(text.to_string())
}

/// For `*.ksh` inputs, replace the script with its `bteq` heredoc payloads
/// joined by newlines. Other inputs are returned unchanged.
pub fn extract_ksh_heredoc_fragments(path: &str, text: &str) -> PrepResult<String> {
    if !is_ksh(path) {
        return Ok(text.to_string());
    }
    info!("hook event=extract-heredoc path={}", path);
    let extractor = HeredocExtractor::new("bteq")?;
    let texts = filter_heredoc_texts(&extractor.read_fragments(text));
    if texts.is_empty() {
        return Ok(NO_HEREDOC_PLACEHOLDER.to_string());
    }
    Ok(texts.join("\n"))
}

fn is_ksh(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    Pattern::new("*.ksh")
        .map(|pattern| pattern.matches(name))
        .unwrap_or(false)
}
