//! Local pre/post-processing around batch SQL translation.
//!
//! Two text transforms do the work: heredoc extraction pulls SQL out of shell
//! scripts, and reversible macro expansion swaps template tokens for literal
//! values before translation and restores them afterwards. The pipeline and
//! workflow modules apply them across directory trees.

pub mod config;
pub mod encoding;
pub mod error;
pub mod execution;
pub mod expansion;
pub mod heredoc;
pub mod hooks;
pub mod pipeline;
pub mod translate;
pub mod utils;
pub mod warnings;
pub mod workflow;

pub use config::{MacroMapping, RunConfig};
pub use error::{ErrorKind, PrepError, PrepResult};
pub use execution::{executor_for, SynchronousExecutor, TaskExecutor};
pub use expansion::{
    LiteralMacroExpander, MacroExpander, MacroExpanderRouter, PatternMacroExpander,
    PlaceholderGenerator,
};
pub use heredoc::{filter_heredoc_texts, FragmentKind, HeredocExtractor, ShellFragment};
pub use hooks::Hooks;
pub use pipeline::Pipeline;
pub use translate::{CommandInvoker, CopyInvoker, TranslationInvoker, TranslationOutcome};
pub use workflow::WorkflowReport;

/// Fuzz helper for the heredoc scanner.
pub fn fuzz_extract_bytes(data: &[u8]) {
    let input = String::from_utf8_lossy(data);
    if let Ok(extractor) = HeredocExtractor::new("bteq") {
        let fragments = extractor.read_fragments(&input);
        let _ = filter_heredoc_texts(&fragments);
    }
}

/// Fuzz helper for macro expansion: the first line is the macro value, the
/// rest is the text. A value that does not occur in the text must survive
/// the round trip.
pub fn fuzz_expand_bytes(data: &[u8]) {
    let input = String::from_utf8_lossy(data);
    let (value, text) = input.split_once('\n').unwrap_or(("", &*input));
    let expander = LiteralMacroExpander::new([("${m}".to_string(), value.to_string())].into_iter().collect());
    let expanded = expander.expand("fuzz.sql", text);
    let restored = expander.un_expand("fuzz.sql", &expanded);
    if !value.is_empty() && !text.contains(value) && !text.contains("${m}") {
        assert_eq!(restored, text);
    }
}
