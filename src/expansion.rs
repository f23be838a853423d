//! Reversible macro expansion.
//!
//! Expansion replaces macro tokens with literal values before translation;
//! un-expansion restores the tokens afterwards. Every expander keeps a
//! per-path [`ReverseIndex`] so reversal only ever uses values that were
//! produced for that same path, and independent paths can be processed from
//! different threads at once.
mod literal;
mod pattern;
mod reverse;
mod router;

pub use literal::LiteralMacroExpander;
pub use pattern::{PatternMacroExpander, PlaceholderGenerator};
pub use reverse::{Restoration, ReverseEntry, ReverseIndex};
pub use router::MacroExpanderRouter;

/// Capability shared by the literal and pattern strategies.
///
/// `path` is the logical file path (relative, `/`-separated) and scopes the
/// reverse lookups. Implementations must tolerate concurrent calls for
/// distinct paths.
pub trait MacroExpander: Send + Sync {
    fn expand(&self, path: &str, text: &str) -> String;

    fn un_expand(&self, path: &str, text: &str) -> String;

    /// Every warning this expander has emitted, oldest first.
    fn warnings(&self) -> Vec<String>;
}

/// Produces a value for a macro that has no fixed mapping.
pub trait MacroValueGenerator: Send + Sync {
    fn generate(&self, path: &str, macro_name: &str) -> String;
}

/// Computes the text to re-insert for an expanded value.
pub trait MacroValueRestorer: Send + Sync {
    fn restore(&self, path: &str, replacement: &str, original: &str) -> String;
}

impl<F> MacroValueGenerator for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn generate(&self, path: &str, macro_name: &str) -> String {
        self(path, macro_name)
    }
}

impl<F> MacroValueRestorer for F
where
    F: Fn(&str, &str, &str) -> String + Send + Sync,
{
    fn restore(&self, path: &str, replacement: &str, original: &str) -> String {
        self(path, replacement, original)
    }
}
