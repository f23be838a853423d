//! Literal macro expansion: each token is replaced by its value verbatim.
use log::debug;

use crate::config::TokenMap;
use crate::expansion::{MacroExpander, ReverseIndex};
use crate::warnings::{WarningKind, WarningLog};

/// Plain substring substitution from a fixed token table.
#[derive(Debug)]
pub struct LiteralMacroExpander {
    mapping: TokenMap,
    reverse: ReverseIndex,
    warnings: WarningLog,
}

impl LiteralMacroExpander {
    /// Tokens are replaced in `mapping` order.
    pub fn new(mapping: TokenMap) -> Self {
        Self {
            mapping,
            reverse: ReverseIndex::new(),
            warnings: WarningLog::new(),
        }
    }

    pub fn mapping(&self) -> &TokenMap {
        &self.mapping
    }
}

impl MacroExpander for LiteralMacroExpander {
    fn expand(&self, path: &str, text: &str) -> String {
        let mut text = text.to_string();
        for (token, value) in self.mapping.iter() {
            if token.is_empty() || !text.contains(token) {
                continue;
            }
            text = text.replace(token, value);
            debug!("macro event=expand path={} token={}", path, token);
            if let Some(previous) = self.reverse.record_latest(path, value, token) {
                self.warnings.warn(
                    WarningKind::AmbiguousReversal,
                    format!(
                        "The value '{value}' in {path} was expanded from the following macros: {token}, {previous}. Un-expansion will not be accurate."
                    ),
                );
            }
        }
        text
    }

    fn un_expand(&self, path: &str, text: &str) -> String {
        let mut text = text.to_string();
        for restoration in self.reverse.take_restorations(path) {
            if restoration.value.is_empty() {
                self.warnings.warn(
                    WarningKind::AmbiguousReversal,
                    format!(
                        "Cannot un-expand '{}' in {path}: it was expanded to an empty value.",
                        restoration.original
                    ),
                );
                continue;
            }
            text = text.replace(&restoration.value, &restoration.original);
        }
        text
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander(pairs: &[(&str, &str)]) -> LiteralMacroExpander {
        LiteralMacroExpander::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn expand_and_restore() {
        let macros = expander(&[("${foo}", "1")]);
        let original = "select * from t where a = ${foo};";
        let expanded = macros.expand("test.sql", original);
        assert_eq!(expanded, "select * from t where a = 1;");
        assert_eq!(macros.un_expand("test.sql", &expanded), original);
        assert!(macros.warnings().is_empty());
    }

    #[test]
    fn absent_tokens_are_not_recorded() {
        let macros = expander(&[("${foo}", "1"), ("${bar}", "2")]);
        let expanded = macros.expand("a.sql", "select ${bar}, 1");
        assert_eq!(expanded, "select 2, 1");
        // "1" was never produced, so it must survive un-expansion.
        assert_eq!(macros.un_expand("a.sql", &expanded), "select ${bar}, 1");
    }

    #[test]
    fn colliding_values_warn_and_keep_newest() {
        let macros = expander(&[("${a}", "x"), ("${b}", "x")]);
        let expanded = macros.expand("f.sql", "${a} ${b}");
        assert_eq!(expanded, "x x");
        assert_eq!(macros.warnings().len(), 1);
        assert!(macros.warnings()[0].contains("Un-expansion will not be accurate"));
        assert_eq!(macros.un_expand("f.sql", &expanded), "${b} ${b}");
    }

    #[test]
    fn unknown_path_is_untouched() {
        let macros = expander(&[("${foo}", "1")]);
        macros.expand("a.sql", "${foo}");
        assert_eq!(macros.un_expand("b.sql", "1"), "1");
    }

    #[test]
    fn empty_value_is_not_reversed() {
        let macros = expander(&[("${gone}", "")]);
        let expanded = macros.expand("a.sql", "select${gone} 1");
        assert_eq!(expanded, "select 1");
        assert_eq!(macros.un_expand("a.sql", &expanded), "select 1");
        assert_eq!(macros.warnings().len(), 1);
    }
}
