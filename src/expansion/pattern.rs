//! Regex-driven macro expansion and the `${NAME}` placeholder generator.
use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use regex::{Captures, NoExpand, Regex, RegexBuilder};

use crate::config::TokenMap;
use crate::error::{PrepError, PrepResult};
use crate::expansion::{MacroExpander, MacroValueGenerator, MacroValueRestorer, ReverseIndex};
use crate::warnings::{WarningKind, WarningLog};

/// Expands every match of a regular expression whose single capture group
/// names the macro.
///
/// Values come from the fixed mapping (looked up by macro name, then by the
/// full match), else from the generator. A match with neither is left as-is
/// and reported.
pub struct PatternMacroExpander {
    pattern: Regex,
    mapping: TokenMap,
    generator: Option<Arc<dyn MacroValueGenerator>>,
    restorer: Option<Arc<dyn MacroValueRestorer>>,
    reverse: ReverseIndex,
    // path -> macro names that went through the generator
    unmapped: DashMap<String, BTreeSet<String>>,
    warnings: WarningLog,
}

impl PatternMacroExpander {
    /// Fails with `InvalidPattern` unless `pattern` compiles with exactly
    /// one capture group.
    pub fn new(pattern: &str, mapping: TokenMap) -> PrepResult<Self> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| PrepError::Regex {
                pattern: pattern.to_string(),
                source: err,
            })?;
        let groups = compiled.captures_len() - 1;
        if groups != 1 {
            return Err(PrepError::InvalidPattern {
                pattern: pattern.to_string(),
                groups,
            });
        }
        Ok(Self {
            pattern: compiled,
            mapping,
            generator: None,
            restorer: None,
            reverse: ReverseIndex::new(),
            unmapped: DashMap::new(),
            warnings: WarningLog::new(),
        })
    }

    /// Supplies values for macros the mapping does not name.
    pub fn with_generator(mut self, generator: Arc<dyn MacroValueGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Computes the text put back for each restored value, instead of the
    /// recorded original.
    pub fn with_restorer(mut self, restorer: Arc<dyn MacroValueRestorer>) -> Self {
        self.restorer = Some(restorer);
        self
    }

    /// Macro names of `path` that had no mapping and were generated.
    pub fn unmapped(&self, path: &str) -> Vec<String> {
        self.unmapped
            .get(path)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn substitute(&self, path: &str, caps: &Captures<'_>) -> String {
        let full_match = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let macro_name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let generated = if let Some(value) = self
            .mapping
            .get(macro_name)
            .or_else(|| self.mapping.get(full_match))
        {
            value.clone()
        } else if let Some(generator) = &self.generator {
            self.unmapped
                .entry(path.to_string())
                .or_default()
                .insert(macro_name.to_string());
            generator.generate(path, macro_name)
        } else {
            self.warnings.warn(
                WarningKind::UnmappedMacro,
                format!(
                    "Could not expand '{full_match}' in {path} as it is not present in the mapping and no generator function was provided"
                ),
            );
            full_match.to_string()
        };
        debug!(
            "macro event=expand path={} match={} value={}",
            path, full_match, generated
        );
        self.reverse.record(path, &generated, full_match);
        generated
    }
}

impl MacroExpander for PatternMacroExpander {
    fn expand(&self, path: &str, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures<'_>| self.substitute(path, caps))
            .into_owned()
    }

    /// Values are matched case-insensitively, since translation may change
    /// the case of identifiers.
    fn un_expand(&self, path: &str, text: &str) -> String {
        if !self.reverse.contains_path(path) {
            return text.to_string();
        }
        for (value, originals) in self.reverse.ambiguous(path) {
            self.warnings.warn(
                WarningKind::AmbiguousReversal,
                format!(
                    "The value '{value}' in {path} was expanded from the following macros: {}. Un-expansion will not be accurate.",
                    originals.join(", ")
                ),
            );
        }
        let mut text = text.to_string();
        for restoration in self.reverse.take_restorations(path) {
            if restoration.value.is_empty() {
                continue;
            }
            let replacement = match &self.restorer {
                Some(restorer) => restorer.restore(path, &restoration.value, &restoration.original),
                None => restoration.original.clone(),
            };
            let matcher = RegexBuilder::new(&regex::escape(&restoration.value))
                .case_insensitive(true)
                .build();
            text = match matcher {
                Ok(matcher) => matcher
                    .replace_all(&text, NoExpand(&replacement))
                    .into_owned(),
                Err(_) => text.replace(&restoration.value, &replacement),
            };
        }
        text
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.messages()
    }
}

/// Generator for `${NAME}`-style macros: `NAME` becomes `MACRO_NAME_MACRO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderGenerator;

impl PlaceholderGenerator {
    /// Matches `${NAME}`.
    pub const PATTERN: &'static str = r"\$\{(\w+)\}";
}

impl MacroValueGenerator for PlaceholderGenerator {
    fn generate(&self, _path: &str, macro_name: &str) -> String {
        format!("MACRO_{macro_name}_MACRO")
    }
}
