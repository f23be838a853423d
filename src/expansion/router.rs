//! Glob routing from file paths to macro expanders.
use std::sync::Arc;

use dashmap::DashSet;
use glob::{MatchOptions, Pattern};
use log::debug;

use crate::config::MacroMapping;
use crate::error::{PrepError, PrepResult};
use crate::expansion::{
    LiteralMacroExpander, MacroExpander, MacroValueGenerator, MacroValueRestorer,
    PatternMacroExpander,
};
use crate::warnings::{WarningKind, WarningLog};

// fnmatch semantics: `*` also crosses `/`, matching is case-sensitive.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

struct Route {
    glob: String,
    pattern: Pattern,
    expander: Box<dyn MacroExpander>,
}

/// Routes each path to the expanders whose glob matches it.
///
/// Every matching expander is applied, in declaration order, each one
/// feeding its output to the next. `un_expand` walks the same expanders in
/// the same order.
pub struct MacroExpanderRouter {
    routes: Vec<Route>,
    // paths already reported as matching several globs
    overlaps: DashSet<String>,
    warnings: WarningLog,
}

impl MacroExpanderRouter {
    /// Fails with a config error on the first glob that does not compile.
    pub fn new(routes: Vec<(String, Box<dyn MacroExpander>)>) -> PrepResult<Self> {
        let routes = routes
            .into_iter()
            .map(|(glob, expander)| {
                let pattern = compile_glob(&glob)?;
                Ok(Route {
                    glob,
                    pattern,
                    expander,
                })
            })
            .collect::<PrepResult<Vec<_>>>()?;
        Ok(Self {
            routes,
            overlaps: DashSet::new(),
            warnings: WarningLog::new(),
        })
    }

    /// One literal expander per glob of `mapping`.
    pub fn literal(mapping: &MacroMapping) -> PrepResult<Self> {
        let routes = mapping
            .iter()
            .map(|(glob, tokens)| {
                let expander: Box<dyn MacroExpander> =
                    Box::new(LiteralMacroExpander::new(tokens.clone()));
                (glob.to_string(), expander)
            })
            .collect();
        Self::new(routes)
    }

    /// One pattern expander per glob of `mapping`, sharing the generator and
    /// restorer.
    pub fn pattern(
        mapping: &MacroMapping,
        pattern: &str,
        generator: Option<Arc<dyn MacroValueGenerator>>,
        restorer: Option<Arc<dyn MacroValueRestorer>>,
    ) -> PrepResult<Self> {
        let mut routes = Vec::with_capacity(mapping.len());
        for (glob, tokens) in mapping.iter() {
            let mut expander = PatternMacroExpander::new(pattern, tokens.clone())?;
            if let Some(generator) = &generator {
                expander = expander.with_generator(Arc::clone(generator));
            }
            if let Some(restorer) = &restorer {
                expander = expander.with_restorer(Arc::clone(restorer));
            }
            let expander: Box<dyn MacroExpander> = Box::new(expander);
            routes.push((glob.to_string(), expander));
        }
        Self::new(routes)
    }

    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.glob.as_str())
    }

    fn matching(&self, path: &str) -> Vec<&Route> {
        self.routes
            .iter()
            .filter(|route| route.pattern.matches_with(path, MATCH_OPTIONS))
            .collect()
    }

    /// Warns once per path that matches more than one glob.
    pub fn expand(&self, path: &str, text: &str) -> String {
        let routes = self.matching(path);
        if routes.len() > 1 && self.overlaps.insert(path.to_string()) {
            let globs: Vec<&str> = routes.iter().map(|route| route.glob.as_str()).collect();
            self.warnings.warn(
                WarningKind::MultipleGlobMatch,
                format!(
                    "Path {path} matches multiple patterns; applying all in order: {}.",
                    globs.join(", ")
                ),
            );
        }
        let mut text = text.to_string();
        for route in routes {
            debug!("macro event=route path={} glob={}", path, route.glob);
            text = route.expander.expand(path, &text);
        }
        text
    }

    /// Same routes, same order as [`expand`](Self::expand). A value produced
    /// by one route and rewritten by a later one is restored only as far as
    /// the earlier route's output.
    pub fn un_expand(&self, path: &str, text: &str) -> String {
        let mut text = text.to_string();
        for route in self.matching(path) {
            text = route.expander.un_expand(path, &text);
        }
        text
    }

    /// The router's own warnings, then each expander's, in table order.
    pub fn all_messages(&self) -> Vec<String> {
        let mut messages = self.warnings.messages();
        for route in &self.routes {
            messages.extend(route.expander.warnings());
        }
        messages
    }
}

fn compile_glob(glob: &str) -> PrepResult<Pattern> {
    Pattern::new(glob).map_err(|err| {
        PrepError::config(format!("invalid glob '{glob}': {err}"))
            .with_context("Globs use shell syntax, e.g. \"*.sql\" or \"etl/**/*.ksh\"")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenMap;

    fn mapping(entries: &[(&str, &[(&str, &str)])]) -> MacroMapping {
        entries
            .iter()
            .map(|(glob, tokens)| {
                let tokens: TokenMap = tokens
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (*glob, tokens)
            })
            .collect()
    }

    #[test]
    fn routes_by_glob() {
        let router = MacroExpanderRouter::literal(&mapping(&[
            ("*.sql", &[("${foo}", "1")]),
            ("*.ksh", &[("${foo}", "2")]),
        ]))
        .unwrap();
        assert_eq!(router.expand("a.sql", "${foo}"), "1");
        assert_eq!(router.expand("dir/b.ksh", "${foo}"), "2");
        assert_eq!(router.expand("c.txt", "${foo}"), "${foo}");
        assert_eq!(router.un_expand("a.sql", "1"), "${foo}");
        assert_eq!(router.un_expand("c.txt", "1"), "1");
    }

    #[test]
    fn glob_star_crosses_directories() {
        let router =
            MacroExpanderRouter::literal(&mapping(&[("*.sql", &[("${x}", "y")])])).unwrap();
        assert_eq!(router.expand("a/b/c.sql", "${x}"), "y");
    }

    #[test]
    fn glob_match_is_case_sensitive() {
        let router =
            MacroExpanderRouter::literal(&mapping(&[("*.sql", &[("${x}", "y")])])).unwrap();
        assert_eq!(router.expand("A.SQL", "${x}"), "${x}");
    }

    #[test]
    fn overlapping_globs_chain_and_warn_once() {
        let router = MacroExpanderRouter::literal(&mapping(&[
            ("*.sql", &[("${a}", "${b}")]),
            ("etl/*", &[("${b}", "2")]),
        ]))
        .unwrap();
        assert_eq!(router.expand("etl/x.sql", "${a}"), "2");
        router.expand("etl/x.sql", "${a}");
        let messages = router.all_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("*.sql, etl/*"));
    }

    #[test]
    fn chained_routes_restore_only_the_last_step() {
        let router = MacroExpanderRouter::literal(&mapping(&[
            ("*.sql", &[("${a}", "${b}")]),
            ("etl/*", &[("${b}", "2")]),
        ]))
        .unwrap();
        let expanded = router.expand("etl/x.sql", "select ${a};");
        assert_eq!(expanded, "select 2;");
        assert_eq!(router.un_expand("etl/x.sql", &expanded), "select ${b};");
    }

    #[test]
    fn invalid_glob_is_config_error() {
        let err = MacroExpanderRouter::literal(&mapping(&[("[*.sql", &[])])).err().unwrap();
        assert!(err.is_preflight());
    }

    #[test]
    fn messages_are_router_first_then_table_order() {
        let router = MacroExpanderRouter::pattern(
            &mapping(&[("*.sql", &[]), ("*", &[])]),
            r"\$\{(\w+)\}",
            None,
            None,
        )
        .unwrap();
        router.expand("a.sql", "${x}");
        let messages = router.all_messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("matches multiple patterns"));
        assert!(messages[1].contains("Could not expand '${x}'"));
        assert!(messages[2].contains("Could not expand '${x}'"));
    }
}
