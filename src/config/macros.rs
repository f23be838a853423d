//! Macro mapping file:
//!
//! ```yaml
//! macros:
//!   "*.sql":
//!     "${env}": "prod"
//!   "etl/*.ksh":
//!     "${LOGON}": "logon_string"
//! ```
//!
//! Globs and tokens keep the order they are written in.
use std::fs;
use std::path::Path;

use glob::Pattern;
use log::{debug, info};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::{PrepError, PrepResult};
use crate::utils::unique_nested_keys;

/// `token -> literal` for one glob, in declaration order.
pub type TokenMap = IndexMap<String, String>;

/// `glob -> tokens`, in declaration order. Router iteration and literal
/// substitution both follow this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroMapping {
    globs: IndexMap<String, TokenMap>,
}

impl<'de> Deserialize<'de> for MacroMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        unique_nested_keys(deserializer).map(|globs| Self { globs })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroFile {
    pub macros: MacroMapping,
}

impl MacroMapping {
    pub fn from_yaml_str(text: &str) -> PrepResult<Self> {
        let file: MacroFile = serde_yaml::from_str(text)?;
        file.macros.validate()?;
        Ok(file.macros)
    }

    pub fn load(path: &Path) -> PrepResult<Self> {
        info!("config event=load kind=macros path={}", path.display());
        let text = fs::read_to_string(path).map_err(|err| PrepError::io(path, err))?;
        let mapping = Self::from_yaml_str(&text).map_err(|err| match err {
            PrepError::Yaml(inner) => PrepError::config(format!(
                "invalid macros file {}: {inner}",
                path.display()
            ))
            .with_context("Expected: macros: {<glob>: {<token>: <value>}}"),
            other => other,
        })?;
        debug!(
            "config event=loaded kind=macros globs={} tokens={}",
            mapping.len(),
            mapping.iter().map(|(_, tokens)| tokens.len()).sum::<usize>()
        );
        Ok(mapping)
    }

    pub fn validate(&self) -> PrepResult<()> {
        for (glob, tokens) in self.globs.iter() {
            Pattern::new(glob).map_err(|err| {
                PrepError::config(format!("invalid glob '{glob}' in macros: {err}"))
            })?;
            if tokens.keys().any(|token| token.is_empty()) {
                return Err(PrepError::config(format!(
                    "empty macro token under glob '{glob}'"
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, glob: &str) -> Option<&TokenMap> {
        self.globs.get(glob)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenMap)> {
        self.globs.iter().map(|(glob, tokens)| (glob.as_str(), tokens))
    }

    pub fn len(&self) -> usize {
        self.globs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, TokenMap)> for MacroMapping {
    fn from_iter<I: IntoIterator<Item = (K, TokenMap)>>(iter: I) -> Self {
        Self {
            globs: iter
                .into_iter()
                .map(|(glob, tokens)| (glob.into(), tokens))
                .collect(),
        }
    }
}
