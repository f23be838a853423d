//! Error types for the pre/post-processing engine.
//!
//! Fatal conditions surface as `PrepError`. Each error has a kind (config,
//! pattern, I/O, encoding, translation), a human-readable message, and an
//! optional hint. Recoverable conditions such as ambiguous reversals are not
//! errors; they are recorded in a [`crate::warnings::WarningLog`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Categorized error kinds for diagnostics and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing configuration, detected before any file I/O
    Config,
    /// A heredoc or macro pattern without exactly one capture group
    Pattern,
    /// Read/write failure for one file
    Io,
    /// Input bytes could not be decoded
    Encoding,
    /// The translation step failed
    Translation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "Config error"),
            ErrorKind::Pattern => write!(f, "Pattern error"),
            ErrorKind::Io => write!(f, "I/O error"),
            ErrorKind::Encoding => write!(f, "Encoding error"),
            ErrorKind::Translation => write!(f, "Translation error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("pattern must have a single capturing group, but has {groups}: '{pattern}'")]
    InvalidPattern { pattern: String, groups: usize },

    #[error("invalid regular expression '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: cannot decode input as {encoding}", path.display())]
    Encoding { path: PathBuf, encoding: String },

    #[error("{message}")]
    Translation { message: String },
}

impl PrepError {
    pub fn config(message: impl Into<String>) -> Self {
        PrepError::Config {
            message: message.into(),
            context: None,
        }
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        PrepError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Add a hint (e.g., "Expected: macros: {glob: {token: value}}").
    /// Only config errors carry one; other variants are returned unchanged.
    pub fn with_context(mut self, hint: impl Into<String>) -> Self {
        if let PrepError::Config { context, .. } = &mut self {
            *context = Some(hint.into());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PrepError::InvalidPattern { .. } | PrepError::Regex { .. } => ErrorKind::Pattern,
            PrepError::Config { .. } | PrepError::Yaml(_) => ErrorKind::Config,
            PrepError::Io { .. } => ErrorKind::Io,
            PrepError::Encoding { .. } => ErrorKind::Encoding,
            PrepError::Translation { .. } => ErrorKind::Translation,
        }
    }

    /// Format error with its kind and hint, for terminal output
    pub fn display_simple(&self) -> String {
        let mut msg = format!("{}: {}", self.kind(), self);
        if let PrepError::Config {
            context: Some(hint),
            ..
        } = self
        {
            msg.push_str(&format!("\n  hint: {}", hint));
        }
        msg
    }

    /// Configuration and pattern errors abort a run before any file is touched.
    pub fn is_preflight(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config | ErrorKind::Pattern)
    }
}

/// Convenience type alias for Results with PrepError
pub type PrepResult<T> = Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_shows_hint() {
        let err = PrepError::config("missing key 'macros'")
            .with_context("Expected: macros: {glob: {token: value}}");
        let shown = err.display_simple();
        assert!(shown.starts_with("Config error: missing key 'macros'"));
        assert!(shown.contains("hint: Expected"));
        assert!(err.is_preflight());
    }

    #[test]
    fn io_error_is_not_preflight() {
        let err = PrepError::io("a/b.sql", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_preflight());
        assert_eq!(err.to_string(), "a/b.sql: gone");
    }

    #[test]
    fn pattern_error_names_group_count() {
        let err = PrepError::InvalidPattern {
            pattern: "a(b)(c)".to_string(),
            groups: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Pattern);
        assert!(err.to_string().contains("has 2"));
    }
}
