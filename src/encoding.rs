//! Byte-to-text decoding for input files.
//!
//! UTF-8 (with or without BOM) is recognised directly. Anything else falls
//! back to ISO-8859-1, which maps every byte to a code point, unless the
//! detector is strict.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::error::{PrepError, PrepResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

static FALLBACK_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EncodingDetector {
    fallback: Option<Encoding>,
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self {
            fallback: Some(Encoding::Latin1),
        }
    }
}

impl EncodingDetector {
    /// Only accept UTF-8.
    pub fn strict() -> Self {
        Self { fallback: None }
    }

    pub fn detect(&self, bytes: &[u8]) -> Option<Encoding> {
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if std::str::from_utf8(body).is_ok() {
            return Some(Encoding::Utf8);
        }
        if let Some(fallback) = self.fallback {
            if !FALLBACK_WARNED.swap(true, Ordering::SeqCst) {
                warn!(
                    "encoding event=fallback encoding={} reason=not-utf8",
                    fallback.name()
                );
            }
        }
        self.fallback
    }

    /// Decode `bytes` read from `path`; `path` only labels errors.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> PrepResult<String> {
        match self.detect(bytes) {
            Some(Encoding::Utf8) => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(body.to_vec()).map_err(|_| PrepError::Encoding {
                    path: path.to_path_buf(),
                    encoding: Encoding::Utf8.name().to_string(),
                })
            }
            Some(Encoding::Latin1) => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            None => Err(PrepError::Encoding {
                path: path.to_path_buf(),
                encoding: Encoding::Utf8.name().to_string(),
            }),
        }
    }
}
