//! Identifiers for stored source documents and the artifacts compiled from them.
//!
//! Both identifiers are plain file names: directory components are discarded and the
//! stem is reduced to ASCII letters, digits, `-`, `_` and inner dots, so a parsed
//! identifier always names a single entry directly inside its store directory.
//! Parsing is idempotent: an identifier's own name parses back to itself.

use std::fmt;

use serde::Serialize;

use super::error::DomainError;

pub const SOURCE_EXTENSION: &str = "tex";
pub const ARTIFACT_EXTENSION: &str = "pdf";
pub const DEFAULT_DOCUMENT_NAME: &str = "document.tex";

/// Sanitized name of a `.tex` document held by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    /// Normalise a caller-supplied file name into a document identifier.
    ///
    /// `../notes/Chapter One.tex`, `Chapter_One` and `Chapter One.TEX` all resolve to
    /// `Chapter_One.tex`. Names with nothing usable left are rejected.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let stem = sanitize_stem(raw, SOURCE_EXTENSION, "filename")?;
        Ok(Self(format!("{stem}.{SOURCE_EXTENSION}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn stem(&self) -> &str {
        strip_extension(&self.0, SOURCE_EXTENSION)
    }

    /// The artifact this document compiles to: same stem, output extension.
    pub fn artifact(&self) -> ArtifactRef {
        ArtifactRef(format!("{}.{ARTIFACT_EXTENSION}", self.stem()))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sanitized name of a compiled `.pdf` held by the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let stem = sanitize_stem(raw, ARTIFACT_EXTENSION, "artifact")?;
        Ok(Self(format!("{stem}.{ARTIFACT_EXTENSION}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize_stem(raw: &str, extension: &str, field: &'static str) -> Result<String, DomainError> {
    let file_name = raw
        .trim()
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let joined = strip_extension(file_name, extension)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let stem = kept.trim_matches(|c| c == '.' || c == '_');
    if stem.is_empty() {
        return Err(DomainError::validation(
            field,
            format!("`{raw}` does not contain a usable file name"),
        ));
    }
    Ok(stem.to_string())
}

fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    let suffix_len = extension.len() + 1;
    let Some(split) = name.len().checked_sub(suffix_len) else {
        return name;
    };
    if !name.is_char_boundary(split) {
        return name;
    }
    let (stem, suffix) = name.split_at(split);
    if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(extension) {
        stem
    } else {
        name
    }
}
