use std::{fmt, str::FromStr};

use serde::Serialize;

use super::error::DomainError;

/// Typesetting engines the service knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineChoice {
    #[default]
    PdfLatex,
    XeLatex,
    LuaLatex,
}

impl EngineChoice {
    pub const ALL: [EngineChoice; 3] = [
        EngineChoice::PdfLatex,
        EngineChoice::XeLatex,
        EngineChoice::LuaLatex,
    ];

    /// Canonical executable basename, also used as the wire name.
    pub fn executable(self) -> &'static str {
        match self {
            EngineChoice::PdfLatex => "pdflatex",
            EngineChoice::XeLatex => "xelatex",
            EngineChoice::LuaLatex => "lualatex",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|choice| choice.executable().eq_ignore_ascii_case(name))
    }

    /// Resolve a loosely-typed engine name; unrecognised names yield `fallback`.
    pub fn resolve_or(name: &str, fallback: EngineChoice) -> Self {
        Self::from_name(name).unwrap_or(fallback)
    }
}

impl fmt::Display for EngineChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

impl FromStr for EngineChoice {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value).ok_or_else(|| {
            DomainError::validation(
                "engine",
                format!("`{value}` is not one of pdflatex, xelatex, lualatex"),
            )
        })
    }
}
