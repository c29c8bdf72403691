//! Error types for the mda-bib library.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Recoverable problems found while scanning a BibTeX database.
///
/// These never abort a parse; the parser turns them into warning records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected '{{' or '(' after @{0}")]
    ExpectedOpen(String),

    #[error("expected an entry key")]
    MissingKey,

    #[error("expected ',' after entry key '{0}'")]
    ExpectedComma(String),

    #[error("expected '=' after field name '{0}'")]
    ExpectedEquals(String),

    #[error("invalid field name")]
    RunawayKey,

    #[error("unterminated value")]
    UnterminatedValue,

    #[error("expected a value")]
    MissingValue,

    #[error("expected '{0}' to close the entry")]
    ExpectedClose(char),

    #[error("unknown string macro '{0}'")]
    UnknownMacro(String),
}

/// Errors that occur while linking entries and citations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("unknown citation id: {0}")]
    UnknownCitation(String),

    #[error("unresolved crossref '{target}' in entry '{entry}'")]
    MissingCrossRef { entry: String, target: String },

    #[error("crossref cycle: {}", .0.join(" -> "))]
    CrossRefCycle(Vec<String>),
}

/// Errors raised by style loading and citation processing.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid style: {0}")]
    Style(String),

    #[error("Invalid locale: {0}")]
    Locale(String),

    #[error("Citation processor failed: {0}")]
    Processor(String),
}

impl From<quick_xml::Error> for RenderError {
    fn from(err: quick_xml::Error) -> Self {
        RenderError::Style(err.to_string())
    }
}
