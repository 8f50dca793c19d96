// src/error.rs

use thiserror::Error;

/// Shown when the sheet answers with a login page instead of data.
pub const MAKE_PUBLIC_MSG: &str =
    "No se pudo leer la hoja. Verificá que el documento sea público o esté publicado.";

/// Everything a lookup can surface to the caller. A missing row is not an
/// error: lookups return `Ok(None)` for that.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("Ingresá una patente.")]
    EmptyInput,

    /// Network failure, non-success status or an auth wall.
    #[error("{0}")]
    SourceUnavailable(String),

    /// Unparsable payload, or a table without the columns we need.
    #[error("{0}")]
    MalformedSource(String),
}

impl LookupError {
    pub fn auth_wall() -> Self {
        LookupError::SourceUnavailable(MAKE_PUBLIC_MSG.to_string())
    }

    pub fn is_auth_wall(&self) -> bool {
        matches!(self, LookupError::SourceUnavailable(msg) if msg == MAKE_PUBLIC_MSG)
    }

    /// Rank among swallowed tier errors; the highest one is surfaced.
    pub(crate) fn specificity(&self) -> u8 {
        match self {
            LookupError::EmptyInput => 4,
            e if e.is_auth_wall() => 3,
            LookupError::SourceUnavailable(_) => 2,
            LookupError::MalformedSource(_) => 1,
        }
    }
}

impl From<anyhow::Error> for LookupError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line
        LookupError::SourceUnavailable(format!("{:#}", err))
    }
}
