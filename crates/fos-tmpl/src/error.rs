//! Binder errors

use fos_dom::DomError;
use fos_vdom::TransactionError;

use crate::ParseError;

/// Errors returned while binding a template
#[derive(Debug, thiserror::Error)]
pub enum TmplError {
    /// A directive value is not a valid expression
    #[error("invalid {directive} expression '{source_text}': {error}")]
    Parse {
        directive: String,
        source_text: String,
        #[source]
        error: ParseError,
    },

    /// A `:ref` name shadows a state property or another reference
    #[error("reference '{name}' conflicts with {with}")]
    RefConflict { name: String, with: &'static str },

    /// A directive that needs a parent node was put on the mount root
    #[error("{directive} cannot be used on the mount root")]
    MisplacedDirective { directive: &'static str },

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Rendering the root into the document failed
    #[error("failed to attach the root: {0}")]
    Dom(#[from] DomError),
}

impl TmplError {
    pub(crate) fn parse(directive: &str, source_text: &str, error: ParseError) -> Self {
        TmplError::Parse {
            directive: directive.to_string(),
            source_text: source_text.to_string(),
            error,
        }
    }
}

pub type TmplResult<T> = Result<T, TmplError>;
