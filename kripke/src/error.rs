use miette::Diagnostic;
use thiserror::Error;

use crate::model::ModelError;
use crate::model_checking::CheckError;
use crate::parse::ParseError;
use crate::token::Span;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Check(#[from] CheckError),
    #[error("could not write results")]
    #[diagnostic(code(kripke::io))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Where in the input the error was found, if it came from the input.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(err) => Some(err.span()),
            Error::Model(err) => err.span(),
            Error::Check(_) | Error::Io(_) => None,
        }
    }
}
