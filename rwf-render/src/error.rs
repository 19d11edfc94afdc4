//! Global error type.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] crate::config::Error),

    #[error("no template given, set one of template, inline, path or content")]
    NoTemplate,

    #[error("no compiler registered for engine \"{0}\"")]
    UnknownEngine(String),

    #[error("template \"{0}\" does not exist")]
    TemplateDoesNotExist(PathBuf),

    #[error("{path}:{line}:{column}: {message}")]
    Syntax {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("reached end of template while performing \"{0}\", did you forget a closing tag?")]
    Eof(&'static str),

    #[error("variable \"{0}\" is not defined or in scope")]
    UndefinedVariable(String),

    #[error("method \"{0}\" is not defined on \"{1}\"")]
    UnknownMethod(String, String),

    #[error("template called yield but no content block was given")]
    NoBlockGiven,

    #[error("{0}")]
    Runtime(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
