//! Error types shared by the CLI and the library.

use thiserror::Error;

/// The four error kinds the rewriter can produce.
#[derive(Error, Debug)]
pub enum RtppError {
    #[error("could not read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error at line {line}, column {column}")]
    Parse { line: usize, column: usize },
    #[error("pass invariant violated: {0}")]
    Invariant(String),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

pub type RtppResult<T> = Result<T, RtppError>;
