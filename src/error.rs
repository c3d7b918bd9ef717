// ABOUTME: Application-wide error types for convoy.
// ABOUTME: Validation errors abort before side effects and map to exit code 3.

use crate::assemble::AssembleError;
use crate::graph::GraphError;
use crate::manifest::ManifestError;
use thiserror::Error;

/// Manifest problems caught before any collaborator is touched: fixing the
/// manifest fully recovers, nothing is ever partially applied.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] AssembleError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("run history error: {0}")]
    History(String),
}

impl Error {
    /// Exit code when the run never produced a report. Verdict-bearing runs
    /// take their exit code from the report instead.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Manifest(_) | Error::Validation(_) => 3,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
