//! Error taxonomy.
//!
//! Only reading a script can make parsing fail; malformed lines degrade to comments.
//! Actuator failures and locator timeouts surface as unsuccessful
//! [`ExecutionResult`](crate::executor::ExecutionResult)s rather than errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain script text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("script is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Hard failures of the element locator. Never retried.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("reference image {} does not exist", path.display())]
    MissingReference { path: PathBuf },

    #[error("reference image {} could not be decoded: {source}", path.display())]
    UndecodableReference {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("screen source unavailable: {0}")]
    ScreenUnavailable(String),
}

/// Script-authored termination (`abort`). Fatal regardless of the enclosing block.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Execution aborted by abort command at line {line}")]
pub struct AbortSignal {
    pub line: usize,
}
