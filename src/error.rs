//! Error types for declmatch

use std::path::PathBuf;

use thiserror::Error;

use crate::decl::DeclError;
use crate::ir::IrParseError;
use crate::toolchain::ToolchainError;

/// Result type for declmatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run. Nothing is reported when one of these occurs.
#[derive(Error, Debug)]
pub enum Error {
    /// Compiling the source module failed
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// An input file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed declaration in strict mode
    #[error("malformed declaration in {}: {source}", path.display())]
    Declaration { path: PathBuf, source: DeclError },

    /// The compiled module could not be indexed
    #[error("invalid IR in {}: {source}", path.display())]
    Ir { path: PathBuf, source: IrParseError },

    /// The report sink rejected a write
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}
