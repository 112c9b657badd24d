//! Compiled-module support.
//!
//! This module provides:
//! - `FunctionLookup`, the narrow "find function by name" capability
//! - `IrModule`, an index over textual LLVM IR implementing it, backed by
//!   LLVM's own parser when the `llvm` feature is enabled
//! - `CompiledDefinition`, one indexed function rendered as its IR text

#[cfg(feature = "llvm")]
mod llvm;
mod module;

pub use module::{CompiledDefinition, DefinitionKind, FunctionLookup, IrModule, IrParseError};
