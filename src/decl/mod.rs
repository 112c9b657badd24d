//! Declaration file support.
//!
//! This module provides:
//! - A tokenizer for declaration text (comments and strings are opaque)
//! - A recursive-descent recognizer for public function declarations
//! - `DeclaredSignature`, the structured record of one declaration

mod lexer;
mod parser;
mod signature;

pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse_declarations, parse_declarations_with, DeclError, ParseOptions, ParseResult};
pub use signature::{DeclaredSignature, ParamSplit};
