//! Name-keyed index over textual LLVM IR.
//!
//! Only top-level `define` and `declare` entries are indexed. Other module-level
//! entities (globals, metadata, attribute groups) are passed over; lines that
//! cannot start any IR entity are rejected.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Whether an entry carries a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// `define ... { ... }`
    Definition,
    /// `declare ...`, external with no body.
    Declaration,
}

/// One function as it appears in the compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefinition {
    name: String,
    kind: DefinitionKind,
    text: String,
    line: usize,
}

impl CompiledDefinition {
    pub fn new(name: impl Into<String>, kind: DefinitionKind, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            text: text.into(),
            line: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DefinitionKind {
        self.kind
    }

    pub fn is_declaration(&self) -> bool {
        self.kind == DefinitionKind::Declaration
    }

    /// Verbatim IR text of the entry.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line where the entry starts, or 0 when built by hand.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for CompiledDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Errors raised while indexing IR text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrParseError {
    #[error("line {line}: function entry has no `@name(` symbol")]
    MissingName { line: usize },

    #[error("line {line}: argument list of @{name} is never closed")]
    UnterminatedArguments { line: usize, name: String },

    #[error("line {line}: definition of @{name} has no opening `{{`")]
    MissingBody { line: usize, name: String },

    #[error("line {line}: body of @{name} is never closed")]
    UnterminatedBody { line: usize, name: String },

    #[error("line {line}: @{name} is defined more than once")]
    Redefinition { line: usize, name: String },

    #[error("line {line}: `{text}` is not a top-level IR entity")]
    UnexpectedLine { line: usize, text: String },

    /// Rejected by the LLVM assembly parser or verifier.
    #[error("{message}")]
    Llvm { message: String },
}

/// Lookup of compiled functions by exact symbol name.
pub trait FunctionLookup {
    /// The entry named `name`, or `None` when the module has no such function.
    fn lookup(&self, name: &str) -> Option<&CompiledDefinition>;
}

impl FunctionLookup for HashMap<String, CompiledDefinition> {
    fn lookup(&self, name: &str) -> Option<&CompiledDefinition> {
        self.get(name)
    }
}

/// Symbol name of a function entry: `@name(` or `@"quoted name"(`.
static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@("(?:[^"\\]|\\.)*"|[-a-zA-Z$._0-9]+)\s*\("#).unwrap()
});

/// Start of a line that may appear at module level.
static TOP_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:[;@%!$^]|(?:define|declare|attributes|target|source_filename|module",
        r"|uselistorder|uselistorder_bb)\b)",
    ))
    .unwrap()
});

/// Parsed IR module, read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    functions: HashMap<String, CompiledDefinition>,
}

impl IrModule {
    /// Index every function in `source`.
    ///
    /// With the `llvm` feature the text goes through LLVM's own assembly
    /// parser and verifier; otherwise through [`IrModule::scan`].
    pub fn parse(source: &str) -> Result<Self, IrParseError> {
        #[cfg(feature = "llvm")]
        {
            super::llvm::parse_functions(source).map(|functions| Self { functions })
        }
        #[cfg(not(feature = "llvm"))]
        {
            Self::scan(source)
        }
    }

    /// Index `define` and `declare` entries with the built-in text scanner.
    ///
    /// Module-level lines that cannot start an IR entity are rejected.
    pub fn scan(source: &str) -> Result<Self, IrParseError> {
        let mut functions = HashMap::new();
        let mut offset = 0;
        let mut line = 1;

        while offset < source.len() {
            let eol = line_end(source, offset);
            let text = &source[offset..eol];

            let (entry, next) = if text.starts_with("define ") {
                let entry = parse_define(source, offset, eol, line)?;
                let next = line_end(source, offset + entry.text.len());
                (Some(entry), next)
            } else if text.starts_with("declare ") {
                let (name, _) = function_name(text).ok_or(IrParseError::MissingName { line })?;
                let entry = CompiledDefinition {
                    name,
                    kind: DefinitionKind::Declaration,
                    text: text.trim_end().to_string(),
                    line,
                };
                (Some(entry), eol)
            } else {
                check_top_level(text, line)?;
                (None, eol)
            };

            if let Some(entry) = entry {
                if functions.contains_key(&entry.name) {
                    return Err(IrParseError::Redefinition {
                        line,
                        name: entry.name,
                    });
                }
                debug!(name = %entry.name, line, "indexed IR function");
                functions.insert(entry.name.clone(), entry);
            }

            line += source[offset..next].matches('\n').count();
            offset = next;
            if offset < source.len() {
                offset += 1;
                line += 1;
            }
        }

        Ok(Self { functions })
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All indexed entries ordered by their position in the IR text.
    pub fn functions(&self) -> Vec<&CompiledDefinition> {
        let mut entries: Vec<_> = self.functions.values().collect();
        entries.sort_by_key(|f| f.line);
        entries
    }
}

impl FunctionLookup for IrModule {
    fn lookup(&self, name: &str) -> Option<&CompiledDefinition> {
        self.functions.get(name)
    }
}

/// Byte offset of the newline ending the line that contains `from`, or end of input.
fn line_end(source: &str, from: usize) -> usize {
    source[from..]
        .find('\n')
        .map(|i| from + i)
        .unwrap_or(source.len())
}

/// Blank lines and indented continuations pass; anything else must open an entity.
fn check_top_level(text: &str, line: usize) -> Result<(), IrParseError> {
    let text = text.trim_end();
    if text.is_empty() || text.starts_with(char::is_whitespace) || TOP_LEVEL.is_match(text) {
        return Ok(());
    }
    Err(IrParseError::UnexpectedLine {
        line,
        text: text.to_string(),
    })
}

fn parse_define(
    source: &str,
    start: usize,
    eol: usize,
    line: usize,
) -> Result<CompiledDefinition, IrParseError> {
    let header = &source[start..eol];
    let (name, open_paren) = function_name(header).ok_or(IrParseError::MissingName { line })?;

    let Some(close_paren) = find_closing_paren(header, open_paren) else {
        return Err(IrParseError::UnterminatedArguments { line, name });
    };
    let Some(open) = find_body_brace(header, close_paren + 1) else {
        return Err(IrParseError::MissingBody { line, name });
    };
    let Some(close) = find_matching_brace(source, start + open) else {
        return Err(IrParseError::UnterminatedBody { line, name });
    };

    Ok(CompiledDefinition {
        name,
        kind: DefinitionKind::Definition,
        text: source[start..=close].to_string(),
        line,
    })
}

/// Symbol name and the offset of the `(` opening its argument list.
fn function_name(header: &str) -> Option<(String, usize)> {
    let caps = FUNCTION_NAME.captures(header)?;
    let open_paren = caps.get(0)?.end() - 1;
    let raw = caps.get(1)?.as_str();
    let name = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(quoted) => unescape_name(quoted),
        None => raw.to_string(),
    };
    Some((name, open_paren))
}

/// Decode `\XX` hex escapes used in quoted LLVM identifiers.
fn unescape_name(quoted: &str) -> String {
    let bytes = quoted.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'\\' && pos + 2 < bytes.len() {
            let hex = &bytes[pos + 1..pos + 3];
            if hex.iter().all(|b| b.is_ascii_hexdigit()) {
                let digits = std::str::from_utf8(hex).unwrap_or_default();
                if let Ok(b) = u8::from_str_radix(digits, 16) {
                    out.push(b);
                    pos += 3;
                    continue;
                }
            }
        }
        out.push(bytes[pos]);
        pos += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Offset of the `)` closing the argument list opened at `open_paren`.
///
/// Struct and function-pointer types nest their own parentheses and braces.
fn find_closing_paren(header: &str, open_paren: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in header[open_paren..].char_indices() {
        match c {
            '"' => in_string = !in_string,
            _ if in_string => {}
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_paren + i);
                }
            }
            ';' => return None,
            _ => {}
        }
    }
    None
}

/// Position of the body `{`: the first brace after the argument list and its
/// attributes, outside string literals and comments.
fn find_body_brace(header: &str, from: usize) -> Option<usize> {
    let mut in_string = false;
    for (i, c) in header[from..].char_indices() {
        match c {
            '"' => in_string = !in_string,
            ';' if !in_string => return None,
            '{' if !in_string => return Some(from + i),
            _ => {}
        }
    }
    None
}

/// Find the `}` closing the `{` at `open_pos`, skipping strings and `;` comments.
fn find_matching_brace(source: &str, open_pos: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    if open_pos >= bytes.len() || bytes[open_pos] != b'{' {
        return None;
    }

    let mut depth = 1;
    let mut pos = open_pos + 1;
    let mut in_string = false;
    let mut in_comment = false;

    while pos < bytes.len() {
        let c = bytes[pos];

        if in_comment {
            if c == b'\n' {
                in_comment = false;
            }
        } else if in_string {
            if c == b'"' {
                in_string = false;
            }
        } else {
            match c {
                b'"' => in_string = true,
                b';' => in_comment = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(pos);
                    }
                }
                _ => {}
            }
        }

        pos += 1;
    }

    None
}
