//! Declared function signatures and parameter-list splitting.

use std::fmt;

use serde::Deserialize;

/// One public function recovered from a declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredSignature {
    /// Function name (last leading token).
    pub name: String,
    /// Raw parameter descriptions, each trimmed. Empty for `()`.
    pub parameters: Vec<String>,
    /// Return type (second-to-last leading token).
    pub return_type: String,
    /// Tokens before the return type, e.g. `public`, `inline`.
    pub qualifiers: Vec<String>,
    /// Text after the closing parenthesis up to end of line, unparsed.
    pub trailing_attributes: String,
    /// 1-based line of the introducer keyword.
    pub line: usize,
}

impl DeclaredSignature {
    /// The `(params) -> return_type` form used as the report marker.
    pub fn arrow_signature(&self) -> String {
        format!("({}) -> {}", self.parameters.join(", "), self.return_type)
    }
}

impl fmt::Display for DeclaredSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for qualifier in &self.qualifiers {
            write!(f, "{} ", qualifier)?;
        }
        write!(
            f,
            "{} {}({}){}",
            self.return_type,
            self.name,
            self.parameters.join(", "),
            self.trailing_attributes
        )
    }
}

/// How a parameter list is cut into individual parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSplit {
    /// Split on every comma. Commas inside nested brackets are not protected.
    #[default]
    Naive,
    /// Split only on commas outside `()`, `[]` and `<>`.
    Nested,
}

impl ParamSplit {
    /// Split raw parameter-list text into trimmed parameters.
    ///
    /// Whitespace-only text yields no parameters.
    pub fn split(self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self {
            ParamSplit::Naive => text.split(',').map(|p| p.trim().to_string()).collect(),
            ParamSplit::Nested => split_top_level(text),
        }
    }
}

/// Split on commas at bracket depth zero.
fn split_top_level(text: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth = (depth - 1).max(0),
            ',' if depth == 0 => {
                params.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(text[start..].trim().to_string());

    params
}
