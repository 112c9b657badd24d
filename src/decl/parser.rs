//! Recursive-descent recognizer for public function declarations.
//!
//! Only the subset needed to recover function signatures is understood:
//!
//! ```text
//! decl     := INTRODUCER leading '(' params ')' trailing
//! leading  := qualifier* return_type name
//! ```
//!
//! Every other construct in the file is skipped without complaint.

use thiserror::Error;
use tracing::{debug, warn};

use super::lexer::{tokenize, Token, TokenKind};
use super::signature::{DeclaredSignature, ParamSplit};

/// A recognized declaration that could not be turned into a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclError {
    /// Only one leading token, so the return type and name cannot both be known.
    #[error("line {line}: declaration `{text}` needs both a return type and a name")]
    InsufficientLeadingTokens { line: usize, text: String },
}

impl DeclError {
    /// 1-based line of the offending declaration.
    pub fn line(&self) -> usize {
        match self {
            DeclError::InsufficientLeadingTokens { line, .. } => *line,
        }
    }
}

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keywords that introduce a declaration.
    pub introducers: Vec<String>,
    /// Parameter splitting rule.
    pub param_split: ParamSplit,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            introducers: vec!["cdef".to_string()],
            param_split: ParamSplit::Naive,
        }
    }
}

/// Outcome of parsing one declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Recovered signatures in source order.
    pub signatures: Vec<DeclaredSignature>,
    /// Malformed declarations that were skipped, in source order.
    pub errors: Vec<DeclError>,
}

/// Parse declaration text with the default options.
pub fn parse_declarations(source: &str) -> ParseResult {
    parse_declarations_with(source, &ParseOptions::default())
}

/// Parse declaration text.
pub fn parse_declarations_with(source: &str, options: &ParseOptions) -> ParseResult {
    DeclParser::new(source, options).parse_file()
}

/// Leading tokens of one declaration, before classification.
struct Leading<'a> {
    tokens: Vec<&'a str>,
}

/// Parameter list located between balanced parentheses.
struct ParamList {
    text: String,
    close: Token,
}

struct DeclParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    options: &'a ParseOptions,
}

impl<'a> DeclParser<'a> {
    fn new(source: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            pos: 0,
            options,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn is_introducer(&self, token: &Token) -> bool {
        token.kind == TokenKind::Ident
            && self
                .options
                .introducers
                .iter()
                .any(|kw| kw == token.text(self.source))
    }

    /// file := (decl | other)*
    fn parse_file(mut self) -> ParseResult {
        let mut result = ParseResult::default();

        while let Some(token) = self.bump() {
            if !self.is_introducer(&token) {
                continue;
            }

            let resume = self.pos;
            match self.parse_declaration(&token) {
                Ok(Some(signature)) => {
                    debug!(
                        line = signature.line,
                        name = %signature.name,
                        "recognized declaration"
                    );
                    result.signatures.push(signature);
                }
                Ok(None) => {
                    self.pos = resume;
                }
                Err(err) => {
                    warn!("skipping malformed declaration: {}", err);
                    result.errors.push(err);
                }
            }
        }

        result
    }

    /// decl := INTRODUCER leading '(' params ')' trailing
    ///
    /// `Ok(None)` means the introducer does not start a function declaration.
    fn parse_declaration(
        &mut self,
        introducer: &Token,
    ) -> Result<Option<DeclaredSignature>, DeclError> {
        let Some(leading) = self.parse_leading() else {
            return Ok(None);
        };
        let Some(params) = self.parse_params() else {
            return Ok(None);
        };
        let trailing = self.parse_trailing(params.close.span.end);

        let Some((&name, rest)) = leading.tokens.split_last() else {
            return Ok(None);
        };
        let Some((&return_type, qualifiers)) = rest.split_last() else {
            return Err(DeclError::InsufficientLeadingTokens {
                line: introducer.line,
                text: self.source[introducer.span.start..params.close.span.end].to_string(),
            });
        };

        Ok(Some(DeclaredSignature {
            name: name.to_string(),
            parameters: self.options.param_split.split(&params.text),
            return_type: return_type.to_string(),
            qualifiers: qualifiers.iter().map(|q| q.to_string()).collect(),
            trailing_attributes: trailing,
            line: introducer.line,
        }))
    }

    /// leading := IDENT+ on the introducer's line, terminated by '('.
    fn parse_leading(&mut self) -> Option<Leading<'a>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::Space => {}
                TokenKind::Ident => tokens.push(token.text(self.source)),
                TokenKind::LParen if !tokens.is_empty() => return Some(Leading { tokens }),
                _ => return None,
            }
        }
    }

    /// params := text up to the ')' balancing the already consumed '('.
    ///
    /// May span lines. Comments inside the list are dropped.
    fn parse_params(&mut self) -> Option<ParamList> {
        let mut depth = 1usize;
        let mut text = String::new();

        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(ParamList { text, close: token });
                    }
                }
                TokenKind::Comment => continue,
                _ => {}
            }
            text.push_str(token.text(self.source));
        }
    }

    /// trailing := raw text after ')' to end of line.
    fn parse_trailing(&mut self, from: usize) -> String {
        let rest = &self.source[from..];
        let end = rest.find('\n').map(|i| from + i).unwrap_or(self.source.len());

        while self.peek().is_some_and(|t| t.span.start < end) {
            self.pos += 1;
        }

        self.source[from..end].trim_end_matches('\r').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> DeclaredSignature {
        let result = parse_declarations(source);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        assert_eq!(result.signatures.len(), 1, "{:?}", result.signatures);
        result.signatures.into_iter().next().unwrap()
    }

    #[test]
    fn parses_plain_declaration() {
        let sig = parse_one("cdef int foo(int a, int b) noexcept");
        assert_eq!(sig.name, "foo");
        assert_eq!(sig.return_type, "int");
        assert!(sig.qualifiers.is_empty());
        assert_eq!(sig.parameters, vec!["int a", "int b"]);
        assert_eq!(sig.trailing_attributes, " noexcept");
        assert_eq!(sig.line, 1);
    }

    #[test]
    fn parses_qualifiers() {
        let sig = parse_one("cdef public double bar(double x)");
        assert_eq!(sig.qualifiers, vec!["public"]);
        assert_eq!(sig.return_type, "double");
        assert_eq!(sig.name, "bar");
        assert_eq!(sig.trailing_attributes, "");
    }

    #[test]
    fn parses_several_qualifiers_in_order() {
        let sig = parse_one("cdef public api inline long baz()");
        assert_eq!(sig.qualifiers, vec!["public", "api", "inline"]);
        assert_eq!(sig.return_type, "long");
        assert_eq!(sig.name, "baz");
    }

    #[test]
    fn empty_parens_mean_no_parameters() {
        assert!(parse_one("cdef int nothing()").parameters.is_empty());
        assert!(parse_one("cdef int nothing(  )").parameters.is_empty());
    }

    #[test]
    fn skips_comment_lines_and_keeps_order() {
        let source = "\
cdef int first(int a)
# this file declares the public API
cdef double second(double x, double y) except? -1
";
        let result = parse_declarations(source);
        let names: Vec<&str> = result.signatures.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(result.signatures[1].line, 3);
        assert_eq!(result.signatures[1].trailing_attributes, " except? -1");
    }

    #[test]
    fn ignores_commented_out_declaration() {
        let result = parse_declarations("# cdef int hidden(int a)\ncdef int shown()");
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(result.signatures[0].name, "shown");
    }

    #[test]
    fn ignores_declaration_inside_docstring() {
        let source = "\"\"\"\ncdef int hidden(int a)\n\"\"\"\ncdef int shown()\n";
        let result = parse_declarations(source);
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(result.signatures[0].name, "shown");
    }

    #[test]
    fn non_function_cdefs_are_skipped() {
        let source = "\
cdef extern from \"math.h\":
    double sqrt(double x)
cdef class Solver:
    cdef int size
    cdef int step(self, int n)
cdef int counter
";
        let result = parse_declarations(source);
        assert!(result.errors.is_empty());
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(result.signatures[0].name, "step");
        assert_eq!(result.signatures[0].parameters, vec!["self", "int n"]);
    }

    #[test]
    fn leading_tokens_do_not_cross_lines() {
        let source = "cdef int x\ncdef int foo(int a)";
        let result = parse_declarations(source);
        assert_eq!(result.signatures.len(), 1);
        assert!(result.signatures[0].qualifiers.is_empty());
        assert_eq!(result.signatures[0].name, "foo");
    }

    #[test]
    fn pointer_return_is_not_recognized() {
        let result = parse_declarations("cdef double* values(int n)");
        assert!(result.signatures.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn single_leading_token_is_reported_and_skipped() {
        let source = "cdef foo(int a)\ncdef int bar(int b)\n";
        let result = parse_declarations(source);
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(result.signatures[0].name, "bar");
        assert_eq!(
            result.errors,
            vec![DeclError::InsufficientLeadingTokens {
                line: 1,
                text: "cdef foo(int a)".to_string(),
            }]
        );
        assert_eq!(result.errors[0].line(), 1);
    }

    #[test]
    fn multi_line_parameter_list() {
        let source = "\
cdef int spread(int a,   # first
                int b) nogil
";
        let sig = parse_one(source);
        assert_eq!(sig.parameters, vec!["int a", "int b"]);
        assert_eq!(sig.trailing_attributes, " nogil");
    }

    #[test]
    fn unbalanced_parameter_list_is_skipped() {
        let result = parse_declarations("cdef int broken(int a\n");
        assert!(result.signatures.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn nested_brackets_are_split_naively_by_default() {
        let sig = parse_one("cdef int apply(int (*cb)(int, int), int n)");
        assert_eq!(sig.parameters, vec!["int (*cb)(int", "int)", "int n"]);
    }

    #[test]
    fn nested_split_option_keeps_nested_commas() {
        let options = ParseOptions {
            param_split: ParamSplit::Nested,
            ..ParseOptions::default()
        };
        let result =
            parse_declarations_with("cdef int apply(int (*cb)(int, int), int n)", &options);
        assert_eq!(
            result.signatures[0].parameters,
            vec!["int (*cb)(int, int)", "int n"]
        );
    }

    #[test]
    fn introducers_are_whole_words_and_configurable() {
        let source = "cpdef int a()\nxcdef int b()\ncdef int c()";
        let result = parse_declarations(source);
        let names: Vec<&str> = result.signatures.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["c"]);

        let options = ParseOptions {
            introducers: vec!["cdef".to_string(), "cpdef".to_string()],
            ..ParseOptions::default()
        };
        let result = parse_declarations_with(source, &options);
        let names: Vec<&str> = result.signatures.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn trailing_text_is_verbatim_and_drops_carriage_return() {
        let sig = parse_one("cdef int f(int a) except -1 nogil  # note\r\n");
        assert_eq!(sig.trailing_attributes, " except -1 nogil  # note");
    }

    #[test]
    fn duplicates_are_kept() {
        let result = parse_declarations("cdef int f()\ncdef long f(int a)\n");
        assert_eq!(result.signatures.len(), 2);
        assert_eq!(result.signatures[0].return_type, "int");
        assert_eq!(result.signatures[1].return_type, "long");
    }

    #[test]
    fn trailing_introducer_on_same_line_is_consumed() {
        let result = parse_declarations("cdef int f() ; cdef int g()\n");
        assert_eq!(result.signatures.len(), 1);
        assert_eq!(result.signatures[0].trailing_attributes, " ; cdef int g()");
    }
}
