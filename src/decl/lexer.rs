//! Tokenizer for declaration files.
//!
//! Produces a flat token stream with byte spans. Comments and string literals
//! are single opaque tokens so keywords inside them are never recognized.

use std::ops::Range;

/// Token categories the declaration parser cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of identifier characters (`\w+`).
    Ident,
    LParen,
    RParen,
    /// Horizontal whitespace.
    Space,
    Newline,
    /// `#` to end of line.
    Comment,
    /// Quoted string literal, including triple-quoted strings.
    Str,
    /// Any other single character.
    Punct,
}

/// A token with its byte span and 1-based starting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    pub line: usize,
}

impl Token {
    /// Slice of `source` covered by this token.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}

/// Pull-based lexer over declaration text.
pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            line: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    fn bump_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.cursor += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek_char() {
            if !pred(ch) {
                break;
            }
            self.bump_char();
        }
    }

    /// Consume a string literal opened by `quote`.
    ///
    /// Single-quoted forms stop at an unescaped newline; triple-quoted forms
    /// may span lines. Unterminated literals end at end of input.
    fn lex_string(&mut self, quote: char) {
        let triple: String = std::iter::repeat(quote).take(3).collect();
        if self.source[self.cursor..].starts_with(&triple) {
            for _ in 0..3 {
                self.bump_char();
            }
            while self.cursor < self.source.len() {
                if self.source[self.cursor..].starts_with(&triple) {
                    for _ in 0..3 {
                        self.bump_char();
                    }
                    return;
                }
                if self.bump_char() == Some('\\') {
                    self.bump_char();
                }
            }
            return;
        }

        self.bump_char();
        while let Some(ch) = self.peek_char() {
            match ch {
                '\n' => return,
                '\\' => {
                    self.bump_char();
                    self.bump_char();
                }
                c if c == quote => {
                    self.bump_char();
                    return;
                }
                _ => {
                    self.bump_char();
                }
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let start = self.cursor;
        let line = self.line;

        let kind = match self.peek_char()? {
            '\n' => {
                self.bump_char();
                TokenKind::Newline
            }
            c if c.is_whitespace() => {
                self.eat_while(|c| c.is_whitespace() && c != '\n');
                TokenKind::Space
            }
            c if is_ident_char(c) => {
                self.eat_while(is_ident_char);
                TokenKind::Ident
            }
            '(' => {
                self.bump_char();
                TokenKind::LParen
            }
            ')' => {
                self.bump_char();
                TokenKind::RParen
            }
            '#' => {
                self.eat_while(|c| c != '\n');
                TokenKind::Comment
            }
            quote @ ('"' | '\'') => {
                self.lex_string(quote);
                TokenKind::Str
            }
            _ => {
                self.bump_char();
                TokenKind::Punct
            }
        };

        Some(Token {
            kind,
            span: start..self.cursor,
            line,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Tokenize the whole of `source`.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .into_iter()
            .map(|t| (t.kind, &source[t.span]))
            .collect()
    }

    #[test]
    fn lexes_simple_declaration() {
        assert_eq!(
            kinds("cdef int foo(int a)"),
            vec![
                (TokenKind::Ident, "cdef"),
                (TokenKind::Space, " "),
                (TokenKind::Ident, "int"),
                (TokenKind::Space, " "),
                (TokenKind::Ident, "foo"),
                (TokenKind::LParen, "("),
                (TokenKind::Ident, "int"),
                (TokenKind::Space, " "),
                (TokenKind::Ident, "a"),
                (TokenKind::RParen, ")"),
            ]
        );
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        assert_eq!(
            kinds("# cdef int foo()\nx"),
            vec![
                (TokenKind::Comment, "# cdef int foo()"),
                (TokenKind::Newline, "\n"),
                (TokenKind::Ident, "x"),
            ]
        );
    }

    #[test]
    fn string_hides_comment_marker() {
        assert_eq!(
            kinds(r#""a # b" c"#),
            vec![
                (TokenKind::Str, r#""a # b""#),
                (TokenKind::Space, " "),
                (TokenKind::Ident, "c"),
            ]
        );
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        assert_eq!(
            kinds(r#"'it\'s' x"#),
            vec![
                (TokenKind::Str, r#"'it\'s'"#),
                (TokenKind::Space, " "),
                (TokenKind::Ident, "x"),
            ]
        );
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let source = "\"\"\"doc\ncdef int foo()\n\"\"\"\ny";
        let tokens = tokenize(source);
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text(source), "\"\"\"doc\ncdef int foo()\n\"\"\"");
        assert_eq!(tokens.last().map(|t| t.line), Some(4));
    }

    #[test]
    fn tracks_lines() {
        let tokens = tokenize("a\n\nb");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 3]);
    }

    #[test]
    fn punctuation_is_single_char() {
        assert_eq!(
            kinds("*:"),
            vec![(TokenKind::Punct, "*"), (TokenKind::Punct, ":")]
        );
    }
}
