//! Tokenizer for Ace source text.
//!
//! The lexer is a collaborator: the specification only constrains its
//! interface to the rest of the pipeline (a stream of `(Token, SourceLocation)`
//! pairs), not its internal UTF-8 handling. This module uses `logos` for the
//! scanning itself (matching the teacher's approach) and a precomputed line
//! index to turn byte offsets into `SourceLocation`s cheaply.

use ace_diagnostics::{LexKind, SourceLocation};
use logos::Logos;

fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some('0') => result.push('\0'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(c) = char::from_u32(code) {
                            result.push(c);
                        }
                    }
                }
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }
    result
}

/// Token kinds recognized in Ace source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("func")]
    Func,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("throw")]
    Throw,
    #[token("module")]
    Module,
    #[token("import")]
    Import,
    #[token("use")]
    Use,
    #[token("as")]
    As,
    #[token("from")]
    From,
    #[token("new")]
    New,
    #[token("type")]
    Type,
    #[token("proto")]
    Proto,
    #[token("meta")]
    Meta,
    #[token("yield")]
    Yield,
    #[token("has")]
    Has,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Operators
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,
    #[token(".")]
    Dot,
    #[token("=>")]
    FatArrow,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    IntLiteral(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    FloatLiteral(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringLiteral(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

/// A scanned token paired with the (byte) span it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

/// Maps byte offsets to (line, column) without rescanning the source on
/// every lookup.
struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    fn location(&self, file: &str, offset: usize) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at.saturating_sub(1),
        };
        let column = offset - self.line_starts[line] + 1;
        SourceLocation::new(file.to_string(), line + 1, column)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind} at {location}")]
pub struct LexError {
    pub kind: LexKind,
    pub location: SourceLocation,
}

/// Tokenizes `source`, attaching a `SourceLocation` under `file` to every
/// token. Returns the first lex error encountered, if any; callers that want
/// best-effort recovery can fall back to [`Lexer`] directly.
pub fn tokenize(file: &str, source: &str) -> Result<Vec<(Token, SourceLocation)>, LexError> {
    let index = LineIndex::new(source);
    let mut out = Vec::new();
    for item in Lexer::new(source) {
        match item {
            Ok(ts) => out.push((ts.token, index.location(file, ts.span.start))),
            Err(_) => {
                return Err(LexError {
                    kind: LexKind::UnexpectedChar(
                        source[..].chars().nth(0).unwrap_or('\0'),
                    ),
                    location: index.location(file, 0),
                })
            }
        }
    }
    Ok(out)
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, std::ops::Range<usize>>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();
        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(()) => Some(Err(span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_and_identifiers() {
        let source = "func let const try catch module import";
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Func,
                Token::Let,
                Token::Const,
                Token::Try,
                Token::Catch,
                Token::Module,
                Token::Import,
            ]
        );
    }

    #[test]
    fn literals() {
        let source = r#"42 3.5 "hi\n""#;
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();
        assert_eq!(
            tokens,
            vec![
                Token::IntLiteral(42),
                Token::FloatLiteral(3.5),
                Token::StringLiteral("hi\n".to_string()),
            ]
        );
    }

    #[test]
    fn tokenize_attaches_line_and_column() {
        let source = "let x = 1;\nlet y = 2;";
        let tokens = tokenize("main.ace", source).unwrap();
        // `y` is the 6th token on line 2.
        let (tok, loc) = &tokens[5];
        assert_eq!(*tok, Token::Ident("y".to_string()));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn skips_comments() {
        let source = "let x = 1; // comment\n/* block */ let y = 2;";
        let tokens: Vec<_> = Lexer::new(source).map(|r| r.unwrap().token).collect();
        assert!(!tokens.iter().any(|t| matches!(t, Token::LineComment | Token::BlockComment)));
    }
}
