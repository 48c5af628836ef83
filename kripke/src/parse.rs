//! Token source shared by the model and formula parsers: one token of
//! lookahead plus a typed `read_kind` that fails on a mismatch.

use miette::Diagnostic;
use thiserror::Error;

use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected token at {span}: expected {expected}, found {found} '{text}'")]
    #[diagnostic(code(kripke::parse::unexpected_token))]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        text: String,
        span: Span,
    },
    #[error("malformed integer '{text}' at {span}")]
    #[diagnostic(code(kripke::parse::malformed_integer))]
    MalformedInteger { text: String, span: Span },
    #[error("unknown character '{found}' at {span}")]
    #[diagnostic(code(kripke::parse::unknown_character))]
    UnknownCharacter { found: char, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::MalformedInteger { span, .. }
            | ParseError::UnknownCharacter { span, .. } => *span,
        }
    }

    pub fn unexpected(expected: impl ToString, found: &Token) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.kind,
            text: found.text.clone(),
            span: found.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scanner {
    tokens: Vec<Token>,
    pos: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Ok(Scanner::from_tokens(Lexer::new(source).tokenize()?))
    }

    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().map_or(false, |t| t.is(TokenKind::Eof)) {
            let span = tokens.last().map(|t| Span::new(t.span.offset + t.span.len, 0, t.span.line, t.span.column)).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }
        Scanner { tokens, pos: 0 }
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    pub fn eof(&self) -> bool {
        self.peek_is(TokenKind::Eof)
    }

    /// Consume the next token. Reading past the end keeps returning `Eof`.
    pub fn read(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !token.is(TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    pub fn read_kind(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_is(kind) {
            Ok(self.read())
        } else {
            Err(ParseError::unexpected(kind, self.peek()))
        }
    }

    /// Tokens consumed between two positions, used to echo input.
    pub fn consumed_since(&self, start: usize) -> &[Token] {
        &self.tokens[start..self.pos]
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

pub fn parse_int(token: &Token) -> Result<i64, ParseError> {
    token.text.parse().map_err(|_| ParseError::MalformedInteger { text: token.text.clone(), span: token.span })
}
