//! Turns script text into the token stream consumed by the model and
//! formula parsers.

use std::str::Chars;

use crate::parse::ParseError;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source, chars: source.chars(), pos: 0, line: 1, column: 1 }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.is(TokenKind::Eof);
            tokens.push(token);
            if eof {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia();

        let (start, line, column) = (self.pos, self.line, self.column);
        let Some(c) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, "", Span::new(start, 0, line, column)));
        };

        let kind = match c {
            '(' => TokenKind::ParOp,
            ')' => TokenKind::ParCl,
            ']' => TokenKind::AeUntilEnd,
            '{' => TokenKind::ModelOp,
            '}' => TokenKind::ModelCl,
            '>' => TokenKind::InitialState,
            '?' => TokenKind::Compare,
            ':' => TokenKind::CompareMid,
            '!' | '~' => TokenKind::Negation,
            '&' => {
                self.eat('&');
                TokenKind::And
            }
            '|' => {
                self.eat('|');
                TokenKind::Or
            }
            '-' if self.eat('>') => TokenKind::Implies,
            'A' | 'E' if self.peek() == Some('[') => {
                self.advance();
                if c == 'A' { TokenKind::AllUntil } else { TokenKind::ExistsUntil }
            }
            c if c.is_ascii_digit() => {
                self.advance_while(|c| c.is_ascii_digit());
                TokenKind::IntVal
            }
            c if c.is_alphabetic() || c == '_' => {
                self.advance_while(|c| c.is_alphanumeric() || c == '_');
                TokenKind::keyword(&self.source[start..self.pos]).unwrap_or(TokenKind::PropVar)
            }
            other => {
                return Err(ParseError::UnknownCharacter {
                    found: other,
                    span: Span::new(start, other.len_utf8(), line, column),
                })
            }
        };

        let text = &self.source[start..self.pos];
        Ok(Token::new(kind, text, Span::new(start, self.pos - start, line, column)))
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_second() == Some('/') => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        self.advance_while(|c| c != '\n');
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.advance();
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}
