use std::fmt::{self, Display};

/// Position of a token in the input: byte offset, length and line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(offset: usize, len: usize, line: u32, column: u32) -> Self {
        Span { offset, len, line, column }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Negation,
    And,
    Or,
    Implies,
    Until,
    Release,
    WeakUntil,
    Next,
    Future,
    Global,
    AllUntil,
    ExistsUntil,
    AeUntilEnd,
    AG,
    EG,
    AF,
    EF,
    AX,
    EX,
    ParOp,
    ParCl,
    PropVar,
    True,
    Bottom,
    IntVal,
    ModelOp,
    ModelCl,
    InitialState,
    Compare,
    CompareMid,
    Eof,
}

impl TokenKind {
    /// Keywords written as plain words. Everything else alphanumeric is a
    /// propositional variable.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "U" => TokenKind::Until,
            "R" => TokenKind::Release,
            "W" => TokenKind::WeakUntil,
            "X" => TokenKind::Next,
            "F" => TokenKind::Future,
            "G" => TokenKind::Global,
            "AG" => TokenKind::AG,
            "EG" => TokenKind::EG,
            "AF" => TokenKind::AF,
            "EF" => TokenKind::EF,
            "AX" => TokenKind::AX,
            "EX" => TokenKind::EX,
            "T" | "true" => TokenKind::True,
            "B" | "false" => TokenKind::Bottom,
            _ => return None,
        };
        Some(kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Negation => "'!'",
            TokenKind::And => "'&'",
            TokenKind::Or => "'|'",
            TokenKind::Implies => "'->'",
            TokenKind::Until => "'U'",
            TokenKind::Release => "'R'",
            TokenKind::WeakUntil => "'W'",
            TokenKind::Next => "'X'",
            TokenKind::Future => "'F'",
            TokenKind::Global => "'G'",
            TokenKind::AllUntil => "'A['",
            TokenKind::ExistsUntil => "'E['",
            TokenKind::AeUntilEnd => "']'",
            TokenKind::AG => "'AG'",
            TokenKind::EG => "'EG'",
            TokenKind::AF => "'AF'",
            TokenKind::EF => "'EF'",
            TokenKind::AX => "'AX'",
            TokenKind::EX => "'EX'",
            TokenKind::ParOp => "'('",
            TokenKind::ParCl => "')'",
            TokenKind::PropVar => "propositional variable",
            TokenKind::True => "'T'",
            TokenKind::Bottom => "'B'",
            TokenKind::IntVal => "integer",
            TokenKind::ModelOp => "'{'",
            TokenKind::ModelCl => "'}'",
            TokenKind::InitialState => "'>'",
            TokenKind::Compare => "'?'",
            TokenKind::CompareMid => "':'",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Token { kind, text: text.into(), span }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}
