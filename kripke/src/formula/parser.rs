//! Recursive descent over the formula grammar, loosest binding first:
//!
//! ```text
//! implication := binary ( '->' implication )?
//! binary      := temporal ( ('&' | '|') temporal )*
//! temporal    := prefix ( ('U' | 'R' | 'W') temporal )?
//! prefix      := ('!' | 'X' | 'F' | 'G' | 'AG' | 'EG' | 'AF' | 'EF' | 'AX' | 'EX') prefix | atom
//! atom        := 'A[' prefix 'U' temporal ']' | 'E[' prefix 'U' temporal ']'
//!              | '(' implication ')' | propvar | 'T' | 'B'
//! ```

use crate::env::{Forest, NodeId};
use crate::parse::{ParseError, Scanner};
use crate::token::TokenKind;

use super::{BinaryOp, Node, UnaryOp};

pub(super) fn parse_implication(forest: &mut Forest, scan: &mut Scanner) -> Result<NodeId, ParseError> {
    let left = parse_binary(forest, scan)?;
    if scan.peek_is(TokenKind::Implies) {
        scan.read();
        let right = parse_implication(forest, scan)?;
        return Ok(forest.add(Node::Binary(BinaryOp::Implies, left, right)));
    }
    Ok(left)
}

fn parse_binary(forest: &mut Forest, scan: &mut Scanner) -> Result<NodeId, ParseError> {
    let mut left = parse_temporal(forest, scan)?;
    loop {
        let op = match scan.peek().kind {
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            _ => return Ok(left),
        };
        scan.read();
        let right = parse_temporal(forest, scan)?;
        left = forest.add(Node::Binary(op, left, right));
    }
}

fn parse_temporal(forest: &mut Forest, scan: &mut Scanner) -> Result<NodeId, ParseError> {
    let left = parse_prefix(forest, scan)?;
    let op = match scan.peek().kind {
        TokenKind::Until => BinaryOp::Until,
        TokenKind::Release => BinaryOp::Release,
        TokenKind::WeakUntil => BinaryOp::WeakUntil,
        _ => return Ok(left),
    };
    scan.read();
    let right = parse_temporal(forest, scan)?;
    Ok(forest.add(Node::Binary(op, left, right)))
}

fn parse_prefix(forest: &mut Forest, scan: &mut Scanner) -> Result<NodeId, ParseError> {
    let op = match scan.peek().kind {
        TokenKind::Negation => UnaryOp::Not,
        TokenKind::Next => UnaryOp::Next,
        TokenKind::Future => UnaryOp::Future,
        TokenKind::Global => UnaryOp::Global,
        TokenKind::AG => UnaryOp::AG,
        TokenKind::EG => UnaryOp::EG,
        TokenKind::AF => UnaryOp::AF,
        TokenKind::EF => UnaryOp::EF,
        TokenKind::AX => UnaryOp::AX,
        TokenKind::EX => UnaryOp::EX,
        _ => return parse_atom(forest, scan),
    };
    scan.read();
    let child = parse_prefix(forest, scan)?;
    Ok(forest.add(Node::Unary(op, child)))
}

fn parse_atom(forest: &mut Forest, scan: &mut Scanner) -> Result<NodeId, ParseError> {
    let token = scan.read();
    let node = match token.kind {
        TokenKind::AllUntil | TokenKind::ExistsUntil => {
            let left = parse_prefix(forest, scan)?;
            scan.read_kind(TokenKind::Until)?;
            let right = parse_temporal(forest, scan)?;
            scan.read_kind(TokenKind::AeUntilEnd)?;
            let op = if token.is(TokenKind::AllUntil) { BinaryOp::AllUntil } else { BinaryOp::ExistsUntil };
            Node::Binary(op, left, right)
        }
        TokenKind::ParOp => {
            let inner = parse_implication(forest, scan)?;
            scan.read_kind(TokenKind::ParCl)?;
            return Ok(inner);
        }
        TokenKind::PropVar => Node::Prop(token.text),
        TokenKind::True => Node::True,
        TokenKind::Bottom => Node::Bottom,
        _ => return Err(ParseError::unexpected("formula", &token)),
    };
    Ok(forest.add(node))
}
