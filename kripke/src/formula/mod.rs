//! Temporal formulas stored as handles into the session's node forest.

use std::fmt::Write;

use bitflags::bitflags;

use crate::env::{Environment, Forest, NodeId};
use crate::parse::{ParseError, Scanner};

mod parser;
pub mod rewrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Next,
    Future,
    Global,
    AG,
    EG,
    AF,
    EF,
    AX,
    EX,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Implies,
    And,
    Or,
    Until,
    Release,
    WeakUntil,
    /// `A[a U b]`
    AllUntil,
    /// `E[a U b]`
    ExistsUntil,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    True,
    Bottom,
    Prop(String),
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
}

bitflags! {
    /// Logics a formula *uses*: a formula with neither bit is both LTL and
    /// CTL, one with both bits is CTL* and refused by both checkers.
    #[derive(Default)]
    pub struct FormulaType: u8 {
        const LTL = 0b01;
        const CTL = 0b10;
    }
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Next => "X ",
            UnaryOp::Future => "F ",
            UnaryOp::Global => "G ",
            UnaryOp::AG => "AG ",
            UnaryOp::EG => "EG ",
            UnaryOp::AF => "AF ",
            UnaryOp::EF => "EF ",
            UnaryOp::AX => "AX ",
            UnaryOp::EX => "EX ",
        }
    }

    fn logic(self) -> FormulaType {
        match self {
            UnaryOp::Not => FormulaType::empty(),
            UnaryOp::Next | UnaryOp::Future | UnaryOp::Global => FormulaType::LTL,
            _ => FormulaType::CTL,
        }
    }
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Implies => "->",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Until | BinaryOp::AllUntil | BinaryOp::ExistsUntil => "U",
            BinaryOp::Release => "R",
            BinaryOp::WeakUntil => "W",
        }
    }

    fn logic(self) -> FormulaType {
        match self {
            BinaryOp::Implies | BinaryOp::And | BinaryOp::Or => FormulaType::empty(),
            BinaryOp::Until | BinaryOp::Release | BinaryOp::WeakUntil => FormulaType::LTL,
            BinaryOp::AllUntil | BinaryOp::ExistsUntil => FormulaType::CTL,
        }
    }
}

const TEMPORAL_PRIORITY: u8 = 30;

impl Node {
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::True | Node::Bottom | Node::Prop(_) => vec![],
            Node::Unary(_, c) => vec![*c],
            Node::Binary(_, l, r) => vec![*l, *r],
        }
    }

    /// Same operator over different children.
    pub fn with_children(&self, children: &[NodeId]) -> Node {
        match self {
            Node::Unary(op, _) => Node::Unary(*op, children[0]),
            Node::Binary(op, _, _) => Node::Binary(*op, children[0], children[1]),
            leaf => leaf.clone(),
        }
    }

    /// Printing priority. Only used to decide where parentheses go.
    fn priority(&self) -> u8 {
        match self {
            Node::True | Node::Bottom | Node::Prop(_) => 80,
            Node::Unary(..) => 50,
            Node::Binary(BinaryOp::Implies, ..) => 10,
            Node::Binary(BinaryOp::And | BinaryOp::Or, ..) => 20,
            Node::Binary(BinaryOp::Until | BinaryOp::Release | BinaryOp::WeakUntil, ..) => TEMPORAL_PRIORITY,
            Node::Binary(BinaryOp::AllUntil | BinaryOp::ExistsUntil, ..) => 80,
        }
    }

    fn logic(&self) -> FormulaType {
        match self {
            Node::True | Node::Bottom | Node::Prop(_) => FormulaType::empty(),
            Node::Unary(op, _) => op.logic(),
            Node::Binary(op, _, _) => op.logic(),
        }
    }
}

/// A formula: a root handle plus the logics its operators belong to. The
/// nodes live in the [`Environment`] that is passed to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formula {
    root: NodeId,
    kind: FormulaType,
}

impl Formula {
    pub fn new(forest: &Forest, root: NodeId) -> Formula {
        Formula { root, kind: calc_type(forest, root) }
    }

    /// Parse one formula from `scan`. The parsed tree is DAG-compacted.
    pub fn parse(env: &mut Environment, scan: &mut Scanner) -> Result<Formula, ParseError> {
        let root = parser::parse_implication(&mut env.forest, scan)?;
        let root = rewrite::compact(&mut env.forest, root);
        Ok(Formula::new(&env.forest, root))
    }

    /// Parse a formula from a string, requiring the whole input to be used.
    pub fn parse_str(env: &mut Environment, src: &str) -> Result<Formula, ParseError> {
        let mut scan = Scanner::new(src)?;
        let f = Formula::parse(env, &mut scan)?;
        scan.read_kind(crate::token::TokenKind::Eof)?;
        Ok(f)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self) -> FormulaType {
        self.kind
    }

    pub fn is_ltl(&self) -> bool {
        !self.kind.contains(FormulaType::CTL)
    }

    pub fn is_ctl(&self) -> bool {
        !self.kind.contains(FormulaType::LTL)
    }

    pub fn is_mixed(&self) -> bool {
        self.kind.is_all()
    }

    pub fn type_name(&self) -> &'static str {
        match (self.is_ltl(), self.is_ctl()) {
            (true, true) => "C/L ",
            (true, false) => "LTL ",
            (false, true) => "CTL ",
            (false, false) => "CTL*",
        }
    }

    /// Wrap the root in a negation. The new formula shares every other node
    /// with `self`, which is only sound because forest nodes are immutable.
    pub fn negate(&self, env: &mut Environment) -> Formula {
        let root = env.forest.add(Node::Unary(UnaryOp::Not, self.root));
        Formula { root, kind: self.kind }
    }

    pub fn deep_copy(&self, env: &mut Environment) -> Formula {
        Formula { root: deep_copy(&mut env.forest, self.root), kind: self.kind }
    }

    pub fn equal(&self, other: &Formula, env: &Environment) -> bool {
        env.forest.equal(self.root, other.root)
    }

    /// A normalized copy: the original formula is left untouched.
    pub fn normalized(&self, env: &mut Environment) -> Formula {
        self.normalized_with(env, rewrite::rules_for(self.kind))
    }

    /// Like [`normalized`](Formula::normalized) with an explicit rule set.
    pub fn normalized_with(&self, env: &mut Environment, rules: &[rewrite::Rule]) -> Formula {
        let copy = self.deep_copy(env);
        let root = rewrite::normalize_with(&mut env.forest, copy.root, rules);
        Formula::new(&env.forest, root)
    }

    pub fn render(&self, env: &Environment) -> String {
        render_node(env, self.root)
    }

    /// `LTL : p U q` style rendering with the type tag in front.
    pub fn render_verbose(&self, env: &Environment) -> String {
        format!("{}: {}", self.type_name(), self.render(env))
    }
}

fn calc_type(forest: &Forest, root: NodeId) -> FormulaType {
    forest.reachable(root).into_iter().fold(FormulaType::empty(), |acc, id| acc | forest.get(id).logic())
}

fn deep_copy(forest: &mut Forest, id: NodeId) -> NodeId {
    let node = forest.get(id).clone();
    let children = node.children().into_iter().map(|c| deep_copy(forest, c)).collect::<Vec<_>>();
    forest.add(node.with_children(&children))
}

/// Render any node of the forest, with only the necessary parentheses
/// unless the environment asks for all of them.
pub fn render_node(env: &Environment, id: NodeId) -> String {
    let mut out = String::new();
    write_node(env, id, 0, &mut out);
    out
}

fn write_node(env: &Environment, id: NodeId, parent_priority: u8, out: &mut String) {
    let node = env.forest.get(id);
    let priority = node.priority();
    let binary = matches!(node, Node::Binary(..));
    let paren = env.filter_paren
        || priority < parent_priority
        || (priority == parent_priority && binary)
        || (priority == TEMPORAL_PRIORITY && parent_priority == TEMPORAL_PRIORITY);

    if paren {
        out.push('(');
    }
    match node {
        Node::True => out.push('T'),
        Node::Bottom => out.push('B'),
        Node::Prop(name) => out.push_str(name),
        Node::Unary(op, child) => {
            out.push_str(op.symbol());
            write_node(env, *child, priority, out);
        }
        Node::Binary(op @ (BinaryOp::AllUntil | BinaryOp::ExistsUntil), left, right) => {
            out.push_str(if *op == BinaryOp::AllUntil { "A[" } else { "E[" });
            write_node(env, *left, TEMPORAL_PRIORITY, out);
            out.push_str(" U ");
            write_node(env, *right, TEMPORAL_PRIORITY, out);
            out.push(']');
        }
        Node::Binary(op, left, right) => {
            write_node(env, *left, priority, out);
            let _ = write!(out, " {} ", op.symbol());
            write_node(env, *right, priority, out);
        }
    }
    if paren {
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(env: &mut Environment, src: &str) -> Formula {
        Formula::parse_str(env, src).unwrap()
    }

    fn round_trip(src: &str) -> String {
        let mut env = Environment::new();
        let f = parse(&mut env, src);
        f.render(&env)
    }

    #[test]
    fn printing_keeps_only_needed_parentheses() {
        assert_eq!(round_trip("((p & q)) | r"), "(p & q) | r");
        assert_eq!(round_trip("!p | q"), "!p | q");
        assert_eq!(round_trip("p & (q | r)"), "p & (q | r)");
        assert_eq!(round_trip("!(p U q)"), "!(p U q)");
        assert_eq!(round_trip("p U (q U r)"), "p U (q U r)");
        assert_eq!(round_trip("p -> q -> r"), "p -> (q -> r)");
        assert_eq!(round_trip("G F p"), "G F p");
        assert_eq!(round_trip("A[p U (q & r)]"), "A[p U (q & r)]");
        assert_eq!(round_trip("E[!p U (q U r)]"), "E[!p U (q U r)]");
    }

    #[test]
    fn filter_paren_prints_every_parenthesis() {
        let mut env = Environment::new();
        env.filter_paren = true;
        let f = parse(&mut env, "p & q");
        assert_eq!(f.render(&env), "((p) & (q))");
    }

    #[test]
    fn ag_implication_round_trips_to_constructed_tree() {
        let mut env = Environment::new();
        let parsed = parse(&mut env, "AG(p -> AX q)");

        let p = env.forest.add(Node::Prop("p".into()));
        let q = env.forest.add(Node::Prop("q".into()));
        let ax = env.forest.add(Node::Unary(UnaryOp::AX, q));
        let imp = env.forest.add(Node::Binary(BinaryOp::Implies, p, ax));
        let root = env.forest.add(Node::Unary(UnaryOp::AG, imp));
        let built = Formula::new(&env.forest, root);

        let printed = parsed.render(&env);
        assert_eq!(printed, "AG (p -> AX q)");
        let reparsed = parse(&mut env, &printed);
        assert!(reparsed.equal(&built, &env));
        assert!(parsed.equal(&built, &env));
    }

    #[test]
    fn typing() {
        let mut env = Environment::new();
        let both = parse(&mut env, "p -> !q");
        let ltl = parse(&mut env, "G (p -> F q)");
        let ctl = parse(&mut env, "AG EF p");
        let mixed = parse(&mut env, "AG F p");

        assert!(both.is_ltl() && both.is_ctl());
        assert!(ltl.is_ltl() && !ltl.is_ctl());
        assert!(!ctl.is_ltl() && ctl.is_ctl());
        assert!(mixed.is_mixed());
        assert_eq!(
            [both, ltl, ctl, mixed].map(|f| f.type_name()),
            ["C/L ", "LTL ", "CTL ", "CTL*"]
        );
        assert_eq!(ltl.render_verbose(&env), "LTL : G (p -> F q)");
    }

    #[test]
    fn negate_shares_the_original_tree() {
        let mut env = Environment::new();
        let f = parse(&mut env, "p U q");
        let not_f = f.negate(&mut env);
        assert_eq!(env.forest.child(not_f.root(), 0), f.root());
        assert_eq!(not_f.render(&env), "!(p U q)");
    }

    #[test]
    fn deep_copy_is_equal_but_disjoint() {
        let mut env = Environment::new();
        let f = parse(&mut env, "X (p & q)");
        let copy = f.deep_copy(&mut env);
        assert!(f.equal(&copy, &env));
        let original = env.forest.reachable(f.root());
        assert!(env.forest.reachable(copy.root()).iter().all(|id| !original.contains(id)));
    }
}
