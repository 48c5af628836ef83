//! Normalization by term rewriting, plus DAG compaction.
//!
//! A [`Rule`] is a [`Pattern`] over operator kinds together with a function
//! that builds the replacement from the subtrees bound by the pattern.
//! Bound subtrees are numbered left to right as the pattern is walked.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::trace;

use crate::env::{Forest, NodeId};

use super::{BinaryOp, FormulaType, Node, UnaryOp};

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches any subtree and binds it.
    Any,
    True,
    Unary(UnaryOp, Box<Pattern>),
    Binary(BinaryOp, Box<Pattern>, Box<Pattern>),
}

impl Pattern {
    pub fn matches(&self, forest: &Forest, id: NodeId, bound: &mut Vec<NodeId>) -> bool {
        match (self, forest.get(id)) {
            (Pattern::Any, _) => {
                bound.push(id);
                true
            }
            (Pattern::True, Node::True) => true,
            (Pattern::Unary(op, p), Node::Unary(node_op, child)) => op == node_op && p.matches(forest, *child, bound),
            (Pattern::Binary(op, pl, pr), Node::Binary(node_op, left, right)) => {
                op == node_op && pl.matches(forest, *left, bound) && pr.matches(forest, *right, bound)
            }
            _ => false,
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub pattern: Pattern,
    pub rebuild: fn(&mut Forest, &[NodeId]) -> NodeId,
}

fn any() -> Box<Pattern> {
    Box::new(Pattern::Any)
}

fn un(op: UnaryOp, child: Box<Pattern>) -> Pattern {
    Pattern::Unary(op, child)
}

fn bin(op: BinaryOp, left: Box<Pattern>, right: Box<Pattern>) -> Pattern {
    Pattern::Binary(op, left, right)
}

fn not_of(inner: Pattern) -> Pattern {
    un(UnaryOp::Not, Box::new(inner))
}

fn not(f: &mut Forest, a: NodeId) -> NodeId {
    f.add(Node::Unary(UnaryOp::Not, a))
}

fn unary(f: &mut Forest, op: UnaryOp, a: NodeId) -> NodeId {
    f.add(Node::Unary(op, a))
}

fn binary(f: &mut Forest, op: BinaryOp, a: NodeId, b: NodeId) -> NodeId {
    f.add(Node::Binary(op, a, b))
}

fn not_bottom(f: &mut Forest) -> NodeId {
    let b = f.add(Node::Bottom);
    not(f, b)
}

/// Negation normal form over {T, B, !, &, |, U, R, X}.
pub static LTL_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    use BinaryOp::*;
    use UnaryOp::*;
    vec![
        Rule {
            name: "double negation",
            pattern: not_of(un(Not, any())),
            rebuild: |_, m| m[0],
        },
        Rule {
            name: "implication",
            pattern: bin(Implies, any(), any()),
            rebuild: |f, m| {
                let na = not(f, m[0]);
                binary(f, Or, na, m[1])
            },
        },
        Rule {
            name: "weak until",
            pattern: bin(WeakUntil, any(), any()),
            rebuild: |f, m| {
                let either = binary(f, Or, m[0], m[1]);
                binary(f, Release, m[1], either)
            },
        },
        Rule {
            name: "future",
            pattern: un(Future, any()),
            rebuild: |f, m| {
                let t = f.add(Node::True);
                binary(f, Until, t, m[0])
            },
        },
        Rule {
            name: "global",
            pattern: un(Global, any()),
            rebuild: |f, m| {
                let b = f.add(Node::Bottom);
                binary(f, Release, b, m[0])
            },
        },
        Rule {
            name: "negated and",
            pattern: not_of(bin(And, any(), any())),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                binary(f, Or, na, nb)
            },
        },
        Rule {
            name: "negated or",
            pattern: not_of(bin(Or, any(), any())),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                binary(f, And, na, nb)
            },
        },
        Rule {
            name: "negated until",
            pattern: not_of(bin(Until, any(), any())),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                binary(f, Release, na, nb)
            },
        },
        Rule {
            name: "negated release",
            pattern: not_of(bin(Release, any(), any())),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                binary(f, Until, na, nb)
            },
        },
        Rule {
            name: "negated next",
            pattern: not_of(un(Next, any())),
            rebuild: |f, m| {
                let na = not(f, m[0]);
                unary(f, Next, na)
            },
        },
    ]
});

/// Minimal connectives for labeling: {B, !, &, AF, E[U], EX}.
pub static CTL_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    use BinaryOp::*;
    use UnaryOp::*;
    vec![
        Rule {
            name: "double negation",
            pattern: not_of(un(Not, any())),
            rebuild: |_, m| m[0],
        },
        Rule {
            name: "implication",
            pattern: bin(Implies, any(), any()),
            rebuild: |f, m| {
                let nb = not(f, m[1]);
                let both = binary(f, And, m[0], nb);
                not(f, both)
            },
        },
        Rule {
            name: "or",
            pattern: bin(Or, any(), any()),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                let both = binary(f, And, na, nb);
                not(f, both)
            },
        },
        Rule {
            name: "all until",
            pattern: bin(AllUntil, any(), any()),
            rebuild: |f, m| {
                let (na, nb) = (not(f, m[0]), not(f, m[1]));
                let neither = binary(f, And, na, nb);
                let nb2 = not(f, m[1]);
                let eu = binary(f, ExistsUntil, nb2, neither);
                let not_eu = not(f, eu);
                let af = unary(f, AF, m[1]);
                binary(f, And, not_eu, af)
            },
        },
        Rule {
            name: "true",
            pattern: Pattern::True,
            rebuild: |f, _| not_bottom(f),
        },
        Rule {
            name: "always globally",
            pattern: un(AG, any()),
            rebuild: |f, m| {
                let t = not_bottom(f);
                let na = not(f, m[0]);
                let eu = binary(f, ExistsUntil, t, na);
                not(f, eu)
            },
        },
        Rule {
            name: "exists globally",
            pattern: un(EG, any()),
            rebuild: |f, m| {
                let na = not(f, m[0]);
                let af = unary(f, AF, na);
                not(f, af)
            },
        },
        Rule {
            name: "exists future",
            pattern: un(EF, any()),
            rebuild: |f, m| {
                let t = not_bottom(f);
                binary(f, ExistsUntil, t, m[0])
            },
        },
        Rule {
            name: "all next",
            pattern: un(AX, any()),
            rebuild: |f, m| {
                let na = not(f, m[0]);
                let ex = unary(f, EX, na);
                not(f, ex)
            },
        },
    ]
});

/// Rule set for a formula type: LTL rules if the formula is LTL, CTL rules
/// if it is CTL only, none for CTL*.
pub fn rules_for(kind: FormulaType) -> &'static [Rule] {
    if !kind.contains(FormulaType::CTL) {
        &LTL_RULES
    } else if !kind.contains(FormulaType::LTL) {
        &CTL_RULES
    } else {
        &[]
    }
}

/// Rewrite to a fixed point with `rules`, then compact into a DAG. Builds
/// new nodes only; nothing reachable from `root` is modified.
pub fn normalize_with(forest: &mut Forest, root: NodeId, rules: &[Rule]) -> NodeId {
    let mut root = root;
    if !rules.is_empty() {
        loop {
            let (next, changed) = rewrite(forest, root, rules);
            root = next;
            if !changed {
                break;
            }
        }
    }
    compact(forest, root)
}

/// One bottom-up pass: children first, then rules at the (new) root until
/// none applies.
fn rewrite(forest: &mut Forest, id: NodeId, rules: &[Rule]) -> (NodeId, bool) {
    let node = forest.get(id).clone();
    let children = node.children();
    let mut changed = false;
    let mut new_children = Vec::with_capacity(children.len());
    for child in &children {
        let (new_child, child_changed) = rewrite(forest, *child, rules);
        changed |= child_changed;
        new_children.push(new_child);
    }

    let mut root = if changed { forest.add(node.with_children(&new_children)) } else { id };
    'rules: loop {
        for rule in rules {
            let mut bound = Vec::new();
            if rule.pattern.matches(forest, root, &mut bound) {
                let replaced = (rule.rebuild)(forest, &bound);
                trace!(rule = rule.name, from = %root, to = %replaced, "rewrite");
                root = replaced;
                changed = true;
                continue 'rules;
            }
        }
        return (root, changed);
    }
}

/// Redirect every subtree to the first structurally equal subtree seen, so
/// equal subformulas become one shared node.
pub fn compact(forest: &mut Forest, root: NodeId) -> NodeId {
    let mut canonical = Vec::new();
    let mut memo = HashMap::new();
    compact_node(forest, root, &mut canonical, &mut memo)
}

fn compact_node(
    forest: &mut Forest,
    id: NodeId,
    canonical: &mut Vec<NodeId>,
    memo: &mut HashMap<NodeId, NodeId>,
) -> NodeId {
    if let Some(&done) = memo.get(&id) {
        return done;
    }
    let node = forest.get(id).clone();
    let children = node.children();
    let new_children = children.iter().map(|c| compact_node(forest, *c, canonical, memo)).collect::<Vec<_>>();
    let candidate = if new_children == children { id } else { forest.add(node.with_children(&new_children)) };

    let result = match canonical.iter().copied().find(|c| forest.equal(*c, candidate)) {
        Some(existing) => existing,
        None => {
            canonical.push(candidate);
            candidate
        }
    };
    memo.insert(id, result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::formula::Formula;
    use pretty_assertions::assert_eq;

    fn normalized(src: &str) -> String {
        let mut env = Environment::new();
        let f = Formula::parse_str(&mut env, src).unwrap();
        f.normalized(&mut env).render(&env)
    }

    #[test]
    fn ltl_negation_normal_form() {
        assert_eq!(normalized("!!p"), "p");
        assert_eq!(normalized("p -> q"), "!p | q");
        assert_eq!(normalized("p W q"), "q R (p | q)");
        assert_eq!(normalized("F p"), "T U p");
        assert_eq!(normalized("G p"), "B R p");
        assert_eq!(normalized("!(p & q)"), "!p | !q");
        assert_eq!(normalized("!(p | q)"), "!p & !q");
        assert_eq!(normalized("!(p U q)"), "!p R !q");
        assert_eq!(normalized("!(p R q)"), "!p U !q");
        assert_eq!(normalized("!X p"), "X !p");
        assert_eq!(normalized("!G F p"), "!B U (!T R !p)");
        assert_eq!(normalized("!(p -> q)"), "p & !q");
    }

    #[test]
    fn ctl_minimal_connectives() {
        assert_eq!(normalized("AG p"), "!E[!B U !p]");
        assert_eq!(normalized("EF p"), "E[!B U p]");
        assert_eq!(normalized("EG p"), "!AF !p");
        assert_eq!(normalized("AX p"), "!EX !p");
        assert_eq!(normalized("AF (p | q)"), "AF !(!p & !q)");
        assert_eq!(normalized("AX (p -> q)"), "!EX (p & !q)");
        assert_eq!(normalized("A[p U q]"), "!E[!q U (!p & !q)] & AF q");
        assert_eq!(normalized("EX T"), "EX !B");
    }

    #[test]
    fn mixed_formulas_are_not_rewritten() {
        assert_eq!(normalized("AG F p"), "AG F p");
    }

    #[test]
    fn normalization_leaves_the_original_untouched() {
        let mut env = Environment::new();
        let f = Formula::parse_str(&mut env, "G (p -> F q)").unwrap();
        let before = f.render(&env);
        let n = f.normalized(&mut env);
        assert_eq!(f.render(&env), before);
        assert!(!n.equal(&f, &env));
    }

    #[test]
    fn compaction_shares_equal_subtrees() {
        let mut env = Environment::new();
        let f = Formula::parse_str(&mut env, "(p U q) & X (p U q)").unwrap();
        let (left, right) = (env.forest.child(f.root(), 0), env.forest.child(f.root(), 1));
        assert_eq!(env.forest.child(right, 0), left);
        assert_eq!(env.forest.reachable(f.root()).len(), 5);
    }

    #[test]
    fn pattern_binds_left_to_right() {
        let mut env = Environment::new();
        let f = Formula::parse_str(&mut env, "!(p U q)").unwrap();
        let pattern = not_of(bin(BinaryOp::Until, any(), any()));
        let mut bound = Vec::new();
        assert!(pattern.matches(&env.forest, f.root(), &mut bound));
        let names = bound.iter().map(|id| crate::formula::render_node(&env, *id)).collect::<Vec<_>>();
        assert_eq!(names, vec!["p", "q"]);
    }
}
