//! On-the-fly tableau translating a normalized LTL formula into a
//! generalized Büchi automaton (Gerth, Peled, Vardi and Wolper).

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::env::{Environment, NodeId};
use crate::formula::{render_node, BinaryOp, Node, UnaryOp};
use crate::util::traits::{Add, Singleton};

use super::buchi::Buchi;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TableauNode {
    incoming: BTreeSet<usize>,
    /// Subformulas already processed.
    old: BTreeSet<NodeId>,
    /// Subformulas still to be processed.
    new: BTreeSet<NodeId>,
    /// Subformulas that must hold in every successor.
    next: BTreeSet<NodeId>,
}

struct Tableau<'a> {
    env: &'a mut Environment,
    nodes: Vec<TableauNode>,
    /// Finished nodes; the first is the seed every initial node comes from.
    completed: Vec<usize>,
}

/// Build the generalized automaton of a formula in negation normal form
/// (over T, B, !, &, |, U, R, X).
pub fn construct(env: &mut Environment, root: NodeId) -> Buchi {
    let mut tableau = Tableau { env, nodes: Vec::new(), completed: Vec::new() };
    let seed = tableau.add_node(TableauNode::default());
    tableau.completed.push(seed);

    let first = tableau.add_node(TableauNode {
        incoming: BTreeSet::singleton(seed),
        new: BTreeSet::singleton(root),
        ..TableauNode::default()
    });
    tableau.expand(first);
    debug!(nodes = tableau.nodes.len(), states = tableau.completed.len(), "built tableau");

    tableau.into_buchi(root)
}

impl<'a> Tableau<'a> {
    fn add_node(&mut self, node: TableauNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn expand(&mut self, q: usize) {
        let Some(e) = self.nodes[q].new.pop_last() else {
            self.complete(q);
            return;
        };
        trace!(node = q, formula = %render_node(self.env, e), "expand");

        if self.nodes[q].old.contains(&e) {
            return self.expand(q);
        }

        let code = self.env.literal_code(e);
        if code != 0 {
            if code == -1 {
                return;
            }
            let old = self.nodes[q].old.iter().copied().collect::<Vec<_>>();
            if old.into_iter().any(|o| self.env.literal_code(o) == -code) {
                return;
            }
            self.nodes[q].old.insert(e);
            return self.expand(q);
        }

        let node = self.nodes[q].clone();
        let with_e = TableauNode { old: node.old.clone().add(e), ..node.clone() };
        match self.env.forest.get(e).clone() {
            Node::Binary(op @ (BinaryOp::Until | BinaryOp::Release | BinaryOp::Or), a, b) => {
                let mut first = with_e.clone();
                let mut second = with_e;
                match op {
                    BinaryOp::Release => {
                        first.new.insert(b);
                        second.new.insert(a);
                        second.new.insert(b);
                    }
                    _ => {
                        first.new.insert(a);
                        second.new.insert(b);
                    }
                }
                if op != BinaryOp::Or {
                    first.next.insert(e);
                }
                let first = self.add_node(first);
                self.expand(first);
                let second = self.add_node(second);
                self.expand(second);
            }
            Node::Binary(BinaryOp::And, a, b) => {
                let mut both = with_e;
                both.new.insert(a);
                both.new.insert(b);
                let both = self.add_node(both);
                self.expand(both);
            }
            Node::Unary(UnaryOp::Next, a) => {
                let deferred = TableauNode { next: with_e.next.clone().add(a), ..with_e };
                let deferred = self.add_node(deferred);
                self.expand(deferred);
            }
            other => panic!("operator {other:?} left in normalized LTL formula"),
        }
    }

    /// `q` has nothing left to process: merge it into an equivalent finished
    /// node, or finish it and start its successor.
    fn complete(&mut self, q: usize) {
        let existing = self.completed[1..]
            .iter()
            .copied()
            .find(|&t| self.nodes[t].old == self.nodes[q].old && self.nodes[t].next == self.nodes[q].next);
        if let Some(t) = existing {
            let incoming = self.nodes[q].incoming.clone();
            self.nodes[t].incoming.extend(incoming);
            return;
        }

        let successor = TableauNode {
            incoming: BTreeSet::singleton(q),
            new: self.nodes[q].next.clone(),
            ..TableauNode::default()
        };
        self.completed.push(q);
        let successor = self.add_node(successor);
        self.expand(successor);
    }

    /// States are the completed nodes (the seed is the only initial state),
    /// transitions follow `incoming`, and every `a U b` subformula yields
    /// the accept set of nodes where it is not pending or `b` holds.
    fn into_buchi(self, root: NodeId) -> Buchi {
        let index = self.completed.iter().enumerate().map(|(i, n)| (*n, i)).collect::<HashMap<_, _>>();

        let mut b = Buchi::new();
        for (i, n) in self.completed.iter().enumerate() {
            let s = b.add_state(i == 0);
            for f in &self.nodes[*n].old {
                let code = self.env.literal_code(*f);
                if code.abs() >= 2 {
                    b.add_prop_var(s, (code.abs() - 2) as usize, code > 0);
                }
            }
        }

        for (i, n) in self.completed.iter().enumerate() {
            for src in &self.nodes[*n].incoming {
                if let Some(&src) = index.get(src) {
                    b.add_transition(src, i);
                }
            }
        }

        for u in self.env.forest.reachable(root) {
            let Node::Binary(BinaryOp::Until, _, right) = self.env.forest.get(u) else {
                continue;
            };
            let set = self
                .completed
                .iter()
                .enumerate()
                .filter(|(_, n)| {
                    let old = &self.nodes[**n].old;
                    !old.contains(&u) || old.contains(right)
                })
                .map(|(i, _)| i)
                .collect();
            b.add_accept_set(set);
        }
        b
    }
}
