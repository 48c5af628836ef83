//! Session state shared by the parsers and both checkers: the variable
//! table, the formula node arena and the literal coding of formula nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use indexmap::IndexSet;
use tracing::debug;

use crate::formula::Node;

/// Append-only bijection between propositional variable names and dense
/// indices, assigned in first-use order.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    names: IndexSet<String>,
}

impl Vars {
    /// Index of `name`, registering it if it has not been seen before.
    pub fn var(&mut self, name: &str) -> usize {
        match self.names.get_index_of(name) {
            Some(index) => index,
            None => self.names.insert_full(name.to_string()).0,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(name)
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Handle of a node in the [`Forest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of formula nodes.
///
/// Nodes are immutable once added, so formulas may share subtrees
/// (`Formula::negate` relies on this). Slots are recycled through a free
/// list after a mark-and-sweep [`collect`](Forest::collect) over the
/// pinned roots.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    pinned: BTreeMap<NodeId, usize>,
}

impl Forest {
    pub fn add(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = Some(node);
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("formula node {id} is not live"),
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).children()
    }

    pub fn child(&self, id: NodeId, index: usize) -> NodeId {
        self.children(id)[index]
    }

    /// Structural equality: same operator, same variable name for
    /// propositional variables, and pairwise equal children.
    pub fn equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Node::True, Node::True) | (Node::Bottom, Node::Bottom) => true,
            (Node::Prop(x), Node::Prop(y)) => x == y,
            (Node::Unary(op1, c1), Node::Unary(op2, c2)) => op1 == op2 && self.equal(*c1, *c2),
            (Node::Binary(op1, l1, r1), Node::Binary(op2, l2, r2)) => {
                op1 == op2 && self.equal(*l1, *l2) && self.equal(*r1, *r2)
            }
            _ => false,
        }
    }

    /// Every node reachable from `root`, each once, in ascending id order.
    pub fn reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.children(id));
            }
        }
        seen.into_iter().collect()
    }

    /// Keep `root` (and everything below it) alive across [`collect`](Forest::collect).
    pub fn pin(&mut self, root: NodeId) {
        *self.pinned.entry(root).or_insert(0) += 1;
    }

    pub fn unpin(&mut self, root: NodeId) {
        if let Some(count) = self.pinned.get_mut(&root) {
            *count -= 1;
            if *count == 0 {
                self.pinned.remove(&root);
            }
        }
    }

    /// Mark everything reachable from the pinned roots and `extra_roots`,
    /// free the rest. Returns the number of slots freed.
    pub fn collect(&mut self, extra_roots: impl IntoIterator<Item = NodeId>) -> usize {
        let mut marked = vec![false; self.nodes.len()];
        let mut stack = self.pinned.keys().copied().chain(extra_roots).collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            if !marked[id.index()] {
                marked[id.index()] = true;
                stack.extend(self.children(id));
            }
        }

        let mut freed = 0;
        for (index, slot) in self.nodes.iter_mut().enumerate() {
            if slot.is_some() && !marked[index] {
                *slot = None;
                self.free.push(NodeId(index as u32));
                freed += 1;
            }
        }
        debug!(freed, live = self.len(), "collected formula nodes");
        freed
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.pinned.clear();
    }
}

/// State of one verification session. Not to be shared between
/// concurrent checks; call [`clear`](Environment::clear) between sessions.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub vars: Vars,
    pub forest: Forest,
    /// Print every parenthesis instead of only the necessary ones.
    pub filter_paren: bool,
    warned: BTreeSet<usize>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.forest.clear();
        self.warned.clear();
    }

    /// Signed code of an elementary formula: `+1` for TRUE, `-1` for BOTTOM,
    /// `2 + index` for a variable, negated under a single negation, and `0`
    /// for anything that is not a (possibly negated) literal.
    pub fn literal_code(&mut self, id: NodeId) -> i32 {
        let (negated, atom) = match self.forest.get(id) {
            Node::Unary(crate::formula::UnaryOp::Not, child) => (true, *child),
            _ => (false, id),
        };
        let code = match self.forest.get(atom) {
            Node::True => 1,
            Node::Bottom => -1,
            Node::Prop(name) => {
                let name = name.clone();
                2 + self.vars.var(&name) as i32
            }
            _ => 0,
        };
        if negated { -code } else { code }
    }

    /// Returns true the first time it is called for `var` in this session.
    pub fn should_warn(&mut self, var: usize) -> bool {
        self.warned.insert(var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{BinaryOp, UnaryOp};

    #[test]
    fn vars_assign_in_first_use_order() {
        let mut vars = Vars::default();
        assert_eq!(vars.var("q"), 0);
        assert_eq!(vars.var("p"), 1);
        assert_eq!(vars.var("q"), 0);
        assert_eq!(vars.name(1), "p");
        assert_eq!(vars.lookup("r"), None);
    }

    #[test]
    fn literal_codes() {
        let mut env = Environment::new();
        let t = env.forest.add(Node::True);
        let b = env.forest.add(Node::Bottom);
        let p = env.forest.add(Node::Prop("p".into()));
        let q = env.forest.add(Node::Prop("q".into()));
        let not_q = env.forest.add(Node::Unary(UnaryOp::Not, q));
        let not_b = env.forest.add(Node::Unary(UnaryOp::Not, b));
        let and = env.forest.add(Node::Binary(BinaryOp::And, p, q));

        assert_eq!(env.literal_code(t), 1);
        assert_eq!(env.literal_code(b), -1);
        assert_eq!(env.literal_code(not_b), 1);
        assert_eq!(env.literal_code(p), 2);
        assert_eq!(env.literal_code(not_q), -3);
        assert_eq!(env.literal_code(and), 0);
    }

    #[test]
    fn collect_frees_unreachable_nodes_and_recycles_them() {
        let mut forest = Forest::default();
        let p = forest.add(Node::Prop("p".into()));
        let kept = forest.add(Node::Unary(UnaryOp::Next, p));
        let garbage = forest.add(Node::Prop("dead".into()));
        forest.pin(kept);

        assert_eq!(forest.collect([]), 1);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.add(Node::True), garbage);

        forest.unpin(kept);
        assert_eq!(forest.collect([]), 3);
        assert!(forest.is_empty());
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let mut forest = Forest::default();
        let p1 = forest.add(Node::Prop("p".into()));
        let p2 = forest.add(Node::Prop("p".into()));
        let q = forest.add(Node::Prop("q".into()));
        let u1 = forest.add(Node::Binary(BinaryOp::Until, p1, q));
        let u2 = forest.add(Node::Binary(BinaryOp::Until, p2, q));
        let r = forest.add(Node::Binary(BinaryOp::Release, p2, q));
        assert!(forest.equal(u1, u2));
        assert!(!forest.equal(u1, r));
        assert_eq!(forest.reachable(u1), vec![p1, q, u1]);
    }
}
