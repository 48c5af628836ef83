//! CTL model checking by labeling states with the subformulas they satisfy,
//! innermost subformulas first.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display};

use itertools::Itertools;
use tracing::{debug, warn};

use crate::env::{Environment, NodeId};
use crate::formula::{render_node, rewrite::CTL_RULES, BinaryOp, Formula, Node, UnaryOp};
use crate::model::Model;

use super::CheckError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CTLVerificationResult {
    Satisfied,
    /// Names of the initial states that violate the formula.
    Violated(Vec<i64>),
}

impl Display for CTLVerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CTLVerificationResult::Satisfied => write!(f, "Satisfied."),
            CTLVerificationResult::Violated(states) => {
                write!(f, "Not satisfied; start states: {}", states.iter().join(" "))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CtlCheck {
    pub result: CTLVerificationResult,
    /// Ids of the states satisfying the whole formula.
    pub satisfying: BTreeSet<usize>,
    pub unused_vars: Vec<String>,
    /// `  +name: subformula` for every marking, in order, when requested.
    pub progress: Vec<String>,
    /// Distinct subformulas of the normalized formula, innermost first.
    pub subformulas: Vec<String>,
    marks: Vec<BTreeSet<usize>>,
}

impl CtlCheck {
    /// For every entry of `subformulas`, whether it holds in the state with
    /// dense id `state`.
    pub fn marked(&self, state: usize) -> impl Iterator<Item = bool> + '_ {
        self.marks.iter().map(move |marked| marked.contains(&state))
    }
}

struct Labeling<'a> {
    env: &'a mut Environment,
    model: &'a Model,
    order: Vec<NodeId>,
    /// Position in `order` of every node, structurally equal nodes sharing one.
    alias: HashMap<NodeId, usize>,
    marks: Vec<BTreeSet<usize>>,
    show_progress: bool,
    progress: Vec<String>,
    unused_vars: Vec<String>,
}

pub fn verify_ctl(env: &mut Environment, model: &Model, f: &Formula, show_progress: bool) -> Result<CtlCheck, CheckError> {
    if !f.is_ctl() {
        return Err(CheckError::NotCtl { formula: f.render(env) });
    }
    if !model.defined() {
        return Err(CheckError::UndefinedModel);
    }

    let reduced = f.normalized_with(env, &CTL_RULES);
    let mut labeling = Labeling {
        env,
        model,
        order: Vec::new(),
        alias: HashMap::new(),
        marks: Vec::new(),
        show_progress,
        progress: Vec::new(),
        unused_vars: Vec::new(),
    };
    labeling.extract(reduced.root());
    debug!(subformulas = labeling.order.len(), states = model.states(), "labeling model");
    for index in 0..labeling.order.len() {
        labeling.process(index);
    }

    let root = labeling.alias[&reduced.root()];
    let satisfying = labeling.marks[root].clone();
    let violating = model
        .initial_states()
        .filter(|name| model.state_id(*name).map_or(true, |id| !satisfying.contains(&id)))
        .collect::<Vec<_>>();
    let result = if violating.is_empty() {
        CTLVerificationResult::Satisfied
    } else {
        CTLVerificationResult::Violated(violating)
    };

    let subformulas = labeling.order.iter().map(|id| render_node(labeling.env, *id)).collect();
    Ok(CtlCheck {
        result,
        satisfying,
        unused_vars: labeling.unused_vars,
        progress: labeling.progress,
        subformulas,
        marks: labeling.marks,
    })
}

impl<'a> Labeling<'a> {
    fn extract(&mut self, id: NodeId) {
        if self.alias.contains_key(&id) {
            return;
        }
        for child in self.env.forest.children(id) {
            self.extract(child);
        }
        let existing = self.order.iter().position(|other| self.env.forest.equal(id, *other));
        let index = existing.unwrap_or_else(|| {
            self.order.push(id);
            self.marks.push(BTreeSet::new());
            self.order.len() - 1
        });
        self.alias.insert(id, index);
    }

    fn child(&self, id: NodeId, k: usize) -> usize {
        self.alias[&self.env.forest.child(id, k)]
    }

    fn holds(&self, state: usize, index: usize) -> bool {
        self.marks[index].contains(&state)
    }

    fn mark(&mut self, state: usize, index: usize) {
        self.marks[index].insert(state);
        if self.show_progress {
            let line = format!("  +{:>2}: {}", self.model.state_name(state), render_node(self.env, self.order[index]));
            self.progress.push(line);
        }
    }

    fn successor_ids(&self, state: usize) -> Vec<usize> {
        let name = self.model.state_name(state);
        self.model.successors(name).iter().filter_map(|s| self.model.state_id(*s)).collect()
    }

    fn process(&mut self, index: usize) {
        let id = self.order[index];
        let states = self.model.states();
        match self.env.forest.get(id).clone() {
            Node::Prop(name) => {
                let var = self.env.vars.var(&name);
                if !self.model.prop_var_used(var) && self.env.should_warn(var) {
                    warn!(var = %name, "variable not used in model");
                    self.unused_vars.push(name);
                }
                for s in 0..states {
                    if self.model.prop_var(self.model.state_name(s), var) {
                        self.mark(s, index);
                    }
                }
            }
            Node::Bottom => {}
            Node::True => {
                for s in 0..states {
                    self.mark(s, index);
                }
            }
            Node::Unary(UnaryOp::Not, _) => {
                let c = self.child(id, 0);
                for s in 0..states {
                    if !self.holds(s, c) {
                        self.mark(s, index);
                    }
                }
            }
            Node::Binary(BinaryOp::And, _, _) => {
                let (a, b) = (self.child(id, 0), self.child(id, 1));
                for s in 0..states {
                    if self.holds(s, a) && self.holds(s, b) {
                        self.mark(s, index);
                    }
                }
            }
            Node::Unary(UnaryOp::EX, _) => {
                let c = self.child(id, 0);
                for s in 0..states {
                    if self.successor_ids(s).into_iter().any(|t| self.holds(t, c)) {
                        self.mark(s, index);
                    }
                }
            }
            Node::Unary(UnaryOp::AF, _) => {
                let c = self.child(id, 0);
                let mut changed = true;
                while changed {
                    changed = false;
                    for s in 0..states {
                        if self.holds(s, index) {
                            continue;
                        }
                        // a state without successors satisfies AF vacuously
                        if self.holds(s, c) || self.successor_ids(s).into_iter().all(|t| self.holds(t, index)) {
                            changed = true;
                            self.mark(s, index);
                        }
                    }
                }
            }
            Node::Binary(BinaryOp::ExistsUntil, _, _) => {
                let (a, b) = (self.child(id, 0), self.child(id, 1));
                let mut changed = true;
                while changed {
                    changed = false;
                    for s in 0..states {
                        if self.holds(s, index) {
                            continue;
                        }
                        if self.holds(s, b)
                            || (self.holds(s, a) && self.successor_ids(s).into_iter().any(|t| self.holds(t, index)))
                        {
                            changed = true;
                            self.mark(s, index);
                        }
                    }
                }
            }
            other => panic!("operator {other:?} left in normalized CTL formula"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::parse::Scanner;

    use super::*;

    fn check_with(model: &str, ctl: &str, show_progress: bool) -> CtlCheck {
        let mut env = Environment::new();
        let model = Model::parse(&mut env, &mut Scanner::new(model).unwrap()).unwrap();
        let f = Formula::parse_str(&mut env, ctl).unwrap();
        verify_ctl(&mut env, &model, &f, show_progress).unwrap()
    }

    fn check(model: &str, ctl: &str) -> CTLVerificationResult {
        check_with(model, ctl, false).result
    }

    const STUCK_IN_TWO: &str = "{ >1 1 2 p  2 2 _ }";

    #[test]
    fn always_globally_reports_start_state() {
        let result = check(STUCK_IN_TWO, "AG p");
        assert_eq!(result, CTLVerificationResult::Violated(vec![1]));
        assert_eq!(result.to_string(), "Not satisfied; start states: 1");
    }

    #[test]
    fn path_quantifiers() {
        assert_eq!(check(STUCK_IN_TWO, "EG p"), CTLVerificationResult::Satisfied);
        assert_eq!(check(STUCK_IN_TWO, "AF !p"), CTLVerificationResult::Violated(vec![1]));
        assert_eq!(check(STUCK_IN_TWO, "EF !p"), CTLVerificationResult::Satisfied);
        assert_eq!(check(STUCK_IN_TWO, "AX (p | !p)"), CTLVerificationResult::Satisfied);
        assert_eq!(check(STUCK_IN_TWO, "EX !p & EX p"), CTLVerificationResult::Satisfied);
        assert_eq!(check(STUCK_IN_TWO, "A[p U !p]"), CTLVerificationResult::Violated(vec![1]));
        assert_eq!(check(STUCK_IN_TWO, "E[p U !p]"), CTLVerificationResult::Satisfied);
        assert_eq!(check(STUCK_IN_TWO, "AG (!p -> AG !p)"), CTLVerificationResult::Satisfied);
    }

    #[test]
    fn satisfying_states() {
        let checked = check_with("{ 1 2 p  2 3 _  3 3 q }", "AF q", false);
        assert_eq!(checked.satisfying, BTreeSet::from([0, 1, 2]));
        let checked = check_with("{ 1 2 p  2 3 _  3 3 q }", "EX p", false);
        assert_eq!(checked.satisfying, BTreeSet::new());
        assert_eq!(checked.result, CTLVerificationResult::Violated(vec![1, 2, 3]));
    }

    #[test]
    fn progress_lines() {
        let checked = check_with(STUCK_IN_TWO, "EX p", true);
        assert_eq!(checked.progress, vec!["  + 1: p".to_string(), "  + 1: EX p".to_string()]);
    }

    #[test]
    fn per_state_subformulas() {
        let checked = check_with(STUCK_IN_TWO, "p & EX p", false);
        assert_eq!(checked.subformulas, vec!["p".to_string(), "EX p".to_string(), "p & EX p".to_string()]);
        assert_eq!(checked.marked(0).collect::<Vec<_>>(), vec![true, true, true]);
        assert_eq!(checked.marked(1).collect::<Vec<_>>(), vec![false, false, false]);
    }

    #[test]
    fn unused_variable_is_false_everywhere() {
        let checked = check_with(STUCK_IN_TWO, "AG !q", false);
        assert_eq!(checked.unused_vars, vec!["q".to_string()]);
        assert_eq!(checked.result, CTLVerificationResult::Satisfied);
    }

    #[test]
    fn refuses_ltl() {
        let mut env = Environment::new();
        let model = Model::parse(&mut env, &mut Scanner::new(STUCK_IN_TWO).unwrap()).unwrap();
        let f = Formula::parse_str(&mut env, "G p").unwrap();
        assert!(matches!(verify_ctl(&mut env, &model, &f, false), Err(CheckError::NotCtl { .. })));
    }
}
