//! Explicit Kripke structures and the `{ ... }` record syntax that defines them.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Write};

use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::env::{Environment, Vars};
use crate::error::Error;
use crate::parse::{parse_int, Scanner};
use crate::token::{Span, TokenKind};

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate state definition: state {name} at {span}")]
    #[diagnostic(code(kripke::model::duplicate_state))]
    DuplicateState { name: i64, span: Span },
    #[error("transition to unknown state: state {from} to {to} at {span}")]
    #[diagnostic(code(kripke::model::unknown_transition))]
    UnknownTransition { from: i64, to: i64, span: Span },
    #[error("no state named {name} in the model")]
    #[diagnostic(code(kripke::model::unknown_state))]
    UnknownState { name: i64 },
}

impl ModelError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ModelError::DuplicateState { span, .. } | ModelError::UnknownTransition { span, .. } => Some(*span),
            ModelError::UnknownState { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KState {
    transitions: Vec<i64>,
    valuation: BTreeSet<usize>,
}

/// A Kripke structure. States are named by integers chosen in the input and
/// get dense ids in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    states: IndexMap<i64, KState>,
    initial: IndexSet<i64>,
    vars_used: BTreeSet<usize>,
    /// Variable names as known when the model was parsed, for `Display`.
    var_names: Vec<String>,
}

struct Record {
    name: i64,
    name_span: Span,
    initial: bool,
    destinations: Vec<(i64, Span)>,
    vars: Vec<usize>,
}

impl Model {
    /// Parse `{ [>]name dest+ var+ ... }`. Variables are registered in
    /// `env`; `_` stands for "no variable true here".
    pub fn parse(env: &mut Environment, scan: &mut Scanner) -> Result<Model, Error> {
        scan.read_kind(TokenKind::ModelOp)?;

        let mut records = Vec::new();
        while !scan.peek_is(TokenKind::ModelCl) {
            let initial = if scan.peek_is(TokenKind::InitialState) {
                scan.read();
                true
            } else {
                false
            };
            let token = scan.read_kind(TokenKind::IntVal)?;
            let name = parse_int(&token)?;

            let mut destinations = Vec::new();
            loop {
                let token = scan.read_kind(TokenKind::IntVal)?;
                destinations.push((parse_int(&token)?, token.span));
                if !scan.peek_is(TokenKind::IntVal) {
                    break;
                }
            }

            let mut vars = Vec::new();
            loop {
                let token = scan.read_kind(TokenKind::PropVar)?;
                if token.text != "_" {
                    vars.push(env.vars.var(&token.text));
                }
                if !scan.peek_is(TokenKind::PropVar) {
                    break;
                }
            }

            records.push(Record { name, name_span: token.span, initial, destinations, vars });
        }
        scan.read_kind(TokenKind::ModelCl)?;

        let model = Model::from_records(records, &env.vars)?;
        debug!(states = model.states(), initial = model.initial.len(), "parsed model");
        Ok(model)
    }

    fn from_records(records: Vec<Record>, vars: &Vars) -> Result<Model, ModelError> {
        let mut model = Model::default();
        for record in &records {
            if model.states.contains_key(&record.name) {
                return Err(ModelError::DuplicateState { name: record.name, span: record.name_span });
            }
            model.add_state(record.name);
        }

        for record in records {
            for (dest, span) in record.destinations {
                if !model.states.contains_key(&dest) {
                    return Err(ModelError::UnknownTransition { from: record.name, to: dest, span });
                }
                model.add_transition(record.name, dest);
            }
            for var in record.vars {
                model.add_prop_var(record.name, var);
            }
            if record.initial {
                model.set_initial(record.name);
            }
        }

        if model.initial.is_empty() {
            model.initial = model.states.keys().copied().collect();
        }
        model.var_names = (0..vars.len()).map(|i| vars.name(i).to_string()).collect();
        Ok(model)
    }

    pub fn add_state(&mut self, name: i64) -> usize {
        let entry = self.states.entry(name);
        let id = entry.index();
        entry.or_default();
        id
    }

    pub fn add_transition(&mut self, src: i64, dest: i64) {
        self.states.entry(src).or_default().transitions.push(dest);
    }

    pub fn add_prop_var(&mut self, state: i64, var: usize) {
        self.states.entry(state).or_default().valuation.insert(var);
        self.vars_used.insert(var);
    }

    pub fn set_initial(&mut self, name: i64) {
        self.initial.insert(name);
    }

    pub fn states(&self) -> usize {
        self.states.len()
    }

    pub fn defined(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn state_name(&self, id: usize) -> i64 {
        *self.states.get_index(id).map(|(name, _)| name).unwrap_or_else(|| panic!("no state with id {id}"))
    }

    pub fn state_id(&self, name: i64) -> Option<usize> {
        self.states.get_index_of(&name)
    }

    pub fn state_id_checked(&self, name: i64) -> Result<usize, ModelError> {
        self.state_id(name).ok_or(ModelError::UnknownState { name })
    }

    fn state(&self, name: i64) -> &KState {
        self.states.get(&name).unwrap_or_else(|| panic!("no state named {name}"))
    }

    pub fn degree(&self, name: i64) -> usize {
        self.state(name).transitions.len()
    }

    /// Name of the `k`-th successor of `name`.
    pub fn next(&self, name: i64, k: usize) -> i64 {
        self.state(name).transitions[k]
    }

    pub fn successors(&self, name: i64) -> &[i64] {
        &self.state(name).transitions
    }

    pub fn prop_var(&self, name: i64, var: usize) -> bool {
        self.state(name).valuation.contains(&var)
    }

    pub fn prop_var_used(&self, var: usize) -> bool {
        self.vars_used.contains(&var)
    }

    pub fn initial_states(&self) -> impl Iterator<Item = i64> + '_ {
        self.initial.iter().copied()
    }

    pub fn is_initial(&self, name: i64) -> bool {
        self.initial.contains(&name)
    }

    pub fn clear(&mut self) {
        *self = Model::default();
    }
}

const MAX_TRANSITIONS_PER_LINE: usize = 4;
const COLUMN: usize = 4;

impl Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kripke model:")?;
        for (name, state) in &self.states {
            let mut line = String::new();
            line.push(if self.is_initial(*name) { '>' } else { ' ' });
            write!(line, "{name:>COLUMN$}:")?;
            let mut on_line = 0;
            for dest in &state.transitions {
                if on_line == MAX_TRANSITIONS_PER_LINE {
                    on_line = 0;
                    write!(line, "\n{:width$}", "", width = COLUMN + 1)?;
                }
                on_line += 1;
                write!(line, "{dest:>COLUMN$}")?;
            }
            write!(line, "{:width$}", "", width = (MAX_TRANSITIONS_PER_LINE - on_line) * COLUMN + 1)?;
            for var in &state.valuation {
                match self.var_names.get(*var) {
                    Some(var_name) => write!(line, "{var_name} ")?,
                    None => write!(line, "v{var} ")?,
                }
            }
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(env: &mut Environment, src: &str) -> Result<Model, Error> {
        let mut scan = Scanner::new(src)?;
        Model::parse(env, &mut scan)
    }

    #[test]
    fn states_transitions_and_valuations() {
        let mut env = Environment::new();
        let model = parse(&mut env, "{ >1 1 2 p  2 2 _ }").unwrap();

        assert_eq!(model.states(), 2);
        assert_eq!(model.state_name(1), 2);
        assert_eq!(model.state_id(2), Some(1));
        assert_eq!(model.successors(1), &[1, 2]);
        assert_eq!(model.next(2, 0), 2);
        assert_eq!(model.degree(1), 2);
        let p = env.vars.lookup("p").unwrap();
        assert!(model.prop_var(1, p));
        assert!(!model.prop_var(2, p));
        assert!(model.prop_var_used(p));
        assert_eq!(model.initial_states().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn forward_references_and_declaration_order() {
        let mut env = Environment::new();
        let model = parse(&mut env, "{ 5 9 a 9 5 5 b }").unwrap();
        assert_eq!((model.state_name(0), model.state_name(1)), (5, 9));
        assert_eq!(model.successors(9), &[5, 5]);
    }

    #[test]
    fn without_initial_marker_every_state_is_initial() {
        let mut env = Environment::new();
        let model = parse(&mut env, "{ 3 4 p 4 3 q }").unwrap();
        assert_eq!(model.initial_states().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let mut env = Environment::new();
        let err = parse(&mut env, "{ 1 1 p 1 1 q }").unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::DuplicateState { name: 1, .. })));
    }

    #[test]
    fn transition_to_unknown_state_is_rejected() {
        let mut env = Environment::new();
        let err = parse(&mut env, "{ 1 2 p }").unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::UnknownTransition { from: 1, to: 2, .. })));
        assert_eq!(err.to_string(), "transition to unknown state: state 1 to 2 at 1:5");
    }

    #[test]
    fn record_needs_a_variable() {
        let mut env = Environment::new();
        assert!(matches!(parse(&mut env, "{ 1 1 }"), Err(Error::Parse(_))));
    }

    #[test]
    fn checked_lookup() {
        let mut env = Environment::new();
        let model = parse(&mut env, "{ 1 1 _ }").unwrap();
        assert_eq!(model.state_id_checked(1), Ok(0));
        assert_eq!(model.state_id_checked(7), Err(ModelError::UnknownState { name: 7 }));
    }

    #[test]
    fn listing() {
        let mut env = Environment::new();
        let model = parse(&mut env, "{ >1 1 2 2 2 2 p q  2 1 _ }").unwrap();
        let lines = vec![
            ">   1:   1   2   2   2".to_string(),
            format!("{:8}2{:13}p q ", "", ""),
            format!("    2:   1{:13}", ""),
        ];
        assert_eq!(model.to_string(), format!("Kripke model:\n{}\n", lines.join("\n")));
    }
}
