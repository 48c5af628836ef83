use std::collections::BTreeSet;
use std::fmt::{self, Display, Write};

use indexmap::IndexSet;
use itertools::Itertools;
use tracing::debug;

use crate::env::Vars;
use crate::model::Model;
use crate::util::cli_utils::initial_state_arrow_num;

/// One automaton state: successors in insertion order (duplicates allowed)
/// and the propositional variables that must be true or false here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub transitions: Vec<usize>,
    pub pv_true: BTreeSet<usize>,
    pub pv_false: BTreeSet<usize>,
    pub label: Option<String>,
}

impl State {
    fn contradictory(&self) -> bool {
        self.pv_true.intersection(&self.pv_false).next().is_some()
    }
}

/// A (generalized) Büchi automaton over dense state ids. With exactly one
/// accept set it is an ordinary Büchi automaton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buchi {
    states: Vec<State>,
    initial: IndexSet<usize>,
    accept_sets: Vec<BTreeSet<usize>>,
    contradictions: BTreeSet<usize>,
}

impl Buchi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, initial: bool) -> usize {
        let id = self.states.len();
        self.states.push(State::default());
        if initial {
            self.initial.insert(id);
        }
        id
    }

    pub fn add_transition(&mut self, src: usize, dest: usize) {
        self.states[src].transitions.push(dest);
    }

    pub fn add_prop_var(&mut self, state: usize, var: usize, value: bool) {
        let st = &mut self.states[state];
        if value {
            st.pv_true.insert(var);
        } else {
            st.pv_false.insert(var);
        }
    }

    pub fn add_accept_set(&mut self, set: BTreeSet<usize>) {
        self.accept_sets.push(set);
    }

    pub fn add_state_label(&mut self, state: usize, label: impl Into<String>) {
        self.states[state].label = Some(label.into());
    }

    pub fn state_label(&self, state: usize) -> Option<&str> {
        self.states[state].label.as_deref()
    }

    pub fn clear(&mut self) {
        *self = Buchi::default();
    }

    /// True unless there is exactly one accept set.
    pub fn is_general(&self) -> bool {
        self.accept_sets.len() != 1
    }

    /// Membership in the first accept set.
    pub fn accepting(&self, state: usize) -> bool {
        self.accepting_in(state, 0)
    }

    pub fn accepting_in(&self, state: usize, set: usize) -> bool {
        self.accept_sets.get(set).map_or(false, |s| s.contains(&state))
    }

    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    pub fn n_accept_sets(&self) -> usize {
        self.accept_sets.len()
    }

    pub fn state(&self, id: usize) -> &State {
        &self.states[id]
    }

    pub fn successors(&self, id: usize) -> &[usize] {
        &self.states[id].transitions
    }

    pub fn initial_states(&self) -> impl Iterator<Item = usize> + '_ {
        self.initial.iter().copied()
    }

    pub fn is_initial(&self, id: usize) -> bool {
        self.initial.contains(&id)
    }

    pub fn is_contradiction(&self, id: usize) -> bool {
        self.contradictions.contains(&id)
    }

    /// Counting construction: one copy of the state space per accept set plus
    /// one. A transition into accept set `x` moves copy `x` to copy `x + 1`;
    /// the last copy is accepting and always moves back to copy 0.
    pub fn convert_generalized(&self) -> Buchi {
        let k = self.n_accept_sets();
        let copies = k + 1;
        let row = self.n_states();

        let mut d = Buchi::new();
        for _ in 0..copies * row {
            d.add_state(false);
        }
        d.initial = self.initial.clone();
        d.add_accept_set((0..row).map(|i| i + row * k).collect());

        for (i, st) in self.states.iter().enumerate() {
            for &j in &st.transitions {
                for x in 0..copies {
                    let y = if x < k && self.accept_sets[x].contains(&j) {
                        x + 1
                    } else if x == k {
                        0
                    } else {
                        x
                    };
                    d.add_transition(i + row * x, j + row * y);
                }
            }
            for x in 0..copies {
                let sd = &mut d.states[i + row * x];
                sd.pv_true = st.pv_true.clone();
                sd.pv_false = st.pv_false.clone();
            }
        }
        debug!(from = row, to = d.n_states(), accept_sets = k, "converted generalized automaton");
        d
    }

    /// Automaton whose runs are the paths of `model`: a fresh start state 0
    /// leading to every initial state, then one state per model state with
    /// the full valuation of every variable in `vars`. All states accept.
    pub fn convert_kripke(model: &Model, vars: &Vars) -> Buchi {
        let mut b = Buchi::new();
        b.add_state(true);
        for id in 0..model.states() {
            let s = b.add_state(false);
            b.add_state_label(s, model.state_name(id).to_string());
        }

        for id in 0..model.states() {
            let ds = id + 1;
            let name = model.state_name(id);
            for var in 0..vars.len() {
                b.add_prop_var(ds, var, model.prop_var(name, var));
            }
            for &next in model.successors(name) {
                if let Some(dest) = model.state_id(next) {
                    b.add_transition(ds, dest + 1);
                }
            }
        }
        for name in model.initial_states() {
            if let Some(dest) = model.state_id(name) {
                b.add_transition(0, dest + 1);
            }
        }
        b.add_accept_set((0..b.n_states()).collect());
        b
    }

    /// Product accepting the intersection of two ordinary Büchi automata.
    ///
    /// Three layers of `|Q1| * |Q2|` states track which automaton must
    /// accept next: layer 0 waits for `b1`, layer 1 for `b2`, layer 2 is
    /// accepting and returns to layer 0. State `(i, j)` of layer `x` has id
    /// `i + |Q1| * j + |Q1| * |Q2| * x`. Labels are taken from `b1`.
    pub fn calc_product(b1: &Buchi, b2: &Buchi) -> Buchi {
        assert!(!b1.is_general() && !b2.is_general(), "product of generalized automata");

        let q1 = b1.n_states();
        let q2 = b2.n_states();
        let page = q1 * q2;

        let mut p = Buchi::new();
        for id in 0..page * 3 {
            let s = p.add_state(false);
            p.states[s].label = b1.states[id % q1].label.clone();
        }

        for i in 0..q1 {
            for j in 0..q2 {
                let d0 = i + q1 * j;
                let mut pv_true = b1.states[i].pv_true.clone();
                pv_true.extend(&b2.states[j].pv_true);
                let mut pv_false = b1.states[i].pv_false.clone();
                pv_false.extend(&b2.states[j].pv_false);
                let contradictory = pv_true.intersection(&pv_false).next().is_some();

                for layer in 0..3 {
                    let d = d0 + layer * page;
                    p.states[d].pv_true = pv_true.clone();
                    p.states[d].pv_false = pv_false.clone();
                    if contradictory {
                        p.contradictions.insert(d);
                    }
                }
            }
        }

        for i1 in b1.initial_states() {
            for j1 in b2.initial_states() {
                p.initial.insert(i1 + j1 * q1);
            }
        }
        p.add_accept_set((0..page).map(|d| d + 2 * page).collect());

        for (ri, st) in b1.states.iter().enumerate() {
            for &rm in &st.transitions {
                for (qj, s2) in b2.states.iter().enumerate() {
                    for &qn in &s2.transitions {
                        if p.contradictions.contains(&(rm + qn * q1)) {
                            continue;
                        }
                        for x in 0..3 {
                            let y = match x {
                                0 if b1.accepting(rm) => 1,
                                1 if b2.accepting(qn) => 2,
                                2 => 0,
                                _ => x,
                            };
                            p.add_transition(ri + qj * q1 + x * page, rm + qn * q1 + y * page);
                        }
                    }
                }
            }
        }
        debug!(states = p.n_states(), contradictions = p.contradictions.len(), "calculated product");
        p
    }

    /// Restrict to the states reachable from the initial states without
    /// passing through a contradiction. Surviving states are renumbered in
    /// their original order; transitions into dropped states are dropped.
    pub fn reduce(&self) -> Buchi {
        let mut flagged = BTreeSet::new();
        let mut stack = self.initial.iter().copied().collect::<Vec<_>>();
        while let Some(s) = stack.pop() {
            if flagged.contains(&s) || self.contradictions.contains(&s) {
                continue;
            }
            flagged.insert(s);
            stack.extend(self.states[s].transitions.iter().copied());
        }

        let mut new_id = vec![None; self.n_states()];
        for (new, &old) in flagged.iter().enumerate() {
            new_id[old] = Some(new);
        }

        let mut d = Buchi::new();
        for &old in &flagged {
            let src = &self.states[old];
            d.states.push(State {
                transitions: src.transitions.iter().filter_map(|t| new_id[*t]).collect(),
                ..src.clone()
            });
        }
        d.initial = self.initial.iter().filter_map(|s| new_id[*s]).collect();
        d.accept_sets = self
            .accept_sets
            .iter()
            .map(|set| set.iter().filter_map(|s| new_id[*s]).collect())
            .collect();
        debug!(from = self.n_states(), to = d.n_states(), "reduced automaton");
        d
    }

    /// Label each state with the conjunction of literals it requires: `T`
    /// for none, `B` when some variable must be both true and false.
    pub fn set_prop_var_labels(&mut self, vars: &Vars) {
        for st in &mut self.states {
            let label = if st.contradictory() {
                "B".to_string()
            } else {
                let literals = (0..vars.len())
                    .filter_map(|v| {
                        if st.pv_true.contains(&v) {
                            Some(vars.name(v).to_string())
                        } else if st.pv_false.contains(&v) {
                            Some(format!("!{}", vars.name(v)))
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>();
                match literals.len() {
                    0 => "T".to_string(),
                    1 => literals[0].clone(),
                    _ => format!("({})", literals.join(" ^ ")),
                }
            };
            st.label = Some(label);
        }
    }

    /// State listing: `>  3: p,!q          1 4      label`, then the
    /// accept sets. Variables are named from `vars`, or `a`, `b`, ... when
    /// no table is given.
    pub fn render(&self, vars: Option<&Vars>) -> String {
        let mut out = String::new();
        for (i, st) in self.states.iter().enumerate() {
            let mut line = String::new();
            line.push(if self.is_initial(i) { '>' } else { ' ' });
            let _ = write!(line, "{i:>3}: ");

            let literals = st.pv_true.union(&st.pv_false).map(|&v| {
                let marker = match (st.pv_true.contains(&v), st.pv_false.contains(&v)) {
                    (true, true) => "*",
                    (false, true) => "!",
                    _ => "",
                };
                let name = match vars {
                    Some(vars) if v < vars.len() => vars.name(v).to_string(),
                    _ => var_letter(v),
                };
                format!("{marker}{name}")
            });
            line.push_str(&literals.collect::<Vec<_>>().join(","));

            pad_to(&mut line, 20);
            for t in &st.transitions {
                let _ = write!(line, "{t} ");
            }
            if let Some(label) = &st.label {
                pad_to(&mut line, 40);
                line.push_str(label);
            }
            out.push_str(&line);
            out.push('\n');
        }

        if !self.accept_sets.is_empty() {
            out.push_str(" --- accept sets ---\n");
        }
        for set in &self.accept_sets {
            let _ = writeln!(out, " ({})", set.iter().join(" "));
        }
        out
    }

    /// Graphviz rendering. States in the first accept set are drawn with a
    /// double circle; labels show the required literals.
    pub fn to_dot(&self, name: &str, vars: &Vars) -> String {
        let mut out = format!("digraph {name} {{\n");
        for (num, state) in self.initial.iter().enumerate() {
            out.push_str(&initial_state_arrow_num(state, num));
        }
        for (i, st) in self.states.iter().enumerate() {
            let shape = if self.accepting(i) { "doublecircle" } else { "circle" };
            let literals = st
                .pv_true
                .iter()
                .map(|v| vars.name(*v).to_string())
                .chain(st.pv_false.iter().map(|v| format!("!{}", vars.name(*v))))
                .join(" ");
            let _ = writeln!(out, "\"{i}\" [shape = {shape}, xlabel = \"{literals}\"]");
        }
        for (i, st) in self.states.iter().enumerate() {
            for t in st.transitions.iter().unique() {
                let _ = writeln!(out, "\"{i}\" -> \"{t}\"");
            }
        }
        out.push('}');
        out
    }
}

fn var_letter(v: usize) -> String {
    match u8::try_from(v) {
        Ok(v) if v < 26 => char::from(b'a' + v).to_string(),
        _ => "?".to_string(),
    }
}

fn pad_to(line: &mut String, column: usize) {
    while line.len() < column {
        line.push(' ');
    }
}

impl Display for Buchi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}
