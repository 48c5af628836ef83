use std::fmt::{self, Display};

use tracing::{debug, warn};

use crate::env::Environment;
use crate::formula::{Formula, Node};
use crate::model::Model;

use super::{buchi::Buchi, nested_dfs::Lasso, tableau, CheckError};

/// An infinite run shown as the states leading to a cycle and the cycle
/// itself: `1 2 {3 4}*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub prefix: Vec<String>,
    pub cycle: Vec<String>,
}

impl Trace {
    /// Label the states of an accepting lasso of `b`. The first
    /// `skip` states of the prefix are left out.
    fn from_lasso(b: &Buchi, lasso: &Lasso, skip: usize) -> Trace {
        let label = |s: &usize| b.state_label(*s).map_or_else(|| s.to_string(), str::to_string);
        Trace {
            prefix: lasso.prefix.iter().skip(skip).map(label).collect(),
            cycle: lasso.cycle.iter().map(label).collect(),
        }
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.prefix {
            write!(f, "{state} ")?;
        }
        write!(f, "{{{}}}*", self.cycle.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LTLVerificationResult {
    Satisfied,
    CounterExample(Trace),
}

impl Display for LTLVerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LTLVerificationResult::Satisfied => write!(f, "Satisfied."),
            LTLVerificationResult::CounterExample(trace) => write!(f, "Not satisfied; counterexample: {trace}"),
        }
    }
}

/// Everything computed while checking one formula against a model.
#[derive(Debug, Clone)]
pub struct LtlCheck {
    pub result: LTLVerificationResult,
    /// Variables of the formula the model never sets, not reported before
    /// in this session.
    pub unused_vars: Vec<String>,
    pub formula_automaton: Buchi,
    pub model_automaton: Buchi,
    pub product: Buchi,
}

/// One direction of a comparison: `first` accepts what `second` must not.
#[derive(Debug, Clone)]
pub struct ComparePass {
    pub first: Buchi,
    pub second: Buchi,
    pub product: Buchi,
    /// A run allowed by one formula and not by the other.
    pub allows: Option<Trace>,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    /// Runs of the first formula that violate the second.
    pub first: ComparePass,
    /// Runs of the second formula that violate the first.
    pub second: ComparePass,
}

impl Comparison {
    pub fn equivalent(&self) -> bool {
        self.first.allows.is_none() && self.second.allows.is_none()
    }
}

/// Ordinary Büchi automaton accepting the runs of `f` (or of `!f`).
pub fn construct_automaton(env: &mut Environment, f: &Formula, negate: bool) -> Result<Buchi, CheckError> {
    if !f.is_ltl() {
        return Err(CheckError::NotLtl { formula: f.render(env) });
    }
    let f = if negate { f.negate(env) } else { *f };
    let reduced = f.normalized(env);
    debug!(formula = %reduced.render(env), "constructing automaton");

    let generalized = tableau::construct(env, reduced.root());
    Ok(generalized.convert_generalized().reduce())
}

/// Check that every run of `model` satisfies `f`, returning a
/// counterexample otherwise.
pub fn verify_ltl(env: &mut Environment, model: &Model, f: &Formula) -> Result<LtlCheck, CheckError> {
    if !model.defined() {
        return Err(CheckError::UndefinedModel);
    }
    let formula_automaton = construct_automaton(env, f, true)?;
    let unused_vars = unused_vars(env, model, f);

    // the formula automaton registers its variables first
    let model_automaton = Buchi::convert_kripke(model, &env.vars);
    let product = Buchi::calc_product(&model_automaton, &formula_automaton).reduce();

    let result = match product.non_empty().and_then(Lasso::from_witness) {
        // the first state pairs the model's synthetic start state
        Some(lasso) => LTLVerificationResult::CounterExample(Trace::from_lasso(&product, &lasso, 1)),
        None => LTLVerificationResult::Satisfied,
    };
    Ok(LtlCheck { result, unused_vars, formula_automaton, model_automaton, product })
}

/// Decide whether two LTL formulas have the same runs.
pub fn compare(env: &mut Environment, f1: &Formula, f2: &Formula) -> Result<Comparison, CheckError> {
    let first = compare_pass(env, f1, f2)?;
    let second = compare_pass(env, f2, f1)?;
    Ok(Comparison { first, second })
}

fn compare_pass(env: &mut Environment, f1: &Formula, f2: &Formula) -> Result<ComparePass, CheckError> {
    let mut first = construct_automaton(env, f1, false)?;
    let second = construct_automaton(env, f2, true)?;
    first.set_prop_var_labels(&env.vars);

    let product = Buchi::calc_product(&first, &second).reduce();
    let allows = product
        .non_empty()
        .and_then(Lasso::from_witness)
        .map(|lasso| Trace::from_lasso(&product, &lasso, 0));
    Ok(ComparePass { first, second, product, allows })
}

fn unused_vars(env: &mut Environment, model: &Model, f: &Formula) -> Vec<String> {
    let names = env
        .forest
        .reachable(f.root())
        .into_iter()
        .filter_map(|id| match env.forest.get(id) {
            Node::Prop(name) => Some(name.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();

    let mut unused = Vec::new();
    for name in names {
        let var = env.vars.var(&name);
        if !model.prop_var_used(var) && env.should_warn(var) {
            warn!(var = %name, "variable not used in model");
            unused.push(name);
        }
    }
    unused
}

#[cfg(test)]
pub mod test {
    use pretty_assertions::assert_eq;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use crate::model_checking::ctl::{verify_ctl, CTLVerificationResult};
    use crate::parse::Scanner;

    use super::*;

    fn verify(model: &str, ltl: &str) -> LTLVerificationResult {
        let mut env = Environment::new();
        let model = Model::parse(&mut env, &mut Scanner::new(model).unwrap()).unwrap();
        let f = Formula::parse_str(&mut env, ltl).unwrap();
        verify_ltl(&mut env, &model, &f).unwrap().result
    }

    pub fn verify_satisfies(model: &str, ltl: &str) {
        assert_eq!(verify(model, ltl), LTLVerificationResult::Satisfied)
    }

    pub fn verify_not_satisfies(model: &str, ltl: &str) -> Trace {
        match verify(model, ltl) {
            LTLVerificationResult::CounterExample(trace) => trace,
            _ => panic!("expected a counterexample for {ltl}"),
        }
    }

    fn comparison(f1: &str, f2: &str) -> Comparison {
        let mut env = Environment::new();
        let f1 = Formula::parse_str(&mut env, f1).unwrap();
        let f2 = Formula::parse_str(&mut env, f2).unwrap();
        compare(&mut env, &f1, &f2).unwrap()
    }

    const STUCK_IN_TWO: &str = "{ >1 1 2 p  2 2 _ }";
    const ALTERNATING: &str = "{ >1 2 p  2 1 _ }";

    #[test]
    fn globally_fails_once_stuck() {
        let trace = verify_not_satisfies(STUCK_IN_TWO, "G p");
        assert_eq!(trace.prefix.first().map(String::as_str), Some("1"));
        assert!(!trace.cycle.is_empty());
        assert!(trace.cycle.iter().all(|s| s == "2"), "cycle {:?}", trace.cycle);
    }

    #[test]
    fn infinitely_often_on_alternation() {
        verify_satisfies(ALTERNATING, "G F p");
        verify_satisfies(ALTERNATING, "G (p -> X !p)");
        verify_satisfies(ALTERNATING, "p");
    }

    #[test]
    fn next_and_until() {
        verify_satisfies(ALTERNATING, "X !p");
        verify_not_satisfies(ALTERNATING, "X p");
        verify_satisfies(STUCK_IN_TWO, "p U !p | G p");
        verify_not_satisfies(STUCK_IN_TWO, "F G p");
        verify_satisfies(STUCK_IN_TWO, "F G !p | G p");
    }

    #[test]
    fn every_initial_state_is_checked() {
        let trace = verify_not_satisfies("{ 1 1 p  2 2 _ }", "p");
        assert!(!trace.cycle.is_empty());
        assert!(trace.prefix.iter().chain(&trace.cycle).all(|s| s == "2"));
    }

    #[test]
    fn constant_operands_under_temporal_operators() {
        const SELF_LOOP: &str = "{ >1 1 p }";
        verify_not_satisfies(SELF_LOOP, "F G B");
        verify_not_satisfies(SELF_LOOP, "F G false");
        verify_not_satisfies(SELF_LOOP, "F !F T");
        verify_not_satisfies(SELF_LOOP, "T U F G B");
        verify_satisfies(SELF_LOOP, "G F T");
        verify_satisfies(SELF_LOOP, "F G !B");
    }

    /// A random formula rendered as LTL and as its A-quantified CTL
    /// counterpart.
    fn random_formula(rng: &mut SmallRng, depth: usize) -> (String, String) {
        const ATOMS: [&str; 4] = ["p", "q", "T", "B"];
        if depth == 0 || rng.gen_bool(0.2) {
            let atom = ATOMS[rng.gen_range(0..ATOMS.len())].to_string();
            return (atom.clone(), atom);
        }
        let (a_ltl, a_ctl) = random_formula(rng, depth - 1);
        match rng.gen_range(0..8) {
            0 => (format!("!({a_ltl})"), format!("!({a_ctl})")),
            1 => (format!("X ({a_ltl})"), format!("AX ({a_ctl})")),
            2 => (format!("F ({a_ltl})"), format!("AF ({a_ctl})")),
            3 => (format!("G ({a_ltl})"), format!("AG ({a_ctl})")),
            op => {
                let (b_ltl, b_ctl) = random_formula(rng, depth - 1);
                match op {
                    4 => (format!("({a_ltl}) & ({b_ltl})"), format!("({a_ctl}) & ({b_ctl})")),
                    5 => (format!("({a_ltl}) | ({b_ltl})"), format!("({a_ctl}) | ({b_ctl})")),
                    6 => (format!("({a_ltl}) -> ({b_ltl})"), format!("({a_ctl}) -> ({b_ctl})")),
                    _ => (format!("({a_ltl}) U ({b_ltl})"), format!("A[({a_ctl}) U ({b_ctl})]")),
                }
            }
        }
    }

    /// Every state has exactly one successor, so the model has a single
    /// run from its start state.
    fn random_deterministic_model(rng: &mut SmallRng, max_states: usize) -> String {
        let n = rng.gen_range(1..=max_states);
        let mut src = String::from("{");
        for s in 1..=n {
            let marker = if s == 1 { ">" } else { "" };
            let succ = rng.gen_range(1..=n);
            let vars = [("p", rng.gen_bool(0.5)), ("q", rng.gen_bool(0.5))]
                .into_iter()
                .filter_map(|(v, holds)| holds.then_some(v))
                .collect::<Vec<_>>();
            let vars = if vars.is_empty() { "_".to_string() } else { vars.join(" ") };
            src.push_str(&format!(" {marker}{s} {succ} {vars} "));
        }
        src.push('}');
        src
    }

    #[test]
    fn agrees_with_ctl_on_deterministic_models() {
        let mut rng = SmallRng::seed_from_u64(0x17c);
        for _ in 0..400 {
            let model_src = random_deterministic_model(&mut rng, 4);
            let (ltl, ctl) = random_formula(&mut rng, 3);

            let mut env = Environment::new();
            let model = Model::parse(&mut env, &mut Scanner::new(&model_src).unwrap()).unwrap();
            let f = Formula::parse_str(&mut env, &ltl).unwrap();
            let g = Formula::parse_str(&mut env, &ctl).unwrap();

            let ltl_holds = verify_ltl(&mut env, &model, &f).unwrap().result == LTLVerificationResult::Satisfied;
            let ctl_holds =
                verify_ctl(&mut env, &model, &g, false).unwrap().result == CTLVerificationResult::Satisfied;
            assert_eq!(ltl_holds, ctl_holds, "{ltl} / {ctl} on {model_src}");
        }
    }

    #[test]
    fn counterexample_rendering() {
        let result = LTLVerificationResult::CounterExample(Trace {
            prefix: vec!["1".into()],
            cycle: vec!["2".into(), "3".into()],
        });
        assert_eq!(result.to_string(), "Not satisfied; counterexample: 1 {2 3}*");
        assert_eq!(LTLVerificationResult::Satisfied.to_string(), "Satisfied.");
    }

    #[test]
    fn unused_variables_are_reported_once() {
        let mut env = Environment::new();
        let model = Model::parse(&mut env, &mut Scanner::new(ALTERNATING).unwrap()).unwrap();
        let f = Formula::parse_str(&mut env, "G (q -> p)").unwrap();
        let first = verify_ltl(&mut env, &model, &f).unwrap();
        assert_eq!(first.unused_vars, vec!["q".to_string()]);
        assert_eq!(first.result, LTLVerificationResult::Satisfied);
        let again = verify_ltl(&mut env, &model, &f).unwrap();
        assert!(again.unused_vars.is_empty());
    }

    #[test]
    fn refuses_ctl_and_missing_model() {
        let mut env = Environment::new();
        let f = Formula::parse_str(&mut env, "AG p").unwrap();
        assert!(matches!(construct_automaton(&mut env, &f, false), Err(CheckError::NotLtl { .. })));
        let g = Formula::parse_str(&mut env, "G p").unwrap();
        assert_eq!(verify_ltl(&mut env, &Model::default(), &g).unwrap_err(), CheckError::UndefinedModel);
    }

    #[test]
    fn implication_is_disjunction() {
        assert!(comparison("p -> q", "!p | q").equivalent());
    }

    #[test]
    fn until_release_duality() {
        assert!(comparison("p U q", "!(!p R !q)").equivalent());
        assert!(comparison("F p", "T U p").equivalent());
        assert!(comparison("G p", "!F !p").equivalent());
    }

    #[test]
    fn eventually_is_weaker_than_globally() {
        let cmp = comparison("F p", "G p");
        assert!(cmp.first.allows.is_some());
        assert_eq!(cmp.second.allows, None);
        assert!(!cmp.equivalent());
    }
}
