//! Automata-theoretic LTL checking and fixed-point CTL labeling over
//! explicit Kripke models.

pub mod buchi;
pub mod ctl;
pub mod ltl_verification;
pub mod nested_dfs;
pub mod tableau;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum CheckError {
    #[error("cannot check mixed CTL/LTL formula {formula}")]
    #[diagnostic(code(kripke::check::mixed))]
    MixedFormula { formula: String },
    #[error("cannot build an automaton for non-LTL formula {formula}")]
    #[diagnostic(code(kripke::check::not_ltl))]
    NotLtl { formula: String },
    #[error("CTL checking needs a CTL formula, got {formula}")]
    #[diagnostic(code(kripke::check::not_ctl))]
    NotCtl { formula: String },
    #[error("no model has been defined")]
    #[diagnostic(code(kripke::check::undefined_model), help("define a model with {{ ... }} before checking formulas"))]
    UndefinedModel,
}
