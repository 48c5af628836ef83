//! Explicit-state model checking of LTL and CTL formulas over Kripke
//! structures.

pub mod env;
pub mod error;
pub mod formula;
pub mod lexer;
pub mod model;
pub mod model_checking;
pub mod parse;
pub mod session;
pub mod token;
pub mod util;

pub use error::Error;
