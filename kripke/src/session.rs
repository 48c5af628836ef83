//! Batch driver: reads model definitions, formulas and comparisons from
//! the input and writes the results of checking them.

use std::io::Write;

use itertools::{chain, Itertools};
use tracing::debug;

use crate::env::Environment;
use crate::error::Error;
use crate::formula::Formula;
use crate::model::Model;
use crate::model_checking::{ctl, ltl_verification, CheckError};
use crate::parse::Scanner;
use crate::token::TokenKind;
use crate::util::cli_utils::{trim_length, MAX_LINE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Print the formula, model and product automata of every LTL check.
    pub show_buchi: bool,
    /// Print the model after parsing it, and the subformulas holding in
    /// each state after a CTL check.
    pub verbose: bool,
    /// Show CTL subformulas as they are marked in states.
    pub show_marked: bool,
    /// Print formulas again after normalization.
    pub print_reduced: bool,
    /// Echo each item of the input before its results.
    pub echo: bool,
    /// Print every parenthesis.
    pub paren: bool,
    /// Never shorten counterexamples.
    pub full_sequences: bool,
}

/// One checking session: the current model and the environment its
/// formulas live in, writing results to `out`.
pub struct Session<W: Write> {
    env: Environment,
    model: Model,
    options: SessionOptions,
    out: W,
    /// Whether a formula was given for the current model; if not, the model
    /// is printed when the session finishes.
    formulas_defined: bool,
}

impl<W: Write> Session<W> {
    pub fn new(out: W, options: SessionOptions) -> Self {
        let mut env = Environment::new();
        env.filter_paren = options.paren;
        Session { env, model: Model::default(), options, out, formulas_defined: false }
    }

    /// Process every item of `src`. Parse and model errors end the run;
    /// the model and environment survive for the next call.
    pub fn run(&mut self, src: &str) -> Result<(), Error> {
        let mut scan = Scanner::new(src)?;
        while !scan.eof() {
            let start = scan.position();
            match scan.peek().kind {
                TokenKind::ModelOp => self.define_model(&mut scan)?,
                TokenKind::Compare => self.compare(&mut scan, start)?,
                _ => self.check(&mut scan, start)?,
            }
            self.env.forest.collect([]);
        }
        Ok(())
    }

    /// Print the model if no formula was checked against it, and hand back
    /// the output.
    pub fn finish(mut self) -> Result<W, Error> {
        if !self.formulas_defined && self.model.defined() {
            writeln!(self.out, "{}", self.model)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn echo(&mut self, scan: &Scanner, start: usize) -> Result<(), Error> {
        if self.options.echo {
            let text = scan.consumed_since(start).iter().map(|t| t.text.as_str()).join(" ");
            writeln!(self.out, "{text}")?;
        }
        Ok(())
    }

    fn define_model(&mut self, scan: &mut Scanner) -> Result<(), Error> {
        let start = scan.position();
        self.model.clear();
        self.env.clear();
        self.formulas_defined = false;

        self.model = Model::parse(&mut self.env, scan)?;
        self.echo(scan, start)?;
        writeln!(self.out, "Parsed model, {} states\n", self.model.states())?;
        if self.options.verbose {
            writeln!(self.out, "{}", self.model)?;
            self.formulas_defined = true;
        }
        Ok(())
    }

    fn compare(&mut self, scan: &mut Scanner, start: usize) -> Result<(), Error> {
        self.formulas_defined = self.model.defined();
        scan.read_kind(TokenKind::Compare)?;
        let f1 = Formula::parse(&mut self.env, scan)?;
        scan.read_kind(TokenKind::CompareMid)?;
        let f2 = Formula::parse(&mut self.env, scan)?;
        self.echo(scan, start)?;

        writeln!(self.out, "Comparing: {}", f1.render_verbose(&self.env))?;
        if self.options.print_reduced {
            let reduced = f1.normalized(&mut self.env);
            writeln!(self.out, "{:11}{}", "", reduced.render_verbose(&self.env))?;
        }
        writeln!(self.out, "     with: {}", f2.render_verbose(&self.env))?;
        if self.options.print_reduced {
            let reduced = f2.normalized(&mut self.env);
            writeln!(self.out, "{:11}{}", "", reduced.render_verbose(&self.env))?;
        }
        writeln!(self.out)?;

        let comparison = match ltl_verification::compare(&mut self.env, &f1, &f2) {
            Ok(comparison) => comparison,
            Err(err) => {
                writeln!(self.out, "({err})\n")?;
                return Ok(());
            }
        };

        let passes = [(" first", &comparison.first), ("second", &comparison.second)];
        for (name, pass) in passes {
            if self.options.show_buchi {
                writeln!(self.out, "First automaton:\n{}", pass.first.render(Some(&self.env.vars)))?;
                writeln!(self.out, "Second automaton:\n{}", pass.second.render(Some(&self.env.vars)))?;
            }
            if self.options.show_buchi || self.options.verbose {
                writeln!(self.out, "Product automaton:\n{}", pass.product.render(Some(&self.env.vars)))?;
            }
            if let Some(trace) = &pass.allows {
                if name == " first" || comparison.first.allows.is_none() {
                    writeln!(self.out, "Not equivalent.")?;
                }
                let line = self.shorten(format!("{name} allows: {trace}"));
                writeln!(self.out, "\n{line}")?;
            }
        }
        if comparison.equivalent() {
            writeln!(self.out, "Equivalent.")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn check(&mut self, scan: &mut Scanner, start: usize) -> Result<(), Error> {
        self.formulas_defined = self.model.defined();
        let f = Formula::parse(&mut self.env, scan)?;
        self.echo(scan, start)?;

        writeln!(self.out, "{}", f.render_verbose(&self.env))?;
        if self.options.print_reduced {
            let reduced = f.normalized(&mut self.env);
            writeln!(self.out, "{}", reduced.render_verbose(&self.env))?;
        }
        if !self.model.defined() {
            return Ok(());
        }

        if f.is_ctl() && !f.is_ltl() {
            self.check_ctl(&f)
        } else if f.is_ltl() {
            self.check_ltl(&f)
        } else {
            let err = CheckError::MixedFormula { formula: f.render(&self.env) };
            debug!(%err, "skipping formula");
            writeln!(self.out, "(cannot check mixed CTL/LTL formula...)\n")?;
            Ok(())
        }
    }

    fn check_ltl(&mut self, f: &Formula) -> Result<(), Error> {
        let checked = ltl_verification::verify_ltl(&mut self.env, &self.model, f)?;
        self.warn_unused(&checked.unused_vars)?;
        if self.options.show_buchi {
            let vars = Some(&self.env.vars);
            writeln!(self.out, "Formula automaton:\n{}", checked.formula_automaton.render(vars))?;
            writeln!(self.out, "Model automaton:\n{}", checked.model_automaton.render(vars))?;
            writeln!(self.out, "Product automaton:\n{}", checked.product.render(vars))?;
        }
        let line = self.shorten(checked.result.to_string());
        writeln!(self.out, "{line}\n")?;
        Ok(())
    }

    fn check_ctl(&mut self, f: &Formula) -> Result<(), Error> {
        let checked = ctl::verify_ctl(&mut self.env, &self.model, f, self.options.show_marked)?;
        self.warn_unused(&checked.unused_vars)?;
        for line in &checked.progress {
            writeln!(self.out, "{line}")?;
        }

        if self.options.verbose {
            let mut table = comfy_table::Table::new();
            table
                .load_preset(comfy_table::presets::ASCII_MARKDOWN)
                .set_header(chain!(["State".to_string()], checked.subformulas.iter().cloned()));
            for id in 0..self.model.states() {
                table.add_row(chain!(
                    [self.model.state_name(id).to_string()],
                    checked.marked(id).map(|holds| (if holds { "x" } else { "" }).to_string()),
                ));
            }
            writeln!(self.out, "{table}\n")?;
        }

        writeln!(self.out, "{}\n", checked.result)?;
        Ok(())
    }

    fn warn_unused(&mut self, vars: &[String]) -> Result<(), Error> {
        for var in vars {
            writeln!(self.out, "Warning: Variable '{var}' not used in model")?;
        }
        Ok(())
    }

    fn shorten(&self, line: String) -> String {
        if self.options.full_sequences || self.options.verbose {
            line
        } else {
            trim_length(&line, MAX_LINE)
        }
    }
}
