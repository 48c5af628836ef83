use std::{io, path::PathBuf};

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use kripke::{
    session::{Session, SessionOptions},
    util::cli_utils::read_source,
};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Check LTL and CTL formulas against Kripke models.
///
/// The input is a sequence of items: a model `{ [>]state successor... var... }`,
/// a formula, or a comparison `? formula : formula`. Every formula is checked
/// against the most recent model.
#[derive(Debug, Parser)]
#[command(name = "mch", version)]
struct Cli {
    /// Print the Büchi automata built for LTL checks
    #[arg(short, long)]
    buchi: bool,
    /// Echo the input
    #[arg(short, long)]
    echo: bool,
    /// Show formulas as they are marked in states (CTL only)
    #[arg(short, long)]
    mark: bool,
    /// Don't filter out unnecessary parentheses
    #[arg(short, long)]
    paren: bool,
    /// Display reduced formulas
    #[arg(short, long)]
    reduced: bool,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    /// Input files; stdin when none are given
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

/// An input error with the offending source attached.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
struct InputError {
    message: String,
    #[source_code]
    src: NamedSource,
    #[label("here")]
    span: SourceSpan,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    let options = SessionOptions {
        show_buchi: cli.buchi,
        verbose: cli.verbose,
        show_marked: cli.mark,
        print_reduced: cli.reduced,
        echo: cli.echo,
        paren: cli.paren,
        full_sequences: cli.verbose,
    };

    let inputs = if cli.files.is_empty() {
        vec![None]
    } else {
        cli.files.iter().map(Some).collect()
    };

    let mut session = Session::new(io::stdout().lock(), options);
    for path in inputs {
        let name = path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string());
        let src = read_source(path.map(PathBuf::as_path)).wrap_err_with(|| format!("could not read {name}"))?;

        if let Err(err) = session.run(&src) {
            let report = match err.span() {
                Some(span) => miette::Report::new(InputError {
                    message: err.to_string(),
                    src: NamedSource::new(&name, src.clone()),
                    span: (span.offset, span.len).into(),
                }),
                None => miette::Report::new(err),
            };
            eprintln!("{report:?}");
            return Err(eyre!("checking {name} failed"));
        }
    }
    session.finish()?;
    Ok(())
}
