use std::fs;

use color_eyre::eyre::{bail, WrapErr};
use kripke::{
    env::Environment,
    formula::Formula,
    model_checking::tableau,
    util::cli_utils::ask_for_with_parser,
};

const OUTPUT_DIR: &str = "graphviz_output";
const GBA_PATH: &str = "graphviz_output/gba.dot";
const NBA_PATH: &str = "graphviz_output/nba.dot";
const REDUCED_NBA_PATH: &str = "graphviz_output/nba_reduced.dot";

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut env = Environment::new();
    let formula = ask_for_with_parser(
        "Please enter the desired LTL formula: ",
        "Please enter a valid formula",
        |src| Formula::parse_str(&mut env, src),
    )?;
    if !formula.is_ltl() {
        bail!("{} is not an LTL formula", formula.render(&env));
    }

    let reduced = formula.normalized(&mut env);
    println!("Reduced formula: {}", reduced.render_verbose(&env));
    fs::create_dir_all(OUTPUT_DIR).wrap_err("could not create output directory")?;

    // GBA
    let gba = tableau::construct(&mut env, reduced.root());
    println!("\nGBA ({} accept sets):\n{}", gba.n_accept_sets(), gba.render(Some(&env.vars)));
    fs::write(GBA_PATH, gba.to_dot("gba", &env.vars))?;
    println!("Wrote GBA to {GBA_PATH}");

    // NBA
    let nba = gba.convert_generalized();
    fs::write(NBA_PATH, nba.to_dot("nba", &env.vars))?;
    println!("Wrote NBA to {NBA_PATH}");

    // Reduced NBA
    let reduced_nba = nba.reduce();
    println!("\nReduced NBA:\n{}", reduced_nba.render(Some(&env.vars)));
    fs::write(REDUCED_NBA_PATH, reduced_nba.to_dot("nba_reduced", &env.vars))?;
    println!("Wrote reduced NBA to {REDUCED_NBA_PATH}");

    Ok(())
}
