mod ast;
mod cli;
mod env;
mod error;
mod eval;
mod logging;
mod parser;
mod repl;
mod scanner;
mod token;
mod value;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use env::Environment;
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use tracing::info;

/// Scans, parses, and interprets one source string against `env`, writing
/// program output to `out`. Used by the file runner, `--expr`, and the
/// REPL alike.
pub fn run_source(
    source: &str,
    env: Rc<RefCell<Environment>>,
    out: &mut dyn Write,
) -> Result<()> {
    let tokens = scanner::scan(source)?;
    let statements = parser::parse(tokens)?;
    eval::Interpreter::new(out).interpret(&statements, env)?;
    Ok(())
}

fn run_file(path: &Path, env: Rc<RefCell<Environment>>) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("could not read script {}", path.display()))?;
    info!(path = %path.display(), "Executing script file");
    run_source(&source, env, &mut io::stdout())
}

fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    info!(?cli, "Parsed CLI arguments");

    let env = Environment::new_with_prelude();

    match (cli.script, cli.expr) {
        (Some(path), _) => run_file(&path, env),
        (None, Some(code)) => run_source(&code, env, &mut io::stdout()),
        (None, None) => repl::start_repl(env),
    }
}
