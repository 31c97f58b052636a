use clap::Parser;
use std::path::PathBuf;

/// A tree-walking interpreter for a small C-like scripting language.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(name = "rill", bin_name = "rill")]
pub struct Cli {
    /// Expression or statement string to evaluate.
    #[clap(short, long, value_name = "CODE", conflicts_with = "script")]
    pub expr: Option<String>,

    /// Path to a script file to execute. Starts the REPL when neither a
    /// script nor --expr is given.
    #[clap(value_name = "SCRIPT", conflicts_with = "expr")]
    pub script: Option<PathBuf>,
}
