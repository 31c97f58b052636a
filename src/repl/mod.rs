mod highlighter;
mod history;

use crate::env::Environment;
use highlighter::ReplHelper;
use owo_colors::OwoColorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use tracing::{info, warn};

/// Runs the interactive session. The global environment survives across
/// lines, so declarations accumulate; scan, parse, and runtime errors are
/// reported and the loop reads the next line.
#[tracing::instrument(skip(env))]
pub fn start_repl(env: Rc<RefCell<Environment>>) -> anyhow::Result<()> {
    info!("Starting REPL session with rustyline");
    let mut rl = Editor::<ReplHelper, DefaultHistory>::new()?;
    rl.set_helper(Some(ReplHelper::new()));
    let mut line_number = 1;

    let history_path_opt = history::get_history_path();
    if let Some(ref history_path) = history_path_opt {
        history::load_history_from_path(&mut rl, history_path);
    } else {
        warn!("Could not determine history file path. History will not be saved.");
    }

    loop {
        let prompt = format!("rill ({})> ", line_number);
        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                let trimmed_input = line.trim();

                if !trimmed_input.is_empty() {
                    if let Err(err) = rl.add_history_entry(line.as_str()) {
                        warn!("Failed to add line to history: {}", err);
                    }
                }

                if trimmed_input.is_empty() {
                    line_number += 1;
                    continue;
                }

                if trimmed_input == ".exit" {
                    info!("Exiting REPL session via user command.");
                    println!("Exiting.");
                    break;
                }

                let mut stdout = io::stdout();
                if let Err(e) =
                    crate::run_source(trimmed_input, Rc::clone(&env), &mut stdout)
                {
                    eprintln!("{} {}", "error:".red().bold(), e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                info!("REPL interrupted (Ctrl-C).");
                println!("Interrupted. Type .exit or Ctrl-D to exit.");
            }
            Err(ReadlineError::Eof) => {
                info!("REPL EOF detected (Ctrl-D).");
                println!("Exiting.");
                break;
            }
            Err(err) => {
                eprintln!("REPL Readline Error: {:?}", err);
                break;
            }
        }
        line_number += 1;
    }

    if let Some(ref history_path) = history_path_opt {
        history::save_history_to_path(&mut rl, history_path);
    }
    Ok(())
}
