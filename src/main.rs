// ABOUTME: CLI entry point: script driver or interactive REPL

use clap::Parser;
use mlisp::completer::ReplHelper;
use mlisp::diagnostics::Diagnostic;
use mlisp::error::LispError;
use mlisp::interpreter::Interpreter;
use mlisp::reader::Reader;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config, Editor};
use std::path::Path;
use std::process::ExitCode;

const HISTORY_FILE: &str = "./.mlisp-repl-history";
const PROMPT: &str = "mlisp> ";

/// Lisp interpreter with modules, macros, and a REPL
#[derive(Parser, Debug)]
#[command(name = "mlisp")]
#[command(version)]
#[command(about = "A small Lisp with modules, macros, and a REPL")]
struct CliArgs {
    /// Script file to execute (starts the REPL when omitted)
    #[arg(value_name = "FILE")]
    script: Option<std::path::PathBuf>,

    /// Skip loading the bundled prelude
    #[arg(long = "no-prelude")]
    no_prelude: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let interp = if args.no_prelude {
        Interpreter::bare()
    } else {
        match Interpreter::new() {
            Ok(interp) => interp,
            Err(e) => {
                eprintln!("Error loading prelude: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    match args.script {
        Some(path) => run_script(&path, &interp),
        None => run_repl(&interp),
    }
}

/// File mode: evaluate every top-level form in order. A failing form is
/// reported and skipped; any failure makes the exit status non-zero.
fn run_script(path: &Path, interp: &Interpreter) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut reader = Reader::new(source, path.display().to_string());
    let mut failed = false;
    loop {
        match reader.read() {
            Err(LispError::EndOfStream) => break,
            Err(e) => {
                // No way to resynchronize after a read failure.
                report(&reader, e);
                failed = true;
                break;
            }
            Ok(form) => {
                if let Err(e) = interp.eval_form(&form) {
                    report(&reader, e);
                    failed = true;
                }
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_repl(interp: &Interpreter) -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<ReplHelper, FileHistory> = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize the REPL: {}", e);
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(ReplHelper::new(interp.env())));
    let _ = rl.load_history(HISTORY_FILE);

    println!("mlisp {}", env!("CARGO_PKG_VERSION"));
    println!("Terminate input with ;; and exit with Ctrl-D.");

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let mut reader = Reader::new(line, "repl");
                loop {
                    match reader.read() {
                        Err(LispError::EndOfStream) => break,
                        Err(e) => {
                            report(&reader, e);
                            break;
                        }
                        Ok(form) => match interp.eval_form(&form) {
                            Ok(value) => println!("=> {}", value),
                            // The environment from before the failing
                            // form is untouched; just keep going.
                            Err(e) => report(&reader, e),
                        },
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}

fn report(reader: &Reader, error: LispError) {
    let position = reader.last_position();
    let line = reader.source_line(position.line);
    eprint!(
        "{}",
        Diagnostic::new(error, reader.file_name(), position, line)
    );
}
