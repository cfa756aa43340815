use std::io::{self, Write};
use std::{env, process};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use lox_lang::Lox;

const HISTORY_FILE_NAME: &str = ".lox_history";

fn history_path() -> Option<std::path::PathBuf> {
    home::home_dir().map(|home| home.join(HISTORY_FILE_NAME))
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut lox = Lox::new();

    match args.len() {
        n if n > 2 => {
            eprintln!("Usage: lox [script]");
            process::exit(64);
        }
        2 => lox.run_file(&args[1]),
        _ => run_prompt(&mut lox),
    };
}

/// REPL loop built on `rustyline` for line editing and in-session history.
/// History persists across sessions to `~/.lox_history`; a missing or
/// unreadable history file is not an error, it just starts empty. The
/// literal input line `exit` ends the loop before it reaches the pipeline.
fn run_prompt(lox: &mut Lox) {
    let mut editor = DefaultEditor::new().expect("line editor to initialize");
    let history_path = history_path();

    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line == "exit" {
                    break;
                }

                let _ = editor.add_history_entry(line.as_str());
                lox.run(&line, &mut io::stderr());
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("Readline error: {error}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
}
