use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::token::{Token, Type};

static HAD_ERROR: AtomicBool = AtomicBool::new(false);
static HAD_RUNTIME_ERROR: AtomicBool = AtomicBool::new(false);

/// True if a scan, parse, or resolve error has been reported since the last reset.
pub fn did_error() -> bool {
    HAD_ERROR.load(Ordering::SeqCst)
}

/// True if a runtime error has been reported since the last reset.
pub fn did_runtime_error() -> bool {
    HAD_RUNTIME_ERROR.load(Ordering::SeqCst)
}

/// Clears both error flags. Called between REPL lines so one bad line
/// doesn't poison the ones that follow.
pub fn reset_error() {
    HAD_ERROR.store(false, Ordering::SeqCst);
    HAD_RUNTIME_ERROR.store(false, Ordering::SeqCst);
}

/// Implemented by every error kind the pipeline can produce. `report` writes
/// the formatted message to an arbitrary sink (stderr in `main`, an in-memory
/// buffer in tests) and flips the appropriate sticky flag, mirroring how the
/// REPL and the test harness both need to observe "did this line fail"
/// without scraping process stderr.
pub trait Report {
    fn report(&self, out: &mut dyn Write) -> io::Result<()>;
}

fn write_line(out: &mut dyn Write, line: usize, message: &str) -> io::Result<()> {
    writeln!(out, "line {line}: {message}")
}

/// An error raised while scanning source text into tokens.
#[derive(Debug)]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

impl Report for ScanError {
    fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        HAD_ERROR.store(true, Ordering::SeqCst);
        write_line(out, self.line, &format!("Error: {}", self.message))
    }
}

/// An error raised while parsing tokens into statements/expressions.
#[derive(Debug)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl Report for ParseError {
    fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        HAD_ERROR.store(true, Ordering::SeqCst);
        let detail = if self.token.r#type == Type::EOF {
            format!("Error at end: {}", self.message)
        } else {
            format!("Error at '{}': {}", self.token.lexeme, self.message)
        };
        write_line(out, self.token.location.line, &detail)
    }
}

/// An error raised during the static resolution pass (scope/variable checks
/// that don't require running the program).
#[derive(Debug)]
pub struct ResolveError {
    pub token: Token,
    pub message: String,
}

impl Report for ResolveError {
    fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        HAD_ERROR.store(true, Ordering::SeqCst);
        let detail = format!("Error at '{}': {}", self.token.lexeme, self.message);
        write_line(out, self.token.location.line, &detail)
    }
}

/// An error raised by the tree-walking evaluator while executing a program.
#[derive(Debug)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        RuntimeError { token, message: message.into() }
    }
}

impl Report for RuntimeError {
    fn report(&self, out: &mut dyn Write) -> io::Result<()> {
        HAD_RUNTIME_ERROR.store(true, Ordering::SeqCst);
        write_line(out, self.token.location.line, &self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Location;

    #[test]
    fn scan_error_formats_as_line_colon_message() {
        reset_error();
        let mut buf = Vec::new();
        let err = ScanError { line: 4, message: "Unexpected character '@'.".to_string() };
        err.report(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "line 4: Error: Unexpected character '@'.\n");
        assert!(did_error());
        assert!(!did_runtime_error());
    }

    #[test]
    fn parse_error_at_eof_says_error_at_end() {
        reset_error();
        let mut buf = Vec::new();
        let token = Token::new(Type::EOF, String::new(), None, Location::new(2, 0), 0);
        let err = ParseError { token, message: "Expect ';' after value.".to_string() };
        err.report(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "line 2: Error at end: Expect ';' after value.\n"
        );
    }

    #[test]
    fn runtime_error_sets_runtime_flag_only() {
        reset_error();
        let mut buf = Vec::new();
        let token = Token::new(Type::Identifier, "x".to_string(), None, Location::new(1, 0), 0);
        let err = RuntimeError::new(token, "Undefined variable 'x'.");
        err.report(&mut buf).unwrap();
        assert!(did_runtime_error());
        assert!(!did_error());
    }
}
