#![allow(clippy::needless_return)]

//! Lox is a programming language written in Rust. It is a dynamically typed language with
//! lexical scoping and first-class functions. Lox is a tree-walk interpreter with a hand-written
//! recursive descent parser. Lox is a hobby project and is not intended for production use.
//!
//! Lox is a dynamically typed language. This means that the type of a variable is determined at
//! runtime. This is in contrast to statically typed languages, where the type of a variable is
//! determined at compile time. Dynamically typed languages are often easier to use, but are
//! generally slower than statically typed languages.
//!
//! Lox is a tree-walk interpreter. This means that the interpreter walks the abstract syntax tree
//! (AST) and evaluates each node. This is in contrast to a compiler, which would convert the AST
//! into bytecode or machine code. Tree-walk interpreters are generally easier to implement than
//! compilers, but are generally slower than compilers.
//!
//! Lox is a hobby project and is not intended for production use. The goal of this project is to
//! learn more about programming languages and interpreters. This project is inspired by the
//! [Crafting Interpreters](https://craftinginterpreters.com/) book by Bob Nystrom.
//!
//! ## Scanning
//! The first step in the interpreter is scanning. Scanning is the process of converting a string of
//! characters into a list of tokens. A token is a single unit of a programming language. For
//! example, the string `1 + 2` would be converted into the following tokens:
//! ```text
//! [Number(1), Plus, Number(2)]
//! ```
//! The scanner is implemented in the [`scanner`](scanner) module as an iterator over the characters
//! in the source code. It is a simple state machine that returns the next token in the source code
//! when called.
//!
//! The scanner reports syntax errors in the source code as a [`ScanError`](error::ScanError).
//! These errors are trivial problems like an unterminated string literal or an unexpected character.
//! Scan errors are reported as soon as they are encountered. This means that the scanner will
//! continue scanning the source code even if it has already encountered a syntax error. This is
//! useful because it allows the user to fix multiple syntax errors at once.
//!
//! ## Parsing
//! The second step in the interpreter is parsing. Parsing is the process of converting a list of
//! tokens into an abstract syntax tree (AST). The parser is implemented in the [`parser`](parser)
//! module as a recursive descent parser. The parser transforms the list of tokens into expressions
//! and statements. [`Expressions`](expr::Expr) are pieces of code that produce a value, specifically an
//! [`Object`](object::Object). Objects are an umbrella term for all types of values in Lox
//! including literals, functions, classes and instances. [`Statements`](stmt::Stmt) are pieces of code
//! that do not produce a value but instead perform some action. These actions modify the state of the
//! program and thus, are called side-effects. For example, a variable declaration or an if clause
//! would be classified as statements.
//!
//! For example, the string `print 1 + 2;` would be converted into the following AST:
//! ```text
//! PrintStatement {
//!     BinaryExpression {
//!         left: Number(1),
//!         operator: Plus,
//!         right: Number(2),
//!     }
//! }
//! ```
//! The parser reports syntax errors in the source code as a [`ParseError`](error::ParseError).
//! Unlike the scanner, the parser catches errors that span multiple tokens. For example, the
//! following expression is invalid because it is missing the right-hand operand:
//! ```text
//! 1 !=
//! ```
//! However, much like the scanner, the parser will continue parsing the source code even if it
//! has already encountered a syntax error using a technique called synchronization. This is useful
//! because it allows the user to fix multiple syntax errors at once.
//!
//! ## Resolving
//! The third step in the interpreter is resolving. Resolving is the process of statically analyzing
//! the AST to determine the scope of each variable. While this requires a pre-pass of the AST, it
//! is necessary to construct robust lexical scoping. The resolver is implemented in the
//! [`resolver`](resolver) module as a tree-walk visitor. The resolver is run after the parser
//! because it requires the AST to be fully constructed. The resolver reports errors as a
//! [`ResolveError`](error::ResolveError). These errors are syntactically valid but semantically invalid,
//! and therefore cannot be caught by the scanner or the parser. For example, the following is
//! valid Lox syntax but semantically invalid because the variable `a` is declared twice in the
//! same scope:
//! ```text
//! {
//!    var a = 1;
//!    var a = 2;
//! }
//! ```
//!
//! ## Interpreting
//! The final step in the interpreter is _interpreting_. Interpreting is the process of evaluating the
//! AST. The interpreter is implemented in the [`interpreter`](interpreter) module as a tree-walk
//! evaluator. Thanks to all the previous steps, the interpreter is able to evaluate the AST and produce
//! a result. The interpreter reports errors as a [`RuntimeError`](error::RuntimeError). While the
//! scanner, the parser and the resolver try to catch as many errors as possible before running the
//! code, most errors can only be caught at runtime. For example, the following expression is valid
//! Lox syntax but semantically invalid because it tries to add a string and a number:
//! ```text
//! var a = "123";
//! var b = a + 123;
//! ```
//! The interpreter is also responsible for managing the environment. The environment is a chain of
//! frames mapping names to values. The environment is implemented in the [`environment`](environment)
//! module. Each frame represents a lexical scope in the program; this is what lets the interpreter
//! implement closures and lexical scoping.

use std::io::{self, Write};
use std::{fs, process};

pub mod ast;
pub mod class;
pub mod environment;
pub mod error;
pub mod expr;
pub mod function;
pub mod interpreter;
pub mod literal;
pub mod object;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;

use error::{did_error, did_runtime_error, reset_error};
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Drives the scanner → parser → resolver → interpreter pipeline for one
/// source unit, either a whole file or a single REPL line.
///
/// Errors at any stage are written to `out` as they're found and flip the
/// sticky flags in [`error`]; once any scan, parse, or resolve error has
/// been reported the pipeline stops before interpreting (spec propagation
/// policy: a program that doesn't parse clean never runs).
pub struct Lox {
    interpreter: Interpreter,
}

impl Lox {
    pub fn new() -> Self {
        Lox { interpreter: Interpreter::new() }
    }

    /// Runs a whole file. Exits the process with 65 if a scan/parse/resolve
    /// error was reported, 70 if a runtime error was reported, 66 if the
    /// file couldn't be read.
    pub fn run_file(&mut self, path: &str) {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("Can't read '{path}': {error}");
                process::exit(66);
            }
        };

        self.run(&source, &mut io::stderr());

        if did_error() {
            process::exit(65);
        }
        if did_runtime_error() {
            process::exit(70);
        }
    }

    /// Runs one line of source, writing any error text to `out` and
    /// returning whatever the program printed via `print`.
    ///
    /// Used directly by the REPL (which owns its own `rustyline` loop) and
    /// by the integration-test harness, which wants the printed output
    /// without going through a child process.
    pub fn run(&mut self, source: &str, out: &mut dyn Write) {
        reset_error();

        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        let _ = out.write_all(scan_errors.as_bytes());
        if did_error() {
            return;
        }

        let (statements, parse_errors) = Parser::new(tokens).parse();
        let _ = out.write_all(parse_errors.as_bytes());
        if did_error() {
            return;
        }

        let resolve_errors = Resolver::new(&mut self.interpreter).resolve_program(&statements);
        let _ = out.write_all(resolve_errors.as_bytes());
        if did_error() {
            return;
        }

        let runtime_errors = self.interpreter.interpret(&statements);
        let _ = out.write_all(runtime_errors.as_bytes());
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}
