//! Pipeline driver: source → tokens → AST → resolution → evaluation.
//!
//! Each phase runs to completion and reports everything it can into one
//! [`DiagnosticSink`]; the driver halts before the next phase whenever the
//! current phase produced any diagnostic, so a run surfaces as many problems
//! as possible without cascading one phase's failures into the next.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::Stmt;
use crate::diagnostics::DiagnosticSink;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// The single entry point a front end needs.
pub struct Lox;

impl Lox {
    /// Run `source` as a Lox program, printing to stdout.  On failure the
    /// ordered diagnostics of the phase that failed are returned; the caller
    /// distinguishes compile-time from runtime failure by checking whether
    /// any of them [`LoxError::is_runtime`].
    pub fn run(source: &str) -> Result<(), Vec<LoxError>> {
        Self::run_with_output(source, Rc::new(RefCell::new(io::stdout())))
    }

    /// Like [`Lox::run`] with an injected `print` destination.
    pub fn run_with_output(
        source: &str,
        output: Rc<RefCell<dyn Write>>,
    ) -> Result<(), Vec<LoxError>> {
        let mut sink = DiagnosticSink::new();

        // ── scan ─────────────────────────────────────────────────────────
        let mut tokens: Vec<Token> = Vec::new();

        for result in Scanner::new(source) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => sink.report(e),
            }
        }

        if sink.has_errors() {
            debug!("Halting after scan: {} diagnostic(s)", sink.len());
            return Err(sink.take());
        }

        info!("Scanned {} tokens", tokens.len());

        // ── parse ────────────────────────────────────────────────────────
        let statements: Vec<Stmt> = Parser::new(&tokens, &mut sink).parse();

        if sink.has_errors() {
            debug!("Halting after parse: {} diagnostic(s)", sink.len());
            return Err(sink.take());
        }

        info!("Parsed {} statements", statements.len());

        // ── resolve ──────────────────────────────────────────────────────
        let mut interpreter = Interpreter::with_output(output);

        Resolver::new(&mut interpreter, &mut sink).resolve(&statements);

        if sink.has_errors() {
            debug!("Halting after resolve: {} diagnostic(s)", sink.len());
            return Err(sink.take());
        }

        // ── interpret ────────────────────────────────────────────────────
        interpreter.interpret(&statements, &mut sink);

        if sink.has_errors() {
            return Err(sink.take());
        }

        Ok(())
    }
}
