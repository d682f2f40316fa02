//! Diagnostic collection for the interpreter pipeline.
//!
//! Every phase (scan, parse, resolve, interpret) receives a `&mut
//! DiagnosticSink` and reports into it instead of failing fast, so a single
//! pass can surface as many problems as it is able to find.  The driver in
//! [`crate::lox`] queries the sink between phases and halts the pipeline
//! before the next phase whenever the current one reported anything.

use log::debug;

use crate::error::LoxError;

/// Ordered accumulator of diagnostics for one run.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    errors: Vec<LoxError>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.  Order of arrival is preserved.
    pub fn report(&mut self, error: LoxError) {
        debug!("Diagnostic reported: {}", error);

        self.errors.push(error);
    }

    /// Record a static (compile-time) diagnostic.  `location` is an optional
    /// label such as a lexeme; empty means none.
    pub fn report_syntax_error(&mut self, line: usize, location: &str, message: &str) {
        let message: String = if location.is_empty() {
            message.to_string()
        } else {
            format!("at {}: {}", location, message)
        };

        self.report(LoxError::Parse { message, line });
    }

    /// Record a runtime diagnostic.
    pub fn report_runtime_error(&mut self, line: usize, location: &str, message: &str) {
        let message: String = if location.is_empty() {
            message.to_string()
        } else {
            format!("at {}: {}", location, message)
        };

        self.report(LoxError::Runtime { message, line });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if any collected diagnostic is a runtime failure.
    pub fn had_runtime_error(&self) -> bool {
        self.errors.iter().any(LoxError::is_runtime)
    }

    /// Fetch and clear: hands the accumulated diagnostics to the caller in
    /// arrival order, leaving the sink empty for the next phase.
    pub fn take(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// Peek at the collected diagnostics without clearing them.
    pub fn errors(&self) -> &[LoxError] {
        &self.errors
    }
}
