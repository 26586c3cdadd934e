//! Diagnostic collection and listing-file rendering.
//!
//! Every phase reports through a [`Lister`]: warnings and errors are queued
//! in insertion order and printed together once the frontend finishes, so a
//! single run surfaces as many problems as possible.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexical => write!(f, "Lexical"),
            Phase::Syntax => write!(f, "Syntax"),
            Phase::Semantic => write!(f, "Semantic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub phase: Phase,
    pub severity: Severity,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{} {} ({}:{}): {}",
            self.phase, kind, self.line, self.col, self.message
        )
    }
}

/// Collects diagnostics across all frontend phases and renders the listing
/// file (numbered source followed by the diagnostic block).
#[derive(Debug, Default)]
pub struct Lister {
    diagnostics: Vec<Diagnostic>,
}

impl Lister {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, phase: Phase, severity: Severity, line: u32, col: u32, message: String) {
        self.diagnostics.push(Diagnostic {
            phase,
            severity,
            line,
            col,
            message,
        });
    }

    pub fn lex_warn(&mut self, line: u32, col: u32, message: impl Into<String>) {
        self.push(Phase::Lexical, Severity::Warning, line, col, message.into());
    }

    pub fn lex_error(&mut self, line: u32, col: u32, message: impl Into<String>) {
        self.push(Phase::Lexical, Severity::Error, line, col, message.into());
    }

    pub fn syn_error(&mut self, line: u32, col: u32, message: impl Into<String>) {
        self.push(Phase::Syntax, Severity::Error, line, col, message.into());
    }

    pub fn sem_error(&mut self, line: u32, col: u32, message: impl Into<String>) {
        self.push(Phase::Semantic, Severity::Error, line, col, message.into());
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Terminal report: all warnings first, then all errors.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for d in self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
        {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        for d in self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
        {
            out.push_str(&d.to_string());
            out.push('\n');
        }
        out
    }

    /// The listing file: source with line numbers, then the report block.
    pub fn listing(&self, source: &str) -> String {
        let mut out = String::new();
        for (i, line) in source.lines().enumerate() {
            out.push_str(&format!("{} {}\n", i + 1, line));
        }
        out.push('\n');
        out.push_str(&self.report());
        out
    }
}

pub fn render_diagnostics(diags: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diags {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}
