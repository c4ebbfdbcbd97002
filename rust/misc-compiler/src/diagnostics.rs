//! Compile-time diagnostics collected during code generation.
//!
//! A [`Diagnostics`] session is created by the caller and passed by
//! reference into the generator; nothing here is global, so independent
//! generations can run side by side.

use crate::compiler::span::Span;
use std::collections::HashSet;

/// A single reported error
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self) -> String {
        let mut out = format!("{}: {}\n", red("error"), bold(&self.message));
        if let Some(location) = self.location() {
            out.push_str(&format!("  {} {}\n", cyan("-->"), location));
        }
        for suggestion in &self.suggestions {
            out.push_str(&format!("   {} {}: {}\n", cyan("="), cyan("help"), suggestion));
        }
        out
    }

    /// Render without colors (for logs, tests)
    pub fn render_plain(&self) -> String {
        let mut out = format!("error: {}\n", self.message);
        if let Some(location) = self.location() {
            out.push_str(&format!("  --> {}\n", location));
        }
        for suggestion in &self.suggestions {
            out.push_str(&format!("   = help: {}\n", suggestion));
        }
        out
    }

    fn location(&self) -> Option<String> {
        match (&self.file, self.line, self.col) {
            (Some(file), Some(line), Some(col)) => Some(format!("{}:{}:{}", file, line, col)),
            (None, Some(line), Some(col)) => Some(format!("{}:{}", line, col)),
            (Some(file), _, _) => Some(file.clone()),
            _ => None,
        }
    }
}

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

/// Error-collecting session shared by every component of one generation.
///
/// At most one error is recorded per source position; reports without a
/// known position are always recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    file: Option<String>,
    reported: Vec<Diagnostic>,
    positions: HashSet<(usize, usize)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose diagnostics name the given source file.
    pub fn for_file(file: impl Into<String>) -> Self {
        Self { file: Some(file.into()), ..Self::default() }
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.report(span, message.into(), vec![]);
    }

    pub fn error_with_help(&mut self, span: Span, message: impl Into<String>, help: impl Into<String>) {
        self.report(span, message.into(), vec![help.into()]);
    }

    fn report(&mut self, span: Span, message: String, suggestions: Vec<String>) {
        if !span.is_dummy() && !self.positions.insert((span.line, span.col)) {
            tracing::debug!(%span, %message, "suppressed repeated diagnostic");
            return;
        }
        let (line, col) = if span.is_dummy() { (None, None) } else { (Some(span.line), Some(span.col)) };
        self.reported.push(Diagnostic {
            message,
            file: self.file.clone(),
            line,
            col,
            suggestions,
        });
    }

    pub fn error_count(&self) -> usize {
        self.reported.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reported.iter()
    }

    pub fn render_plain(&self) -> String {
        self.reported.iter().map(Diagnostic::render_plain).collect()
    }
    /// Close the session, handing back what was reported.
    pub fn into_reported(self) -> Vec<Diagnostic> {
        self.reported
    }
}
