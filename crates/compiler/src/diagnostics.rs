//! Diagnostics shared by every compiler stage.
//!
//! A [`Diagnostic`] carries a severity, a message, and a source position.
//! Stages append into a [`Diagnostics`] list and keep going where recovery
//! is possible; the pipeline skips code generation whenever an
//! error-severity entry exists.

use crate::token::SourceLocation;
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity level for diagnostics. Warnings never block code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Maps file ids (carried on tokens and locations) back to paths for
/// rendering. File ids are dense indexes assigned in load order.
#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    files: Vec<PathBuf>,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap { files: Vec::new() }
    }

    /// Register a file and return its id. The same path registered twice
    /// gets two ids; callers dedupe through the module cache instead.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> u32 {
        self.files.push(path.into());
        (self.files.len() - 1) as u32
    }

    pub fn path(&self, file_id: u32) -> Option<&Path> {
        self.files.get(file_id as usize).map(PathBuf::as_path)
    }

    fn display(&self, file_id: u32) -> String {
        match self.path(file_id) {
            Some(p) => p.display().to_string(),
            None => "<unknown>".to_string(),
        }
    }
}

/// A single compiler message with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            file_id: location.file_id,
            line: location.line,
            column: location.column,
            end_line: None,
            end_column: None,
        }
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            file_id: location.file_id,
            line: location.line,
            column: location.column,
            end_line: None,
            end_column: None,
        }
    }

    pub fn with_end(mut self, end: SourceLocation) -> Self {
        self.end_line = Some(end.line);
        self.end_column = Some(end.column);
        self
    }

    /// Render as `severity[file:line:col]: message`.
    pub fn render(&self, sources: &SourceMap) -> String {
        format!(
            "{}[{}:{}:{}]: {}",
            self.severity,
            sources.display(self.file_id),
            self.line,
            self.column,
            self.message
        )
    }
}

/// Ordered collection of diagnostics for one compiler invocation.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn error(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.items.push(Diagnostic::error(message, location));
    }

    pub fn warning(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.items.push(Diagnostic::warning(message, location));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn had_error(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Stable presentation order: file, then line, then column, with
    /// errors before warnings at the same position.
    pub fn sort(&mut self) {
        self.items
            .sort_by_key(|d| (d.file_id, d.line, d.column, d.severity));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// Roll back to a previous length; used by restorable try-parses.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> SourceLocation {
        SourceLocation::new(line, column, 0, 0)
    }

    #[test]
    fn renders_in_contract_format() {
        let mut sources = SourceMap::new();
        let id = sources.add_file("demo.rf");
        assert_eq!(id, 0);
        let d = Diagnostic::error("unknown type 'Foo'", loc(3, 7));
        assert_eq!(d.render(&sources), "error[demo.rf:3:7]: unknown type 'Foo'");
    }

    #[test]
    fn had_error_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning("unused variable 'x'", loc(1, 1));
        assert!(!diags.had_error());
        diags.error("boom", loc(2, 2));
        assert!(diags.had_error());
    }

    #[test]
    fn sort_orders_by_position() {
        let mut diags = Diagnostics::new();
        diags.error("b", loc(5, 1));
        diags.error("a", loc(1, 4));
        diags.sort();
        let msgs: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(msgs, vec!["a", "b"]);
    }
}
