//! Structured diagnostic accumulation for the SafeC front-end.
//!
//! Every stage reports problems through a [`DiagEngine`] instead of
//! printing directly, so that a driver (the CLI, a test, an embedding
//! tool) decides how and when to render them.

use std::fmt;

/// 1-based file position. Propagated onto every token, AST node, and
/// diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagLevel {
    Note,
    Warning,
    Error,
    /// Aborts the current stage immediately; no recovery is attempted.
    Fatal,
}

impl fmt::Display for DiagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagLevel::Note => "note",
            DiagLevel::Warning => "warning",
            DiagLevel::Error => "error",
            DiagLevel::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

/// One structured diagnostic record: `{level, location, message}`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagLevel,
    pub location: SourceLocation,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.level, self.message)
    }
}

/// Signals that a stage must abort immediately. Raised only by `fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalError;

/// Accumulates diagnostics for one translation unit. Never prints;
/// rendering to a human stream is the driver's job.
#[derive(Debug, Default)]
pub struct DiagEngine {
    records: Vec<Diagnostic>,
    error_count: u32,
}

impl DiagEngine {
    pub fn new() -> Self {
        DiagEngine::default()
    }

    pub fn note(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(DiagLevel::Note, location, message);
    }

    pub fn warn(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(DiagLevel::Warning, location, message);
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.push(DiagLevel::Error, location, message);
        self.error_count += 1;
    }

    /// Records a fatal diagnostic and returns the sentinel the caller
    /// should propagate to abort the current stage.
    pub fn fatal(&mut self, location: SourceLocation, message: impl Into<String>) -> FatalError {
        self.push(DiagLevel::Fatal, location, message);
        self.error_count += 1;
        FatalError
    }

    fn push(&mut self, level: DiagLevel, location: SourceLocation, message: impl Into<String>) {
        self.records.push(Diagnostic {
            level,
            location,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn extend(&mut self, other: DiagEngine) {
        self.error_count += other.error_count;
        self.records.extend(other.records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("test.sc", 1, 1)
    }

    #[test]
    fn note_and_warn_do_not_count_as_errors() {
        let mut diags = DiagEngine::new();
        diags.note(loc(), "just a note");
        diags.warn(loc(), "just a warning");
        assert!(!diags.has_errors());
        assert_eq!(diags.error_count(), 0);
        assert_eq!(diags.records().len(), 2);
    }

    #[test]
    fn error_increments_count() {
        let mut diags = DiagEngine::new();
        diags.error(loc(), "bad thing");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn fatal_increments_count_and_returns_sentinel() {
        let mut diags = DiagEngine::new();
        let sentinel = diags.fatal(loc(), "cannot continue");
        assert_eq!(sentinel, FatalError);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn display_format_matches_record_format() {
        let diag = Diagnostic {
            level: DiagLevel::Error,
            location: SourceLocation::new("a.sc", 3, 7),
            message: "undeclared identifier 'x'".to_string(),
        };
        assert_eq!(
            diag.to_string(),
            "a.sc:3:7: error: undeclared identifier 'x'"
        );
    }
}
