// Diagnostics
//
// This file is part of Poppy.
// Copyright (C) 2024 The Poppy Authors
//
// Poppy is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published
// by the Free Software Foundation, either version 3 of the License,
// or (at your option) any later version.
//
// Poppy is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See
// the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Poppy.  If not, see <http://www.gnu.org/licenses/>.

//! The diagnostic categories of §7 and the accumulator that collects
//! them across a whole compilation.

use std::fmt;

use thiserror::Error;

use crate::source::{Location, SourceRegistry};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Warning,
    Error,
    /// Aborts the compilation immediately; exit code 2.
    Internal,
}

/// One category of diagnostic. Each variant's `Display` text is the
/// message rendered after the `file:line:column:` prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated character literal")]
    UnterminatedChar,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("unexpected character: {0:?}")]
    UnexpectedChar(char),
    #[error("character literal must contain exactly one character")]
    CharLength,

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("missing operand")]
    MissingOperand,
    #[error("unclosed {0}")]
    Unclosed(&'static str),

    #[error("include file not found: {0}")]
    IncludeNotFound(String),
    #[error("circular include: {0}")]
    CircularInclude(String),
    #[error("include depth exceeded ({0})")]
    IncludeTooDeep(usize),

    #[error("unknown macro: {0}")]
    UnknownMacro(String),
    #[error("macro {0} expects {1} argument(s), got {2}")]
    MacroArity(String, usize, usize),
    #[error("macro recursion depth exceeded ({0})")]
    MacroTooDeep(usize),
    #[error("stray .{0}")]
    StrayDirective(&'static str),

    #[error("division by zero")]
    DivisionByZero,
    #[error("expression is not constant")]
    NotConstant,
    #[error("integer overflow in constant expression")]
    Overflow,

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("addressing mode not supported on this architecture: {0}")]
    UnsupportedMode(String),

    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),
    #[error("symbol already defined: {0}")]
    DuplicateSymbol(String),

    #[error("local label outside any enclosing global label")]
    LocalLabelOutsideScope,
    #[error("no matching anonymous label")]
    NoAnonymousTarget,

    #[error("no encoding for {0}")]
    NoEncoding(String),
    #[error("operand {0} does not fit the declared width")]
    OperandTooWide(i64),
    #[error("operand width is ambiguous; assert .a8/.a16/.i8/.i16 first")]
    AmbiguousOperandWidth,

    #[error("branch target out of range ({0} does not fit {1} bits)")]
    BranchOutOfRange(i64, u8),

    #[error("bad argument to .{0}: {1}")]
    BadDirectiveArg(&'static str, String),
    #[error("unsupported directive .{0} for target {1}")]
    UnsupportedDirective(&'static str, &'static str),
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
    #[error("{0}")]
    UserError(String),
    #[error("{0}")]
    UserWarning(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Kind {
    pub fn severity(&self) -> Severity {
        match self {
            Kind::UserWarning(_) => Severity::Warning,
            Kind::Internal(_) => Severity::Internal,
            _ => Severity::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub kind: Kind,
}

impl Diagnostic {
    pub fn new(location: Location, kind: Kind) -> Self {
        Diagnostic { location, kind }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Renders the `file:line:column: LEVEL: message` line plus a
    /// caret-annotated copy of the offending source line.
    pub fn render(&self, sources: &SourceRegistry) -> String {
        let level = match self.severity() {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
        };
        let mut out = format!("{}: {}: {}\n", self.location, level, self.kind);
        if !self.location.is_builtin() {
            let line = sources.line_text(self.location.file, self.location.line);
            out.push_str(&format!("  {}\n", line));
            let col = self.location.column.max(1) as usize - 1;
            out.push_str(&format!("  {}^\n", " ".repeat(col)));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)
    }
}

/// Append-only diagnostic list for one compilation, matching the
/// propagation policy of §7: collection continues past recoverable
/// errors, and a compilation only succeeds when this list ends empty.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, location: Location, kind: Kind) {
        let severity = kind.severity();
        self.items.push(Diagnostic::new(location, kind));
        if severity != Severity::Warning {
            self.error_count += 1;
        }
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.error_count += other.error_count;
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn render(&self, sources: &SourceRegistry) -> String {
        let mut out = String::new();
        for d in &self.items {
            out.push_str(&d.render(sources));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_errors() {
        let d = Diagnostics::new();
        assert!(!d.has_errors());
        assert_eq!(d.error_count(), 0);
    }

    #[test]
    fn warning_does_not_count_as_error() {
        let mut d = Diagnostics::new();
        d.push(Location::builtin(), Kind::UserWarning("careful".into()));
        assert!(!d.has_errors());
        assert_eq!(d.error_count(), 0);
    }

    #[test]
    fn error_counts() {
        let mut d = Diagnostics::new();
        d.push(Location::builtin(), Kind::DivisionByZero);
        d.push(Location::builtin(), Kind::Overflow);
        assert!(d.has_errors());
        assert_eq!(d.error_count(), 2);
    }

    #[test]
    fn render_includes_caret() {
        let mut sources = SourceRegistry::new();
        let f = sources.add_text("f.pasm", "lda #$gg\n".into());
        let mut d = Diagnostics::new();
        d.push(
            Location::new(f, 1, 6, 5),
            Kind::UnexpectedChar('g'),
        );
        let text = d.render(&sources);
        assert!(text.contains("lda #$gg"));
        assert!(text.contains("     ^"));
    }
}
