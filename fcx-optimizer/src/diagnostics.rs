//! Analysis diagnostics: advisory warnings only, never fatal (§4.2, §7
//! kind 4). Collected in an explicit list rather than a global sink,
//! per the "exception-like control flow" design note in §9.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    NullDereference,
    DoubleFree,
    UseAfterFree,
    FreeOfNeverAllocated,
    MemoryLeak,
    DeadFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub function: String,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: warning: {}", self.function, self.line, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, kind: DiagnosticKind, function: &str, line: u32, message: impl Into<String>) {
        self.0.push(Diagnostic {
            kind,
            function: function.to_string(),
            line,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}
